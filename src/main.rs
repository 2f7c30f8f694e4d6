//! Stackdef CLI - inspect template definitions and render stack inputs

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stackdef::context::StaticServiceCatalog;
use stackdef::stack::StackOutput;
use stackdef::{
    yaml, ClusterInstance, ClusterProfile, DefinitionRegistry, HttpDiscoveryClient,
    ProvisionContext, RequestContext, ScaleManager, TemplateConfig,
};

/// Stackdef - template definitions for cluster provisioning
#[derive(Parser, Debug)]
#[command(name = "stackdef", version, about, long_about = None)]
struct Cli {
    /// Path to the configuration YAML (defaults apply when omitted)
    #[arg(short = 'c', long, env = "STACKDEF_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every supported triple with its plugins and enablement
    List,

    /// Render the template path and input parameters for a cluster
    ///
    /// Resolves the discovery URL when the engine needs one, which may call
    /// out to the configured discovery service.
    Params(ParamsArgs),

    /// Apply stack outputs to a cluster instance and print the result
    Outputs(OutputsArgs),
}

/// Arguments for `params`
#[derive(Parser, Debug)]
struct ParamsArgs {
    /// Cluster profile YAML
    #[arg(long)]
    profile: PathBuf,

    /// Cluster instance YAML
    #[arg(long)]
    instance: PathBuf,

    /// Identity service URL
    #[arg(long, env = "OS_AUTH_URL", default_value = "")]
    auth_url: String,

    /// Auth token passed through to the template
    #[arg(long, env = "OS_AUTH_TOKEN", default_value = "", hide_env_values = true)]
    auth_token: String,

    /// User name
    #[arg(long, env = "OS_USERNAME", default_value = "")]
    username: String,

    /// Tenant (project) name
    #[arg(long, env = "OS_PROJECT_NAME", default_value = "")]
    tenant: String,

    /// Public URL of the provisioning API
    #[arg(
        long,
        env = "STACKDEF_PROVISIONING_URL",
        default_value = "http://127.0.0.1:9511/v1"
    )]
    provisioning_url: String,

    /// Node to remove when scaling down (repeatable)
    #[arg(long = "remove-node")]
    remove_nodes: Vec<String>,
}

/// Arguments for `outputs`
#[derive(Parser, Debug)]
struct OutputsArgs {
    /// Cluster profile YAML
    #[arg(long)]
    profile: PathBuf,

    /// Cluster instance YAML
    #[arg(long)]
    instance: PathBuf,

    /// Stack outputs YAML (a list of output_key/output_value records)
    #[arg(long)]
    outputs: PathBuf,
}

/// Removal list fixed on the command line
struct FixedRemovalNodes(Vec<String>);

impl ScaleManager for FixedRemovalNodes {
    fn get_removal_nodes(&self, _hosts_output: &str) -> Vec<String> {
        self.0.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => TemplateConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => TemplateConfig::default(),
    };
    let registry = DefinitionRegistry::from_config(&config);

    match cli.command {
        Commands::List => list(&registry),
        Commands::Params(args) => params(&registry, &config, args).await,
        Commands::Outputs(args) => outputs(&registry, args),
    }
}

fn list(registry: &DefinitionRegistry) -> anyhow::Result<()> {
    for (key, plugins) in registry.get_definitions() {
        for name in plugins.keys() {
            let state = if registry.is_enabled(name) {
                "enabled"
            } else {
                "disabled"
            };
            println!("{key}\t{name}\t{state}");
        }
    }
    Ok(())
}

async fn params(
    registry: &DefinitionRegistry,
    config: &TemplateConfig,
    args: ParamsArgs,
) -> anyhow::Result<()> {
    let profile: ClusterProfile = yaml::from_yaml_file(&args.profile)?;
    let mut instance: ClusterInstance = yaml::from_yaml_file(&args.instance)?;

    let key = profile.definition_key();
    let definition = registry.get_definition(&key.infra_kind, &key.os, &key.engine)?;

    let request = RequestContext {
        auth_token: args.auth_token,
        auth_url: args.auth_url,
        user_name: args.username,
        tenant: args.tenant,
    };
    let catalog = StaticServiceCatalog::new(args.provisioning_url);
    let discovery = HttpDiscoveryClient::new(&config.discovery)?;
    let ctx = ProvisionContext::new(&request, &catalog, &discovery, config);

    let removal = FixedRemovalNodes(args.remove_nodes);
    let scale_manager: Option<&dyn ScaleManager> = if removal.0.is_empty() {
        None
    } else {
        Some(&removal)
    };

    let stack = definition
        .extract_definition(&ctx, &profile, &mut instance, scale_manager)
        .await?;
    info!(
        definition = %key,
        discovery_url = instance.discovery_url.as_deref().unwrap_or(""),
        "rendered stack definition"
    );
    println!("{}", serde_json::to_string_pretty(&stack)?);
    Ok(())
}

fn outputs(registry: &DefinitionRegistry, args: OutputsArgs) -> anyhow::Result<()> {
    let profile: ClusterProfile = yaml::from_yaml_file(&args.profile)?;
    let mut instance: ClusterInstance = yaml::from_yaml_file(&args.instance)?;
    let outputs: Vec<StackOutput> = yaml::from_yaml_file_or_default(&args.outputs)
        .with_context(|| format!("loading outputs {}", args.outputs.display()))?;

    let key = profile.definition_key();
    let definition = registry.get_definition(&key.infra_kind, &key.os, &key.engine)?;
    definition.update_outputs(&outputs, &profile, &mut instance)?;

    println!("{}", serde_json::to_string_pretty(&instance)?);
    Ok(())
}
