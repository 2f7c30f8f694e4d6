//! Bootstrap discovery URL resolution
//!
//! New cluster nodes find each other through a discovery URL. Each engine
//! picks a [`DiscoveryResolver`]:
//!
//! - [`DiscoveryResolver::Etcd`] asks an etcd discovery service for a token
//!   sized to the master count.
//! - [`DiscoveryResolver::Swarm`] asks the public swarm token service, or
//!   formats a configured URL template with the cluster's id/uuid.
//! - [`DiscoveryResolver::Static`] has no discovery concept.
//!
//! A non-empty `ClusterInstance::discovery_url` is a cache: resolvers that
//! support discovery return it as-is without calling out.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::{info, warn};

use crate::cluster::ClusterInstance;
use crate::config::DiscoveryConfig;
use crate::{Error, Result};

/// Transport for discovery services
///
/// Calls return the response body. No retries happen at this layer.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DiscoveryClient: Send + Sync {
    /// GET `url` and return the body
    async fn get(&self, url: &str) -> Result<String>;

    /// POST to `url` with an empty body and return the response body
    async fn post(&self, url: &str) -> Result<String>;
}

/// `reqwest`-backed discovery client
#[derive(Clone, Debug)]
pub struct HttpDiscoveryClient {
    client: reqwest::Client,
}

impl HttpDiscoveryClient {
    /// Create a client whose requests time out after `config.timeout()`
    pub fn new(config: &DiscoveryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::config(format!("failed to build discovery http client: {e}")))?;
        Ok(Self { client })
    }

    async fn body(url: &str, request: reqwest::RequestBuilder) -> Result<String> {
        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::discovery_request(url, e.to_string()))?;
        response
            .text()
            .await
            .map_err(|e| Error::discovery_request(url, e.to_string()))
    }
}

#[async_trait]
impl DiscoveryClient for HttpDiscoveryClient {
    async fn get(&self, url: &str) -> Result<String> {
        Self::body(url, self.client.get(url)).await
    }

    async fn post(&self, url: &str) -> Result<String> {
        Self::body(url, self.client.post(url)).await
    }
}

/// Discovery strategy for an engine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscoveryResolver {
    /// etcd discovery service sized by master count
    Etcd,
    /// Public swarm token service or formatted URL
    Swarm,
    /// No discovery
    Static,
}

impl DiscoveryResolver {
    /// Resolve the discovery URL for `instance`, caching it on the instance
    ///
    /// Returns `Ok(None)` only for [`DiscoveryResolver::Static`].
    pub async fn get_discovery_url(
        &self,
        instance: &mut ClusterInstance,
        config: &DiscoveryConfig,
        client: &dyn DiscoveryClient,
    ) -> Result<Option<String>> {
        if matches!(self, Self::Static) {
            return Ok(None);
        }
        if let Some(cached) = instance.cached_discovery_url() {
            return Ok(Some(cached.to_string()));
        }

        let url = match self {
            Self::Etcd => etcd_discovery_url(instance, config, client).await?,
            Self::Swarm => swarm_discovery_url(instance, config, client).await?,
            Self::Static => return Ok(None),
        };
        instance.discovery_url = Some(url.clone());
        Ok(Some(url))
    }
}

async fn etcd_discovery_url(
    instance: &ClusterInstance,
    config: &DiscoveryConfig,
    client: &dyn DiscoveryClient,
) -> Result<String> {
    let size = instance.master_count.to_string();
    let endpoint = interpolate(
        &config.etcd_discovery_service_endpoint_format,
        &size,
        &[("size", size.as_str())],
    )?;

    let body = client.get(&endpoint).await.inspect_err(|e| {
        warn!(endpoint = %endpoint, error = %e, "etcd discovery request failed");
    })?;
    let url = body.trim();
    if url.is_empty() {
        return Err(Error::discovery_not_found(endpoint));
    }

    info!(cluster = %instance.uuid, size = instance.master_count, "allocated etcd discovery url");
    Ok(url.to_string())
}

async fn swarm_discovery_url(
    instance: &ClusterInstance,
    config: &DiscoveryConfig,
    client: &dyn DiscoveryClient,
) -> Result<String> {
    if config.public_swarm_discovery {
        let endpoint = &config.public_swarm_discovery_url;
        let body = client.post(endpoint).await.inspect_err(|e| {
            warn!(endpoint = %endpoint, error = %e, "swarm token request failed");
        })?;
        let token = body.trim();
        if token.is_empty() {
            return Err(Error::discovery_not_found(endpoint.as_str()));
        }
        info!(cluster = %instance.uuid, "allocated public swarm discovery token");
        return Ok(format!("token://{token}"));
    }

    let template = config.swarm_discovery_url_format.as_deref().ok_or_else(|| {
        Error::config("swarm_discovery_url_format must be set when public swarm discovery is disabled")
    })?;
    let id = instance.id.to_string();
    interpolate(
        template,
        &id,
        &[
            ("bay_id", id.as_str()),
            ("bay_uuid", instance.uuid.as_str()),
            ("cluster_id", id.as_str()),
            ("cluster_uuid", instance.uuid.as_str()),
            ("id", id.as_str()),
            ("uuid", instance.uuid.as_str()),
        ],
    )
}

/// Fill `%`-style placeholders in a URL template
///
/// `%(name)s` and `%(name)d` take the named value, bare `%s`/`%d` take
/// `positional`, and `%%` is a literal percent sign.
fn interpolate(template: &str, positional: &str, named: &[(&str, &str)]) -> Result<String> {
    let mut out = String::with_capacity(template.len() + 16);
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('s') | Some('d') => out.push_str(positional),
            Some('(') => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some(')') => break,
                        Some(ch) => name.push(ch),
                        None => {
                            return Err(Error::config(format!(
                                "unterminated placeholder in url template {template}"
                            )))
                        }
                    }
                }
                if !matches!(chars.next(), Some('s') | Some('d')) {
                    return Err(Error::config(format!(
                        "placeholder %({name}) must end in s or d in url template {template}"
                    )));
                }
                let value = named
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| *value)
                    .ok_or_else(|| {
                        Error::config(format!("unknown placeholder %({name}) in url template {template}"))
                    })?;
                out.push_str(value);
            }
            _ => {
                return Err(Error::config(format!(
                    "unsupported conversion in url template {template}"
                )))
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::*;

    fn etcd_config(format: &str) -> DiscoveryConfig {
        DiscoveryConfig {
            etcd_discovery_service_endpoint_format: format.to_string(),
            ..Default::default()
        }
    }

    fn swarm_config(format: &str) -> DiscoveryConfig {
        DiscoveryConfig {
            public_swarm_discovery: false,
            swarm_discovery_url_format: Some(format.to_string()),
            ..Default::default()
        }
    }

    fn bay() -> ClusterInstance {
        ClusterInstance {
            id: 1,
            uuid: "some_uuid".to_string(),
            master_count: 10,
            ..Default::default()
        }
    }

    // ==========================================================================
    // Story: URL template interpolation
    // ==========================================================================

    #[test]
    fn test_interpolate_named_and_positional() {
        assert_eq!(
            interpolate("http://etcd/test?size=%(size)d", "3", &[("size", "3")]).unwrap(),
            "http://etcd/test?size=3"
        );
        assert_eq!(
            interpolate("http://etcd/test?size=%d", "3", &[]).unwrap(),
            "http://etcd/test?size=3"
        );
        assert_eq!(interpolate("100%%", "", &[]).unwrap(), "100%");
    }

    #[test]
    fn test_interpolate_rejects_unknown_placeholder() {
        let err = interpolate("etcd://x/%(nope)s", "1", &[("bay_id", "1")]).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_interpolate_rejects_unterminated_placeholder() {
        assert!(interpolate("etcd://x/%(bay_id", "1", &[("bay_id", "1")]).is_err());
        assert!(interpolate("etcd://x/%(bay_id)x", "1", &[("bay_id", "1")]).is_err());
    }

    // ==========================================================================
    // Story: etcd discovery for Kubernetes
    // ==========================================================================

    #[tokio::test]
    async fn test_etcd_discovery_gets_sized_endpoint_and_caches() {
        let mut client = MockDiscoveryClient::new();
        client
            .expect_get()
            .with(eq("http://etcd/test?size=10"))
            .times(1)
            .returning(|_| Ok("http://etcd/token".to_string()));

        let mut instance = bay();
        let url = DiscoveryResolver::Etcd
            .get_discovery_url(&mut instance, &etcd_config("http://etcd/test?size=%d"), &client)
            .await
            .unwrap();

        assert_eq!(url.as_deref(), Some("http://etcd/token"));
        assert_eq!(instance.discovery_url.as_deref(), Some("http://etcd/token"));
    }

    #[tokio::test]
    async fn test_etcd_discovery_named_size_placeholder() {
        let mut client = MockDiscoveryClient::new();
        client
            .expect_get()
            .with(eq("http://etcd/test?size=10"))
            .times(1)
            .returning(|_| Ok("http://etcd/token\n".to_string()));

        let mut instance = bay();
        let url = DiscoveryResolver::Etcd
            .get_discovery_url(
                &mut instance,
                &etcd_config("http://etcd/test?size=%(size)d"),
                &client,
            )
            .await
            .unwrap();
        assert_eq!(url.as_deref(), Some("http://etcd/token"));
    }

    #[tokio::test]
    async fn test_etcd_discovery_empty_body_is_not_found() {
        let mut client = MockDiscoveryClient::new();
        client.expect_get().times(1).returning(|_| Ok(String::new()));

        let mut instance = bay();
        let err = DiscoveryResolver::Etcd
            .get_discovery_url(&mut instance, &etcd_config("http://etcd/test?size=%d"), &client)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::DiscoveryUrlNotFound { .. }));
        assert!(instance.discovery_url.is_none());
    }

    #[tokio::test]
    async fn test_etcd_transport_failure_propagates() {
        let mut client = MockDiscoveryClient::new();
        client
            .expect_get()
            .times(1)
            .returning(|url| Err(Error::discovery_request(url, "connection refused")));

        let mut instance = bay();
        let err = DiscoveryResolver::Etcd
            .get_discovery_url(&mut instance, &DiscoveryConfig::default(), &client)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DiscoveryRequest { .. }));
        assert!(instance.discovery_url.is_none());
    }

    #[tokio::test]
    async fn test_cached_url_skips_network() {
        let client = MockDiscoveryClient::new();
        let mut instance = ClusterInstance {
            discovery_url: Some("token://some_token".to_string()),
            ..bay()
        };

        for resolver in [DiscoveryResolver::Etcd, DiscoveryResolver::Swarm] {
            let url = resolver
                .get_discovery_url(&mut instance, &DiscoveryConfig::default(), &client)
                .await
                .unwrap();
            assert_eq!(url.as_deref(), Some("token://some_token"));
        }
    }

    // ==========================================================================
    // Story: swarm discovery
    // ==========================================================================

    #[tokio::test]
    async fn test_swarm_public_token() {
        let mut client = MockDiscoveryClient::new();
        client
            .expect_post()
            .with(eq(crate::config::DEFAULT_PUBLIC_SWARM_DISCOVERY_URL))
            .times(1)
            .returning(|_| Ok("some_token".to_string()));

        let mut instance = bay();
        let url = DiscoveryResolver::Swarm
            .get_discovery_url(&mut instance, &DiscoveryConfig::default(), &client)
            .await
            .unwrap();

        assert_eq!(url.as_deref(), Some("token://some_token"));
        assert_eq!(instance.discovery_url.as_deref(), Some("token://some_token"));
    }

    #[tokio::test]
    async fn test_swarm_public_empty_token_is_not_found() {
        let mut client = MockDiscoveryClient::new();
        client.expect_post().times(1).returning(|_| Ok("  ".to_string()));

        let mut instance = bay();
        let err = DiscoveryResolver::Swarm
            .get_discovery_url(&mut instance, &DiscoveryConfig::default(), &client)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DiscoveryUrlNotFound { .. }));
    }

    #[tokio::test]
    async fn test_swarm_format_bay_id() {
        let client = MockDiscoveryClient::new();
        let mut instance = bay();
        let url = DiscoveryResolver::Swarm
            .get_discovery_url(&mut instance, &swarm_config("etcd://test.com/bay-%(bay_id)s"), &client)
            .await
            .unwrap();

        assert_eq!(url.as_deref(), Some("etcd://test.com/bay-1"));
        assert_eq!(instance.discovery_url.as_deref(), Some("etcd://test.com/bay-1"));
    }

    #[tokio::test]
    async fn test_swarm_format_bay_uuid() {
        let client = MockDiscoveryClient::new();
        let mut instance = bay();
        let url = DiscoveryResolver::Swarm
            .get_discovery_url(
                &mut instance,
                &swarm_config("etcd://test.com/bay-%(bay_uuid)s"),
                &client,
            )
            .await
            .unwrap();
        assert_eq!(url.as_deref(), Some("etcd://test.com/bay-some_uuid"));
    }

    #[tokio::test]
    async fn test_swarm_format_short_placeholder() {
        let client = MockDiscoveryClient::new();
        let mut instance = bay();
        let url = DiscoveryResolver::Swarm
            .get_discovery_url(&mut instance, &swarm_config("etcd://test.com/bay-%(id)s"), &client)
            .await
            .unwrap();
        assert_eq!(url.as_deref(), Some("etcd://test.com/bay-1"));
    }

    #[tokio::test]
    async fn test_swarm_format_mode_requires_template() {
        let client = MockDiscoveryClient::new();
        let config = DiscoveryConfig {
            public_swarm_discovery: false,
            ..Default::default()
        };
        let err = DiscoveryResolver::Swarm
            .get_discovery_url(&mut bay(), &config, &client)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    // ==========================================================================
    // Story: engines without discovery
    // ==========================================================================

    #[tokio::test]
    async fn test_static_resolver_never_populates() {
        let client = MockDiscoveryClient::new();
        let mut instance = ClusterInstance {
            discovery_url: Some("token://leftover".to_string()),
            ..bay()
        };
        let url = DiscoveryResolver::Static
            .get_discovery_url(&mut instance, &DiscoveryConfig::default(), &client)
            .await
            .unwrap();

        assert!(url.is_none());
        assert_eq!(instance.discovery_url.as_deref(), Some("token://leftover"));

        let mut fresh = bay();
        DiscoveryResolver::Static
            .get_discovery_url(&mut fresh, &DiscoveryConfig::default(), &client)
            .await
            .unwrap();
        assert!(fresh.discovery_url.is_none());
    }
}
