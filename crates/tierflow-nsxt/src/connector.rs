//! Connector bootstrap
//!
//! Builds the policy and manager clients against one control-plane host and
//! proves the configuration with a single liveness call, so bad hosts or
//! credentials fail here instead of inside the first task.

use crate::api::{ManagerApi, PolicyApi};
use crate::auth::{Authenticator, Credentials, TokenCache, base_url};
use crate::client::{ManagerClient, PolicyClient};
use crate::error::{NsxtError, Result};
use crate::model::{ApiGeneration, NodeVersion};
use crate::transport::{RestClient, RetryConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const VERSION_PATH: &str = "/api/v1/node/version";

/// TLS settings shared by both clients
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// Accept any server certificate
    pub insecure: bool,

    /// PEM bundle of additional trusted CAs
    pub ca_file: Option<PathBuf>,

    /// PEM client certificate and key for mutual TLS
    pub client_cert_file: Option<PathBuf>,
    pub client_key_file: Option<PathBuf>,
}

/// Connection settings of one control plane
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Host name or base URL of the manager
    pub host: String,

    pub credentials: Credentials,

    pub tls: TlsConfig,

    /// Retries of transient failures per request
    pub retries: u32,

    pub timeout: Duration,
}

impl ConnectorConfig {
    pub fn new(host: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            host: host.into(),
            credentials,
            tls: TlsConfig::default(),
            retries: 3,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(NsxtError::InvalidConfig("host must be set".to_string()));
        }
        if self.tls.client_cert_file.is_some() != self.tls.client_key_file.is_some() {
            return Err(NsxtError::InvalidConfig(
                "client certificate and key must be given together".to_string(),
            ));
        }
        self.credentials.validate()
    }
}

/// Authenticated, verified access to both API generations
pub struct Connector {
    policy: Arc<PolicyClient>,
    manager: Arc<ManagerClient>,
    version: NodeVersion,
    generation: ApiGeneration,
}

impl Connector {
    /// Build both clients and perform the liveness call.
    pub async fn connect(config: &ConnectorConfig, tokens: &TokenCache) -> Result<Self> {
        config.validate()?;

        let http = build_http_client(&config.tls, config.timeout).await?;
        let auth = Authenticator::new(config.credentials.clone(), tokens.clone());
        let rest = Arc::new(RestClient::new(
            http,
            base_url(&config.host),
            auth,
            RetryConfig::with_retries(config.retries),
        ));

        let version: NodeVersion = rest.get(VERSION_PATH, &[]).await?;
        let generation = ApiGeneration::from_product_version(&version.product_version)
            .ok_or_else(|| {
                NsxtError::UnexpectedResponse(format!(
                    "unparsable product version '{}'",
                    version.product_version
                ))
            })?;

        tracing::info!(
            host = %config.host,
            auth = config.credentials.mode(),
            version = %version.product_version,
            %generation,
            "Connected to NSX-T manager"
        );

        Ok(Self {
            policy: Arc::new(PolicyClient::new(rest.clone())),
            manager: Arc::new(ManagerClient::new(rest)),
            version,
            generation,
        })
    }

    pub fn policy(&self) -> Arc<dyn PolicyApi> {
        self.policy.clone()
    }

    pub fn manager(&self) -> Arc<dyn ManagerApi> {
        self.manager.clone()
    }

    pub fn version(&self) -> &NodeVersion {
        &self.version
    }

    pub fn generation(&self) -> ApiGeneration {
        self.generation
    }
}

async fn build_http_client(tls: &TlsConfig, timeout: Duration) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(tls.insecure);

    if let Some(ca_file) = &tls.ca_file {
        let pem = tokio::fs::read(ca_file).await?;
        for cert in reqwest::Certificate::from_pem_bundle(&pem)? {
            builder = builder.add_root_certificate(cert);
        }
    }

    if let (Some(cert_file), Some(key_file)) = (&tls.client_cert_file, &tls.client_key_file) {
        let mut pem = tokio::fs::read(cert_file).await?;
        pem.push(b'\n');
        pem.extend(tokio::fs::read(key_file).await?);
        builder = builder.identity(reqwest::Identity::from_pem(&pem)?);
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn version_body(version: &str) -> serde_json::Value {
        serde_json::json!({"product_version": version, "node_version": version})
    }

    fn basic(server: &MockServer) -> ConnectorConfig {
        ConnectorConfig::new(
            server.uri(),
            Credentials::Basic {
                username: "admin".to_string(),
                password: "secret".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_connect_detects_generation() {
        let server = MockServer::start().await;
        let expected = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode("admin:secret")
        );
        Mock::given(method("GET"))
            .and(path(VERSION_PATH))
            .and(header("authorization", expected.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(version_body("3.1.0.0.0.1")))
            .expect(1)
            .mount(&server)
            .await;

        let connector = Connector::connect(&basic(&server), &TokenCache::default())
            .await
            .unwrap();
        assert_eq!(connector.generation(), ApiGeneration::V3);
        assert_eq!(connector.version().product_version, "3.1.0.0.0.1");
    }

    #[tokio::test]
    async fn test_remote_auth_rewrites_scheme() {
        let server = MockServer::start().await;
        let expected = format!(
            "Remote {}",
            base64::engine::general_purpose::STANDARD.encode("user@corp:pw")
        );
        Mock::given(method("GET"))
            .and(path(VERSION_PATH))
            .and(header("authorization", expected.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(version_body("2.5.1")))
            .expect(1)
            .mount(&server)
            .await;

        let config = ConnectorConfig::new(
            server.uri(),
            Credentials::Remote {
                username: "user@corp".to_string(),
                password: "pw".to_string(),
            },
        );
        let connector = Connector::connect(&config, &TokenCache::default())
            .await
            .unwrap();
        assert_eq!(connector.generation(), ApiGeneration::V2);
    }

    #[tokio::test]
    async fn test_api_token_exchange() {
        let auth = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/csp/gateway/am/api/auth/api-tokens/authorize"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "access-1"})),
            )
            .expect(1)
            .mount(&auth)
            .await;

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(VERSION_PATH))
            .and(header("csp-auth-token", "access-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(version_body("3.0.2")))
            .expect(2)
            .mount(&server)
            .await;

        let config = ConnectorConfig::new(
            server.uri(),
            Credentials::ApiToken {
                auth_host: auth.uri(),
                api_token: "refresh".to_string(),
            },
        );
        let tokens = TokenCache::default();
        Connector::connect(&config, &tokens).await.unwrap();
        Connector::connect(&config, &tokens).await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_credentials_fail_at_construction() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(VERSION_PATH))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let result = Connector::connect(&basic(&server), &TokenCache::default()).await;
        assert!(matches!(result, Err(NsxtError::AuthenticationFailed(_))));
    }

    #[tokio::test]
    async fn test_missing_host_is_rejected_without_calls() {
        let config = ConnectorConfig::new(
            " ",
            Credentials::Basic {
                username: "a".to_string(),
                password: "b".to_string(),
            },
        );
        let result = Connector::connect(&config, &TokenCache::default()).await;
        assert!(matches!(result, Err(NsxtError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_unreadable_ca_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ConnectorConfig::new(
            "nsx.example.com",
            Credentials::Basic {
                username: "admin".to_string(),
                password: "secret".to_string(),
            },
        );
        config.tls.ca_file = Some(dir.path().join("missing.pem"));

        let result = Connector::connect(&config, &TokenCache::default()).await;
        assert!(matches!(result, Err(NsxtError::Io(_))));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(VERSION_PATH))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(VERSION_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(version_body("3.2.0")))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = basic(&server);
        config.retries = 2;
        let connector = Connector::connect(&config, &TokenCache::default())
            .await
            .unwrap();
        assert_eq!(connector.generation(), ApiGeneration::V3);
    }
}
