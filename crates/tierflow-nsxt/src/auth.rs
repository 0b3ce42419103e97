//! Credential modes and the bearer token cache

use crate::error::{NsxtError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::RequestBuilder;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

/// Header carrying an exchanged access token
pub const TOKEN_HEADER: &str = "csp-auth-token";

const AUTHORIZE_PATH: &str = "/csp/gateway/am/api/auth/api-tokens/authorize";

/// How requests against the control plane are authenticated
#[derive(Clone)]
pub enum Credentials {
    /// HTTP basic authentication with a local user
    Basic { username: String, password: String },

    /// Identity-provider user; the basic credentials are sent with the
    /// `Remote` authorization scheme instead of `Basic`
    Remote { username: String, password: String },

    /// Long-lived API token exchanged for short-lived access tokens at a
    /// separate authorization host
    ApiToken { auth_host: String, api_token: String },
}

impl Credentials {
    pub fn mode(&self) -> &'static str {
        match self {
            Credentials::Basic { .. } => "basic",
            Credentials::Remote { .. } => "remote",
            Credentials::ApiToken { .. } => "api-token",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Credentials::Basic { username, password }
            | Credentials::Remote { username, password } => {
                if username.is_empty() || password.is_empty() {
                    return Err(NsxtError::InvalidConfig(
                        "username and password must be set".to_string(),
                    ));
                }
            }
            Credentials::ApiToken {
                auth_host,
                api_token,
            } => {
                if auth_host.is_empty() || api_token.is_empty() {
                    return Err(NsxtError::InvalidConfig(
                        "auth host and API token must be set".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Basic { username, .. } | Credentials::Remote { username, .. } => f
                .debug_struct("Credentials")
                .field("mode", &self.mode())
                .field("username", username)
                .finish_non_exhaustive(),
            Credentials::ApiToken { auth_host, .. } => f
                .debug_struct("Credentials")
                .field("mode", &self.mode())
                .field("auth_host", auth_host)
                .finish_non_exhaustive(),
        }
    }
}

/// Prefix a bare host name with `https://`.
pub(crate) fn base_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TokenKey {
    auth_host: String,
    fingerprint: u64,
}

impl TokenKey {
    fn new(auth_host: &str, api_token: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        api_token.hash(&mut hasher);
        Self {
            auth_host: auth_host.to_string(),
            fingerprint: hasher.finish(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthorizeResponse {
    access_token: String,
}

/// Bounded, TTL-evicting cache of exchanged access tokens
///
/// Owned by whoever builds connectors and handed to each of them, so tests
/// get a fresh cache and production code shares one across clusters.
#[derive(Clone)]
pub struct TokenCache {
    tokens: moka::future::Cache<TokenKey, Arc<str>>,
}

impl TokenCache {
    /// Access tokens are valid for 30 minutes; refresh well before that.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(25 * 60);

    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            tokens: moka::future::Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Cached token for the API token, exchanging it on a miss.
    pub async fn access_token(
        &self,
        http: &reqwest::Client,
        auth_host: &str,
        api_token: &str,
    ) -> Result<Arc<str>> {
        let key = TokenKey::new(auth_host, api_token);
        self.tokens
            .try_get_with(key, exchange(http, auth_host, api_token))
            .await
            .map_err(|e| NsxtError::AuthenticationFailed(e.to_string()))
    }

    /// Drop a token the control plane rejected.
    pub async fn invalidate(&self, auth_host: &str, api_token: &str) {
        self.tokens
            .invalidate(&TokenKey::new(auth_host, api_token))
            .await;
    }

    pub fn entry_count(&self) -> u64 {
        self.tokens.entry_count()
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(256, Self::DEFAULT_TTL)
    }
}

async fn exchange(http: &reqwest::Client, auth_host: &str, api_token: &str) -> Result<Arc<str>> {
    let url = format!("{}{}", base_url(auth_host), AUTHORIZE_PATH);
    tracing::debug!("Exchanging API token at {}", auth_host);

    let response = http
        .post(&url)
        .form(&[("refresh_token", api_token)])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(NsxtError::AuthenticationFailed(format!(
            "token exchange at {} returned HTTP {}",
            auth_host,
            status.as_u16()
        )));
    }

    let body: AuthorizeResponse = response.json().await?;
    Ok(Arc::from(body.access_token))
}

/// Attaches credentials to outgoing requests
#[derive(Clone)]
pub(crate) struct Authenticator {
    credentials: Credentials,
    tokens: TokenCache,
}

impl Authenticator {
    pub(crate) fn new(credentials: Credentials, tokens: TokenCache) -> Self {
        Self {
            credentials,
            tokens,
        }
    }

    pub(crate) async fn authorize(
        &self,
        http: &reqwest::Client,
        request: RequestBuilder,
    ) -> Result<RequestBuilder> {
        Ok(match &self.credentials {
            Credentials::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
            Credentials::Remote { username, password } => {
                let encoded = STANDARD.encode(format!("{}:{}", username, password));
                request.header(AUTHORIZATION, format!("Remote {}", encoded))
            }
            Credentials::ApiToken {
                auth_host,
                api_token,
            } => {
                let token = self.tokens.access_token(http, auth_host, api_token).await?;
                request.header(TOKEN_HEADER, token.as_ref())
            }
        })
    }

    /// Forget cached state after the control plane answered 401.
    pub(crate) async fn rejected(&self) {
        if let Credentials::ApiToken {
            auth_host,
            api_token,
        } = &self.credentials
        {
            self.tokens.invalidate(auth_host, api_token).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_base_url() {
        assert_eq!(base_url("nsx.example.com"), "https://nsx.example.com");
        assert_eq!(base_url("http://127.0.0.1:8080/"), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_validate_rejects_empty_password() {
        let creds = Credentials::Basic {
            username: "admin".to_string(),
            password: String::new(),
        };
        assert!(matches!(creds.validate(), Err(NsxtError::InvalidConfig(_))));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let creds = Credentials::Remote {
            username: "admin".to_string(),
            password: "s3cret".to_string(),
        };
        let debug = format!("{:?}", creds);
        assert!(debug.contains("admin"));
        assert!(!debug.contains("s3cret"));
    }

    #[tokio::test]
    async fn test_token_exchanged_once_per_ttl() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(AUTHORIZE_PATH))
            .and(body_string_contains("refresh_token=api-token-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "short-lived"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let cache = TokenCache::new(10, Duration::from_secs(60));
        let http = reqwest::Client::new();
        for _ in 0..3 {
            let token = cache
                .access_token(&http, &server.uri(), "api-token-1")
                .await
                .unwrap();
            assert_eq!(token.as_ref(), "short-lived");
        }
    }

    #[tokio::test]
    async fn test_failed_exchange_is_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(AUTHORIZE_PATH))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;

        let cache = TokenCache::new(10, Duration::from_secs(60));
        let http = reqwest::Client::new();
        for _ in 0..2 {
            let err = cache
                .access_token(&http, &server.uri(), "bad")
                .await
                .unwrap_err();
            assert!(matches!(err, NsxtError::AuthenticationFailed(_)));
        }
    }
}
