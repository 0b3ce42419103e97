//! REST transport shared by the policy and manager clients

use crate::auth::Authenticator;
use crate::error::{NsxtError, Result};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Retry configuration for transient control-plane failures
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Retry `retries` times after the first attempt.
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_attempts: retries.saturating_add(1),
            ..Self::default()
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        if !millis.is_finite() || millis >= self.max_delay.as_millis() as f64 {
            return self.max_delay;
        }
        Duration::from_millis(millis.round() as u64)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

/// Authenticated HTTP access to one control-plane host
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    auth: Authenticator,
    retry: RetryConfig,
}

impl RestClient {
    pub(crate) fn new(
        http: reqwest::Client,
        base_url: String,
        auth: Authenticator,
        retry: RetryConfig,
    ) -> Self {
        Self {
            http,
            base_url,
            auth,
            retry,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let body = self.send(Method::GET, path, query, None).await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn patch<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let body = serde_json::to_value(body)?;
        self.send(Method::PATCH, path, &[], Some(&body)).await?;
        Ok(())
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body)?;
        let response = self.send(Method::POST, path, &[], Some(&body)).await?;
        Ok(serde_json::from_str(&response)?)
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body)?;
        let response = self.send(Method::PUT, path, &[], Some(&body)).await?;
        Ok(serde_json::from_str(&response)?)
    }

    pub async fn delete(&self, path: &str, query: &[(&str, String)]) -> Result<()> {
        self.send(Method::DELETE, path, query, None).await?;
        Ok(())
    }

    /// Send a request, retrying transient failures, and return the body.
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;
        loop {
            match self.send_once(method.clone(), &url, path, query, body).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt + 1 < self.retry.max_attempts => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::debug!(
                        "{} {} failed ({}), retrying in {:?}",
                        method,
                        path,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<String> {
        let mut request = self.http.request(method.clone(), url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        let request = self.auth.authorize(&self.http, request).await?;

        tracing::debug!("{} {}", method, path);
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            self.auth.rejected().await;
            return Err(NsxtError::AuthenticationFailed(format!(
                "{} {} returned HTTP {}",
                method,
                path,
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(NsxtError::from_response(status.as_u16(), &text, path));
        }
        Ok(text)
    }
}

/// Cursor query parameter, empty when listing the first page
pub(crate) fn cursor_query(cursor: Option<String>) -> Vec<(&'static str, String)> {
    cursor
        .filter(|c| !c.is_empty())
        .map(|c| vec![("cursor", c)])
        .unwrap_or_default()
}
