//! HTTP client implementation for the Vercel REST API

use std::time::Duration;

use reqwest::{Client, Method, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, warn};
use url::Url;

use crate::errors::EngineError;
use crate::utils::{calc_exp_backoff, version_info, CooldownOptions};

/// Retry policy applied to every API call
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Delay before retry `n` is `base_delay * multiplier^n`
    pub cooldown: CooldownOptions,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            cooldown: CooldownOptions::default(),
        }
    }
}

/// Whether a response status is worth retrying
pub fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// HTTP client for the deployment platform
pub struct VercelClient {
    client: Client,
    stream_client: Client,
    base_url: String,
    token: SecretString,
    team_id: Option<String>,
    retry: RetryOptions,
}

impl VercelClient {
    /// Create a new client
    pub fn new(
        base_url: &str,
        token: SecretString,
        team_id: Option<String>,
        retry: RetryOptions,
    ) -> Result<Self, EngineError> {
        let user_agent = format!("docsite-engine/{}", version_info().version);

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent.clone())
            .build()?;

        // Event streams stay open for the whole build
        let stream_client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            stream_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            team_id,
            retry,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, EngineError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| EngineError::ConfigError(format!("invalid API URL for {}: {}", path, e)))?;
        if let Some(team_id) = &self.team_id {
            url.query_pairs_mut().append_pair("teamId", team_id);
        }
        Ok(url)
    }

    /// Send a request, retrying rate-limited and 5xx responses
    pub(crate) async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, EngineError> {
        self.send_with(&self.client, method, path, body).await
    }

    /// Same as [`Self::send`] on the client without a total timeout
    pub(crate) async fn send_streaming(&self, path: &str) -> Result<Response, EngineError> {
        self.send_with::<()>(&self.stream_client, Method::GET, path, None)
            .await
    }

    async fn send_with<B: Serialize + ?Sized>(
        &self,
        client: &Client,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, EngineError> {
        let url = self.url(path)?;
        let mut attempt = 0;

        loop {
            debug!("{} {}", method, path);

            let mut request = client
                .request(method.clone(), url.clone())
                .bearer_auth(self.token.expose_secret());
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            if is_retryable(status) && attempt < self.retry.max_retries {
                let delay = calc_exp_backoff(&self.retry.cooldown, attempt);
                warn!(
                    "{} {} returned {}, retrying in {:?} (attempt {}/{})",
                    method,
                    path,
                    status,
                    delay,
                    attempt + 1,
                    self.retry.max_retries
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            if status != StatusCode::NOT_FOUND && status != StatusCode::CONFLICT {
                error!("{} {} failed: {} - {}", method, path, status, body);
            }
            return Err(EngineError::RemoteError {
                status: status.as_u16(),
                body,
            });
        }
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, EngineError> {
        let response = self.send::<()>(Method::GET, path, None).await?;
        Ok(response.json().await?)
    }

    /// Make a POST request
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, EngineError> {
        let response = self.send(Method::POST, path, Some(body)).await?;
        Ok(response.json().await?)
    }

    /// Make a PATCH request
    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, EngineError> {
        let response = self.send(Method::PATCH, path, Some(body)).await?;
        Ok(response.json().await?)
    }

    /// Make a DELETE request, ignoring the response body
    pub async fn delete(&self, path: &str) -> Result<(), EngineError> {
        self.send::<()>(Method::DELETE, path, None).await?;
        Ok(())
    }
}
