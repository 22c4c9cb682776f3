use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::{BoxFuture, Signaling};
use crate::error::{Error, Result};
use crate::protocol::models::SessionConfig;

pub const BASE_URL: &str = "https://api.openai.com/v1/realtime";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

pub type TokenCallback = Arc<dyn Fn() -> BoxFuture<'static, Result<String>> + Send + Sync>;

/// Where connection credentials come from. Consulted once per attempt.
#[derive(Clone)]
pub enum CredentialProvider {
    /// A long-lived API key, exchanged for an ephemeral client secret
    /// before every connection.
    ApiKey(String),
    /// A caller routine returning a ready-to-use ephemeral token.
    Callback(TokenCallback),
}

impl CredentialProvider {
    /// Read `OPENAI_API_KEY` from the environment.
    ///
    /// # Errors
    /// Returns an error if the variable is unset or empty.
    #[allow(clippy::result_large_err)]
    pub fn from_env() -> Result<Self> {
        match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.trim().is_empty() => Ok(Self::ApiKey(key)),
            _ => Err(Error::InvalidConfig("OPENAI_API_KEY is not set".to_string())),
        }
    }

    pub fn callback<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<String>> + Send + 'static,
    {
        Self::Callback(Arc::new(move || -> BoxFuture<'static, Result<String>> { Box::pin(f()) }))
    }
}

impl std::fmt::Debug for CredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("CredentialProvider::ApiKey(<redacted>)"),
            Self::Callback(_) => f.write_str("CredentialProvider::Callback"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSecret {
    pub value: String,
    #[serde(default)]
    pub expires_at: Option<u64>,
}

#[derive(Debug, Serialize)]
struct CreateClientSecretRequest<'a> {
    session: &'a SessionConfig,
}

/// Signaling over the realtime REST endpoints: `client_secrets` for
/// credentials and `calls` for the SDP exchange.
#[derive(Clone, Debug)]
pub struct RestSignaling {
    client: Client,
    credentials: CredentialProvider,
    base_url: String,
}

impl RestSignaling {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    #[allow(clippy::result_large_err)]
    pub fn new(credentials: CredentialProvider) -> Result<Self> {
        Self::new_with_timeouts(credentials, DEFAULT_TIMEOUT, DEFAULT_POOL_IDLE_TIMEOUT)
    }

    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    #[allow(clippy::result_large_err)]
    pub fn new_with_timeouts(
        credentials: CredentialProvider,
        timeout: Duration,
        pool_idle_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(pool_idle_timeout)
            .build()?;

        Ok(Self {
            client,
            credentials,
            base_url: BASE_URL.to_string(),
        })
    }

    /// `OPENAI_API_KEY` credentials, with `OPENAI_BASE_URL` overriding the
    /// endpoint when set.
    ///
    /// # Errors
    /// Returns an error if the key is missing or the client cannot be built.
    #[allow(clippy::result_large_err)]
    pub fn from_env() -> Result<Self> {
        let signaling = Self::new(CredentialProvider::from_env()?)?;
        Ok(match std::env::var("OPENAI_BASE_URL") {
            Ok(url) if !url.trim().is_empty() => signaling.with_base_url(url),
            _ => signaling,
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Mint an ephemeral client secret bound to `session`.
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails or returns a non-success status.
    pub async fn create_client_secret(&self, api_key: &str, session: &SessionConfig) -> Result<ClientSecret> {
        let auth_header = HeaderValue::from_str(&format!("Bearer {api_key}"))?;
        let res = self
            .client
            .post(format!("{}/client_secrets", self.base_url))
            .header(AUTHORIZATION, auth_header)
            .json(&CreateClientSecretRequest { session })
            .send()
            .await?
            .error_for_status()?;

        Ok(res.json().await?)
    }
}

#[async_trait]
impl Signaling for RestSignaling {
    async fn credential(&self, session: &SessionConfig) -> Result<String> {
        match &self.credentials {
            CredentialProvider::ApiKey(key) => Ok(self.create_client_secret(key, session).await?.value),
            CredentialProvider::Callback(fetch) => fetch().await,
        }
    }

    async fn exchange_offer(&self, offer_sdp: String, credential: &str, model: &str) -> Result<String> {
        let mut url = url::Url::parse(&format!("{}/calls", self.base_url))?;
        url.query_pairs_mut().append_pair("model", model);

        let auth_header = HeaderValue::from_str(&format!("Bearer {credential}"))?;
        let res = self
            .client
            .post(url)
            .header(AUTHORIZATION, auth_header)
            .header(CONTENT_TYPE, "application/sdp")
            .body(offer_sdp)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            tracing::warn!(%status, "SDP exchange rejected");
            return Err(Error::Signaling(format!("SDP exchange failed: {status}")));
        }
        Ok(res.text().await?)
    }
}
