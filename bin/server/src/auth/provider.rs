//! HTTP client for the identity provider.
//!
//! Validation and the notify-email lookup are plain bearer-authenticated
//! GETs. Refresh goes through the OAuth2 token endpoint with the configured
//! client credentials.

use async_trait::async_trait;
use chrono::Utc;
use oauth2::{
    ClientId, ClientSecret, RefreshToken, RequestTokenError, TokenResponse, TokenUrl,
    basic::BasicClient,
};
use provider_link_core::Result;
use provider_link_platform_access::{
    ProviderClient, ProviderConfig, ProviderError, ProviderProfile, RefreshedToken,
};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::instrument;

/// `ProviderClient` that talks to the provider over HTTP.
#[derive(Clone)]
pub struct HttpProviderClient {
    http: reqwest::Client,
    client_id: ClientId,
    client_secret: ClientSecret,
    token_url: TokenUrl,
    validate_url: String,
    notify_email_url: String,
}

#[derive(Debug, Deserialize)]
struct NotifyEmailResponse {
    #[serde(default)]
    result: Option<NotifyEmailResult>,
}

#[derive(Debug, Deserialize)]
struct NotifyEmailResult {
    #[serde(default)]
    notify_email: Option<String>,
}

impl HttpProviderClient {
    /// Creates a client from the provider configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the token URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: &ProviderConfig) -> std::result::Result<Self, ProviderSetupError> {
        let token_url = TokenUrl::new(config.token_url().to_string())
            .map_err(|e| ProviderSetupError::Configuration(format!("invalid token URL: {e}")))?;

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.timeout())
            .build()
            .map_err(|e| ProviderSetupError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            client_id: ClientId::new(config.client_id().to_string()),
            client_secret: ClientSecret::new(config.client_secret().to_string()),
            token_url,
            validate_url: config.validate_url().to_string(),
            notify_email_url: config.notify_email_url().to_string(),
        })
    }

    async fn get_with_bearer(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
            }
            .into());
        }
        Ok(response)
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    #[instrument(skip_all)]
    async fn validate(&self, access_token: &str) -> Result<ProviderProfile, ProviderError> {
        let response = self.get_with_bearer(&self.validate_url, access_token).await?;
        Ok(response.json::<ProviderProfile>().await.map_err(invalid)?)
    }

    #[instrument(skip_all)]
    async fn refresh(&self, refresh_secret: &str) -> Result<RefreshedToken, ProviderError> {
        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_token_uri(self.token_url.clone());

        let token = client
            .exchange_refresh_token(&RefreshToken::new(refresh_secret.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| match e {
                RequestTokenError::ServerResponse(response) => ProviderError::OAuth {
                    reason: response.to_string(),
                },
                RequestTokenError::Request(e) => ProviderError::Transport {
                    reason: e.to_string(),
                },
                other => ProviderError::InvalidResponse {
                    reason: other.to_string(),
                },
            })?;

        let expires_at = token
            .expires_in()
            .and_then(|expires_in| chrono::Duration::from_std(expires_in).ok())
            .map(|expires_in| Utc::now() + expires_in);

        Ok(RefreshedToken {
            access_token: token.access_token().secret().clone(),
            refresh_secret: token.refresh_token().map(|t| t.secret().clone()),
            expires_at,
        })
    }

    #[instrument(skip_all)]
    async fn fetch_notify_email(
        &self,
        access_token: &str,
    ) -> Result<Option<String>, ProviderError> {
        let response = self
            .get_with_bearer(&self.notify_email_url, access_token)
            .await?;
        let body: NotifyEmailResponse = response.json().await.map_err(invalid)?;

        Ok(body
            .result
            .and_then(|result| result.notify_email)
            .filter(|email| !email.is_empty()))
    }
}

fn transport(e: reqwest::Error) -> ProviderError {
    ProviderError::Transport {
        reason: e.to_string(),
    }
}

fn invalid(e: reqwest::Error) -> ProviderError {
    ProviderError::InvalidResponse {
        reason: e.to_string(),
    }
}

/// Errors building the provider client at startup.
#[derive(Debug)]
pub enum ProviderSetupError {
    /// Configuration error (invalid URLs, etc.)
    Configuration(String),
    /// The HTTP client could not be built.
    HttpClient(String),
}

impl std::fmt::Display for ProviderSetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "provider configuration error: {msg}"),
            Self::HttpClient(msg) => write!(f, "provider HTTP client error: {msg}"),
        }
    }
}

impl std::error::Error for ProviderSetupError {}
