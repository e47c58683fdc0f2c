//! Identity provider configuration.
//!
//! A `ProviderConfig` is built once at startup and handed to the provider
//! client. It replaces any process-wide provider registry: everything the
//! lifecycle needs to know about the provider travels in this value.

use serde::{Deserialize, Serialize};

/// Configuration for the remote OAuth2 identity provider.
///
/// Fields with defaults can be omitted when loading from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Identifier stored on every external account link for this provider.
    /// Default: "sso"
    #[serde(default = "default_provider_id")]
    provider_id: String,
    /// The OAuth2 client ID registered with the provider.
    client_id: String,
    /// The OAuth2 client secret.
    client_secret: String,
    /// The OAuth2 token endpoint used for `grant_type=refresh_token`.
    token_url: String,
    /// Endpoint that returns the member profile for a bearer token.
    validate_url: String,
    /// Endpoint that returns the member's notification email.
    notify_email_url: String,
    /// Per-call timeout for provider requests, in seconds.
    /// Default: 10
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
}

fn default_provider_id() -> String {
    "sso".to_string()
}

fn default_timeout_seconds() -> u64 {
    10
}

impl ProviderConfig {
    /// Creates a builder with the required endpoint and credential fields.
    #[must_use]
    pub fn builder(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        token_url: impl Into<String>,
    ) -> ProviderConfigBuilder {
        ProviderConfigBuilder::new(client_id.into(), client_secret.into(), token_url.into())
    }

    /// Returns the provider identifier used on stored links.
    #[must_use]
    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    /// Returns the OAuth2 client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the OAuth2 client secret.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Returns the OAuth2 token endpoint.
    #[must_use]
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Returns the profile validation endpoint.
    #[must_use]
    pub fn validate_url(&self) -> &str {
        &self.validate_url
    }

    /// Returns the notification email endpoint.
    #[must_use]
    pub fn notify_email_url(&self) -> &str {
        &self.notify_email_url
    }

    /// Returns the per-call timeout.
    #[must_use]
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_seconds)
    }
}

/// Builder for `ProviderConfig`.
#[derive(Debug)]
pub struct ProviderConfigBuilder {
    provider_id: String,
    client_id: String,
    client_secret: String,
    token_url: String,
    validate_url: String,
    notify_email_url: String,
    timeout_seconds: u64,
}

impl ProviderConfigBuilder {
    fn new(client_id: String, client_secret: String, token_url: String) -> Self {
        Self {
            provider_id: default_provider_id(),
            client_id,
            client_secret,
            token_url,
            validate_url: String::new(),
            notify_email_url: String::new(),
            timeout_seconds: default_timeout_seconds(),
        }
    }

    /// Sets the provider identifier.
    #[must_use]
    pub fn provider_id(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = provider_id.into();
        self
    }

    /// Sets the profile validation endpoint.
    #[must_use]
    pub fn validate_url(mut self, url: impl Into<String>) -> Self {
        self.validate_url = url.into();
        self
    }

    /// Sets the notification email endpoint.
    #[must_use]
    pub fn notify_email_url(mut self, url: impl Into<String>) -> Self {
        self.notify_email_url = url.into();
        self
    }

    /// Sets the per-call timeout in seconds.
    #[must_use]
    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Builds the `ProviderConfig`.
    #[must_use]
    pub fn build(self) -> ProviderConfig {
        ProviderConfig {
            provider_id: self.provider_id,
            client_id: self.client_id,
            client_secret: self.client_secret,
            token_url: self.token_url,
            validate_url: self.validate_url,
            notify_email_url: self.notify_email_url,
            timeout_seconds: self.timeout_seconds,
        }
    }
}
