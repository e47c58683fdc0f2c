//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables.
//!
//! See [`ProviderConfig`](provider_link_platform_access::ProviderConfig) for
//! the identity provider settings.

use provider_link_platform_access::ProviderConfig;
use serde::Deserialize;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Identity provider configuration.
    pub provider: ProviderConfig,

    /// Request guard configuration.
    #[serde(default)]
    pub guard: GuardConfig,
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Session duration in minutes.
    #[serde(default = "default_session_duration_minutes")]
    pub duration_minutes: i64,

    /// Interval between session cleanup runs, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

fn default_session_duration_minutes() -> i64 {
    5
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

fn default_secure_cookies() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_minutes: default_session_duration_minutes(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
            secure_cookies: default_secure_cookies(),
        }
    }
}

/// How the guard answers broken links and refused disconnects.
#[derive(Debug, Clone, Deserialize)]
pub struct GuardConfig {
    /// Paths under this prefix get a JSON 401 instead of a forced logout.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Where interactive requests go after a forced logout.
    #[serde(default = "default_logout_redirect_url")]
    pub logout_redirect_url: String,

    /// Where the disconnect action redirects afterwards.
    #[serde(default = "default_disconnect_redirect_url")]
    pub disconnect_redirect_url: String,

    /// Domain for synthetic contact emails (`{slug}@user.{domain}`).
    #[serde(default = "default_email_domain")]
    pub email_domain: String,
}

fn default_api_prefix() -> String {
    "/api/".to_string()
}

fn default_logout_redirect_url() -> String {
    "/".to_string()
}

fn default_disconnect_redirect_url() -> String {
    "/profile".to_string()
}

fn default_email_domain() -> String {
    "localhost".to_string()
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            api_prefix: default_api_prefix(),
            logout_redirect_url: default_logout_redirect_url(),
            disconnect_redirect_url: default_disconnect_redirect_url(),
            email_domain: default_email_domain(),
        }
    }
}

impl GuardConfig {
    /// Returns true if `path` is an API path.
    #[must_use]
    pub fn is_api_path(&self, path: &str) -> bool {
        path.starts_with(&self.api_prefix)
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
