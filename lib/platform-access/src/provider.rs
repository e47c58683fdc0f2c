//! The identity provider contract.
//!
//! These three calls are the only network I/O in the token lifecycle.
//! Implementations must map every failure (transport, timeout, non-success
//! status, OAuth2 error) into a `ProviderError`; the lifecycle treats them
//! all alike.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use provider_link_core::Result;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ProviderError;

/// Profile returned by a successful validation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProviderProfile {
    #[serde(default)]
    member: Value,
}

impl ProviderProfile {
    /// Builds a profile carrying only a member name.
    #[must_use]
    pub fn with_member_name(name: &str) -> Self {
        Self {
            member: serde_json::json!({ "name": name }),
        }
    }

    /// The member's current name at the provider.
    #[must_use]
    pub fn member_name(&self) -> Option<&str> {
        self.member.get("name").and_then(Value::as_str)
    }
}

/// A token issued by a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub access_token: String,
    /// Present only when the provider rotated the refresh secret.
    pub refresh_secret: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Client for the remote identity provider.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Asks the provider whether `access_token` is valid and returns the
    /// member profile if it is.
    async fn validate(&self, access_token: &str) -> Result<ProviderProfile, ProviderError>;

    /// Exchanges a refresh secret for a new access token.
    async fn refresh(&self, refresh_secret: &str) -> Result<RefreshedToken, ProviderError>;

    /// Fetches the member's notification email, if the provider has one.
    async fn fetch_notify_email(&self, access_token: &str)
    -> Result<Option<String>, ProviderError>;
}
