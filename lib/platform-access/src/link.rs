//! External account links.
//!
//! A link is the stored association between one local user and their
//! account at the identity provider: the OAuth2 tokens plus the profile
//! fields the provider last reported ("extra data"). The remembered
//! `member.name` is the only reliable way to notice a provider-side rename,
//! because the local display name may carry a disambiguating suffix.

use chrono::{DateTime, Utc};
use provider_link_core::{AccountId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::provider::RefreshedToken;

const MEMBER: &str = "member";
const NAME: &str = "name";
const EMAIL: &str = "email";

/// One external account link per (user, provider).
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalAccountLink {
    id: AccountId,
    user_id: UserId,
    provider: String,
    access_token: String,
    refresh_secret: Option<String>,
    /// `None` means the provider never told us; treated as not expired.
    expires_at: Option<DateTime<Utc>>,
    extra_data: Map<String, Value>,
}

impl ExternalAccountLink {
    /// Creates a link with a fresh account ID and no remembered profile.
    #[must_use]
    pub fn new(user_id: UserId, provider: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            id: AccountId::new(),
            user_id,
            provider: provider.into(),
            access_token: access_token.into(),
            refresh_secret: None,
            expires_at: None,
            extra_data: Map::new(),
        }
    }

    /// Reconstitutes a link from storage.
    #[must_use]
    pub fn with_all_fields(
        id: AccountId,
        user_id: UserId,
        provider: String,
        access_token: String,
        refresh_secret: Option<String>,
        expires_at: Option<DateTime<Utc>>,
        extra_data: Map<String, Value>,
    ) -> Self {
        Self {
            id,
            user_id,
            provider,
            access_token,
            refresh_secret,
            expires_at,
            extra_data,
        }
    }

    /// Sets the refresh secret.
    #[must_use]
    pub fn with_refresh_secret(mut self, secret: impl Into<String>) -> Self {
        self.refresh_secret = Some(secret.into());
        self
    }

    /// Sets the expiry.
    #[must_use]
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Sets the remembered member name and email.
    #[must_use]
    pub fn with_member(mut self, name: &str, email: &str) -> Self {
        self.set_member_name(name);
        self.set_member_email(email);
        self
    }

    #[must_use]
    pub fn id(&self) -> AccountId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    #[must_use]
    pub fn refresh_secret(&self) -> Option<&str> {
        self.refresh_secret.as_deref()
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    #[must_use]
    pub fn extra_data(&self) -> &Map<String, Value> {
        &self.extra_data
    }

    /// Returns true if the token expired at or before `now`.
    ///
    /// A link without an expiry is never considered expired here; the
    /// provider is asked to validate it instead.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// The provider-side name recorded at the last reconciliation.
    #[must_use]
    pub fn member_name(&self) -> Option<&str> {
        self.member_field(NAME)
    }

    /// The member's real (notification) email as last reported.
    #[must_use]
    pub fn member_email(&self) -> Option<&str> {
        self.member_field(EMAIL)
    }

    pub fn set_member_name(&mut self, name: &str) {
        self.set_member_field(NAME, name);
    }

    pub fn set_member_email(&mut self, email: &str) {
        self.set_member_field(EMAIL, email);
    }

    /// Stores a freshly issued token. The refresh secret is kept unless
    /// the provider rotated it.
    pub fn apply_refresh(&mut self, token: RefreshedToken) {
        self.access_token = token.access_token;
        if let Some(secret) = token.refresh_secret {
            self.refresh_secret = Some(secret);
        }
        self.expires_at = token.expires_at;
    }

    fn member_field(&self, field: &str) -> Option<&str> {
        self.extra_data
            .get(MEMBER)
            .and_then(|member| member.get(field))
            .and_then(Value::as_str)
    }

    fn set_member_field(&mut self, field: &str, value: &str) {
        let member = self
            .extra_data
            .entry(MEMBER)
            .or_insert_with(|| Value::Object(Map::new()));
        if !member.is_object() {
            *member = Value::Object(Map::new());
        }
        if let Value::Object(map) = member {
            map.insert(field.to_string(), Value::from(value));
        }
    }
}

// Tokens stay out of logs.
impl fmt::Debug for ExternalAccountLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalAccountLink")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("provider", &self.provider)
            .field("has_refresh_secret", &self.refresh_secret.is_some())
            .field("expires_at", &self.expires_at)
            .field("extra_data", &self.extra_data)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn link() -> ExternalAccountLink {
        ExternalAccountLink::new(UserId::new(), "sso", "token-1")
    }

    #[test]
    fn missing_expiry_is_not_expired() {
        assert!(!link().is_expired_at(Utc::now()));
    }

    #[test]
    fn expiry_boundary_counts_as_expired() {
        let now = Utc::now();
        assert!(link().with_expires_at(now).is_expired_at(now));
        assert!(!link().with_expires_at(now + Duration::minutes(5)).is_expired_at(now));
    }

    #[test]
    fn member_fields_are_created_on_demand() {
        let mut link = link();
        assert_eq!(link.member_name(), None);

        link.set_member_name("Alice");
        link.set_member_email("alice@example.org");

        assert_eq!(link.member_name(), Some("Alice"));
        assert_eq!(link.member_email(), Some("alice@example.org"));
        assert_eq!(
            link.extra_data().get("member"),
            Some(&json!({"name": "Alice", "email": "alice@example.org"}))
        );
    }

    #[test]
    fn non_object_member_is_replaced() {
        let mut extra = Map::new();
        extra.insert("member".to_string(), json!("garbage"));
        extra.insert("id".to_string(), json!(42));
        let mut link = ExternalAccountLink::with_all_fields(
            AccountId::new(),
            UserId::new(),
            "sso".to_string(),
            "t".to_string(),
            None,
            None,
            extra,
        );

        link.set_member_name("Alice");

        assert_eq!(link.member_name(), Some("Alice"));
        assert_eq!(link.extra_data().get("id"), Some(&json!(42)));
    }

    #[test]
    fn apply_refresh_keeps_secret_when_not_rotated() {
        let mut link = link().with_refresh_secret("r-1");
        let expires_at = Utc::now() + Duration::hours(1);

        link.apply_refresh(RefreshedToken {
            access_token: "token-2".to_string(),
            refresh_secret: None,
            expires_at: Some(expires_at),
        });

        assert_eq!(link.access_token(), "token-2");
        assert_eq!(link.refresh_secret(), Some("r-1"));
        assert_eq!(link.expires_at(), Some(expires_at));
    }

    #[test]
    fn apply_refresh_rotates_secret() {
        let mut link = link().with_refresh_secret("r-1");

        link.apply_refresh(RefreshedToken {
            access_token: "token-2".to_string(),
            refresh_secret: Some("r-2".to_string()),
            expires_at: None,
        });

        assert_eq!(link.refresh_secret(), Some("r-2"));
        assert_eq!(link.expires_at(), None);
    }

    #[test]
    fn debug_output_hides_tokens() {
        let rendered = format!("{:?}", link().with_refresh_secret("super-secret"));
        assert!(!rendered.contains("token-1"));
        assert!(!rendered.contains("super-secret"));
    }
}
