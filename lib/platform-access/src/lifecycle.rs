//! Token lifecycle: validate, refresh, reconcile, or give up.
//!
//! For a user with a provider link, `resolve` decides whether the stored
//! access token is still good:
//!
//! 1. No link → `NotApplicable`. The provider is never contacted.
//! 2. Locally expired → refresh. Success is `Refreshed`, failure `Broken`.
//! 3. Otherwise → ask the provider to validate. Success reconciles the
//!    profile and yields `Valid`. Any failure falls back to one refresh
//!    attempt, since a token the local clock thinks is fine may already be
//!    dead at the provider.
//!
//! Provider failures of every kind are absorbed here and reduced to
//! `Broken`. Only persistence failures escape.

use chrono::Utc;
use provider_link_core::Result;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{ProviderError, StoreError};
use crate::link::ExternalAccountLink;
use crate::provider::ProviderClient;
use crate::reconcile::IdentityReconciler;
use crate::store::{TokenStore, UserDirectory};
use crate::user::LocalUser;

/// Result of checking a user's provider link for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValidationOutcome {
    /// The user has no link to this provider.
    NotApplicable,
    /// The provider accepted the stored token.
    Valid(ExternalAccountLink),
    /// A new token was obtained and stored.
    Refreshed(ExternalAccountLink),
    /// The link could not be validated or repaired.
    Broken,
}

impl TokenValidationOutcome {
    #[must_use]
    pub fn is_broken(&self) -> bool {
        matches!(self, Self::Broken)
    }

    /// The link behind a successful outcome.
    #[must_use]
    pub fn link(&self) -> Option<&ExternalAccountLink> {
        match self {
            Self::Valid(link) | Self::Refreshed(link) => Some(link),
            Self::NotApplicable | Self::Broken => None,
        }
    }
}

/// Runs the validate/refresh decision for one provider.
#[derive(Clone)]
pub struct TokenLifecycleManager {
    provider_id: String,
    store: Arc<dyn TokenStore>,
    provider: Arc<dyn ProviderClient>,
    reconciler: IdentityReconciler,
}

impl TokenLifecycleManager {
    #[must_use]
    pub fn new(
        provider_id: impl Into<String>,
        store: Arc<dyn TokenStore>,
        users: Arc<dyn UserDirectory>,
        provider: Arc<dyn ProviderClient>,
    ) -> Self {
        let reconciler = IdentityReconciler::new(store.clone(), users, provider.clone());
        Self {
            provider_id: provider_id.into(),
            store,
            provider,
            reconciler,
        }
    }

    /// Returns the provider identifier links are looked up by.
    #[must_use]
    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    /// Checks, and if needed repairs, `user`'s link to the provider.
    ///
    /// # Errors
    ///
    /// Returns an error only if reading or writing the link or user fails.
    #[instrument(skip_all, fields(user_id = %user.id(), provider = %self.provider_id))]
    pub async fn resolve(&self, user: &LocalUser) -> Result<TokenValidationOutcome, StoreError> {
        let Some(mut link) = self.store.find_link(user.id(), &self.provider_id).await? else {
            debug!("no provider link");
            return Ok(TokenValidationOutcome::NotApplicable);
        };

        if link.is_expired_at(Utc::now()) {
            debug!(account_id = %link.id(), "access token expired; refreshing");
            return self.refresh(link).await;
        }

        let validated = self.provider.validate(link.access_token()).await;
        match validated {
            Ok(profile) => {
                self.reconciler.reconcile(user, &mut link, &profile).await?;
                debug!(account_id = %link.id(), "access token valid");
                Ok(TokenValidationOutcome::Valid(link))
            }
            Err(report) => {
                warn!(
                    account_id = %link.id(),
                    error = %report,
                    "token validation failed; attempting refresh"
                );
                self.refresh(link).await
            }
        }
    }

    async fn refresh(
        &self,
        mut link: ExternalAccountLink,
    ) -> Result<TokenValidationOutcome, StoreError> {
        let Some(refresh_secret) = link.refresh_secret() else {
            warn!(
                account_id = %link.id(),
                error = %ProviderError::MissingRefreshSecret,
                "cannot refresh; link is broken"
            );
            return Ok(TokenValidationOutcome::Broken);
        };

        let refreshed = self.provider.refresh(refresh_secret).await;
        match refreshed {
            Ok(token) => {
                link.apply_refresh(token);
                self.store.save_link(&link).await?;
                info!(account_id = %link.id(), expires_at = ?link.expires_at(), "access token refreshed");
                Ok(TokenValidationOutcome::Refreshed(link))
            }
            Err(report) => {
                warn!(account_id = %link.id(), error = %report, "token refresh failed; link is broken");
                Ok(TokenValidationOutcome::Broken)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryTokenStore, InMemoryUserDirectory, ProviderCall, ScriptedProvider};
    use crate::provider::{ProviderProfile, RefreshedToken};
    use chrono::Duration;

    struct Fixture {
        store: Arc<InMemoryTokenStore>,
        users: Arc<InMemoryUserDirectory>,
        provider: Arc<ScriptedProvider>,
        manager: TokenLifecycleManager,
        user: LocalUser,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryTokenStore::new());
        let users = Arc::new(InMemoryUserDirectory::new("example.org"));
        let provider = Arc::new(ScriptedProvider::new());
        let manager =
            TokenLifecycleManager::new("sso", store.clone(), users.clone(), provider.clone());
        let user = LocalUser::new("Alice", "alice@user.example.org");
        users.insert(user.clone());
        Fixture {
            store,
            users,
            provider,
            manager,
            user,
        }
    }

    fn link_for(user: &LocalUser) -> ExternalAccountLink {
        ExternalAccountLink::new(user.id(), "sso", "token-1")
            .with_refresh_secret("refresh-1")
            .with_member("Alice", "alice@example.org")
    }

    fn new_token() -> RefreshedToken {
        RefreshedToken {
            access_token: "token-2".to_string(),
            refresh_secret: Some("refresh-2".to_string()),
            expires_at: Some(Utc::now() + Duration::hours(1)),
        }
    }

    #[tokio::test]
    async fn no_link_never_contacts_provider() {
        let f = fixture();
        f.store
            .insert(ExternalAccountLink::new(f.user.id(), "other", "t").with_refresh_secret("r"));

        let outcome = f.manager.resolve(&f.user).await.expect("resolve");

        assert_eq!(outcome, TokenValidationOutcome::NotApplicable);
        assert!(f.provider.calls().is_empty());
    }

    #[tokio::test]
    async fn expired_link_refreshes_without_validating() {
        let f = fixture();
        let link = link_for(&f.user).with_expires_at(Utc::now() - Duration::minutes(1));
        f.store.insert(link.clone());
        f.provider.set_refresh(Ok(new_token()));

        let outcome = f.manager.resolve(&f.user).await.expect("resolve");

        let TokenValidationOutcome::Refreshed(refreshed) = outcome else {
            panic!("expected refreshed outcome, got {outcome:?}");
        };
        assert_eq!(refreshed.access_token(), "token-2");
        assert_eq!(
            f.provider.calls(),
            vec![ProviderCall::Refresh("refresh-1".to_string())]
        );

        let stored = f.store.link(link.id()).expect("stored");
        assert_eq!(stored.access_token(), "token-2");
        assert_eq!(stored.refresh_secret(), Some("refresh-2"));
    }

    #[tokio::test]
    async fn expired_link_with_failed_refresh_is_broken() {
        let f = fixture();
        f.store
            .insert(link_for(&f.user).with_expires_at(Utc::now() - Duration::minutes(1)));
        f.provider.set_refresh(Err(ProviderError::OAuth {
            reason: "invalid_grant".to_string(),
        }));

        let outcome = f.manager.resolve(&f.user).await.expect("resolve");

        assert!(outcome.is_broken());
        assert_eq!(f.provider.calls().len(), 1);
        assert_eq!(f.store.writes(), 0);
    }

    #[tokio::test]
    async fn unexpired_link_validates_first() {
        let f = fixture();
        f.store
            .insert(link_for(&f.user).with_expires_at(Utc::now() + Duration::hours(1)));
        f.provider
            .set_validate(Ok(ProviderProfile::with_member_name("Alice")));

        let outcome = f.manager.resolve(&f.user).await.expect("resolve");

        assert!(matches!(outcome, TokenValidationOutcome::Valid(_)));
        assert_eq!(
            f.provider.calls(),
            vec![
                ProviderCall::Validate("token-1".to_string()),
                ProviderCall::FetchNotifyEmail("token-1".to_string()),
            ]
        );
        assert_eq!(f.store.writes(), 0);
    }

    #[tokio::test]
    async fn missing_expiry_validates_first() {
        let f = fixture();
        f.store.insert(link_for(&f.user));
        f.provider
            .set_validate(Ok(ProviderProfile::with_member_name("Alice")));

        let outcome = f.manager.resolve(&f.user).await.expect("resolve");

        assert!(matches!(outcome, TokenValidationOutcome::Valid(_)));
        assert_eq!(
            f.provider.calls().first(),
            Some(&ProviderCall::Validate("token-1".to_string()))
        );
    }

    #[tokio::test]
    async fn validation_failure_falls_back_to_refresh() {
        let f = fixture();
        f.store
            .insert(link_for(&f.user).with_expires_at(Utc::now() + Duration::hours(1)));
        f.provider.set_validate(Err(ProviderError::Rejected { status: 401 }));
        f.provider.set_refresh(Ok(new_token()));

        let outcome = f.manager.resolve(&f.user).await.expect("resolve");

        assert!(matches!(outcome, TokenValidationOutcome::Refreshed(_)));
        assert_eq!(
            f.provider.calls(),
            vec![
                ProviderCall::Validate("token-1".to_string()),
                ProviderCall::Refresh("refresh-1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn validation_and_refresh_failure_is_broken() {
        let f = fixture();
        f.store
            .insert(link_for(&f.user).with_expires_at(Utc::now() + Duration::hours(1)));
        f.provider.set_validate(Err(ProviderError::Transport {
            reason: "connection reset".to_string(),
        }));
        f.provider.set_refresh(Err(ProviderError::Rejected { status: 400 }));

        let outcome = f.manager.resolve(&f.user).await.expect("resolve");

        assert!(outcome.is_broken());
        assert_eq!(f.provider.calls().len(), 2);
    }

    #[tokio::test]
    async fn missing_refresh_secret_is_broken_without_calling_provider() {
        let f = fixture();
        f.store.insert(
            ExternalAccountLink::new(f.user.id(), "sso", "token-1")
                .with_expires_at(Utc::now() - Duration::minutes(1)),
        );

        let outcome = f.manager.resolve(&f.user).await.expect("resolve");

        assert!(outcome.is_broken());
        assert!(f.provider.calls().is_empty());
    }

    #[tokio::test]
    async fn valid_outcome_carries_reconciled_link() {
        let f = fixture();
        f.store.insert(link_for(&f.user));
        f.provider
            .set_validate(Ok(ProviderProfile::with_member_name("Alicia")));

        let outcome = f.manager.resolve(&f.user).await.expect("resolve");

        let link = outcome.link().expect("valid link");
        assert_eq!(link.member_name(), Some("Alicia"));
        assert_eq!(
            f.users.user(f.user.id()).expect("user").display_name(),
            "Alicia"
        );
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let f = fixture();
        f.store.fail_reads();

        assert!(f.manager.resolve(&f.user).await.is_err());
        assert!(f.provider.calls().is_empty());
    }
}
