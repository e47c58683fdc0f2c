//! Per-request context.
//!
//! One `RequestContext` is created when a request enters the guard and is
//! shared (behind an `Arc`) with the handler and with the response side of
//! the guard. It remembers who the request belongs to and memoizes the
//! token outcome, so the provider is consulted at most once per request no
//! matter how many times the outcome is asked for.

use provider_link_core::Result;
use std::sync::OnceLock;
use tokio::sync::OnceCell;

use crate::error::StoreError;
use crate::lifecycle::{TokenLifecycleManager, TokenValidationOutcome};
use crate::user::LocalUser;

/// Request-scoped user and memoized token outcome.
#[derive(Debug, Default)]
pub struct RequestContext {
    user: OnceLock<LocalUser>,
    outcome: OnceCell<TokenValidationOutcome>,
}

impl RequestContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the user this request belongs to.
    ///
    /// Returns false if a user was already recorded; the first one sticks.
    pub fn authenticate(&self, user: LocalUser) -> bool {
        self.user.set(user).is_ok()
    }

    /// Records a user the provider authenticated on this very request,
    /// e.g. through the provider's own OAuth2 bearer token.
    ///
    /// The provider already vouched for the token, so the outcome is fixed
    /// to `NotApplicable` and [`resolve_once`](Self::resolve_once) will not
    /// contact it again. Returns false, changing nothing, if a user was
    /// already recorded.
    pub fn authenticate_via_provider(&self, user: LocalUser) -> bool {
        if self.user.set(user).is_err() {
            return false;
        }
        // Nothing can have resolved yet: no user was known until now.
        let _ = self.outcome.set(TokenValidationOutcome::NotApplicable);
        true
    }

    #[must_use]
    pub fn user(&self) -> Option<&LocalUser> {
        self.user.get()
    }

    /// The outcome, if it has been resolved already.
    #[must_use]
    pub fn outcome(&self) -> Option<&TokenValidationOutcome> {
        self.outcome.get()
    }

    /// Resolves the user's token outcome unless it is already cached.
    ///
    /// Returns `None` while no user is known. Concurrent callers within
    /// the same request wait for the single resolution in flight.
    ///
    /// # Errors
    ///
    /// Propagates persistence failures from the lifecycle manager. Nothing
    /// is cached in that case.
    pub async fn resolve_once(
        &self,
        manager: &TokenLifecycleManager,
    ) -> Result<Option<&TokenValidationOutcome>, StoreError> {
        let Some(user) = self.user.get() else {
            return Ok(None);
        };
        let outcome = self
            .outcome
            .get_or_try_init(|| manager.resolve(user))
            .await?;
        Ok(Some(outcome))
    }
}
