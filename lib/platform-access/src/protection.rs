//! Protection of the provider link against disconnection.
//!
//! Whatever handles the host's "disconnect account" action asks the policy
//! first. Links to this provider cannot be disconnected; anything else,
//! including accounts that cannot be found or belong to someone else, is
//! left to the host's normal path.

use provider_link_core::{AccountId, UserId};
use std::sync::Arc;
use tracing::warn;

use crate::store::TokenStore;

/// Message shown when a disconnect is refused.
pub const PROTECTED_ACCOUNT_MESSAGE: &str = "The provider account cannot be disconnected.";

/// Decides whether an account may be disconnected.
#[derive(Clone)]
pub struct LinkProtectionPolicy {
    provider_id: String,
    store: Arc<dyn TokenStore>,
}

impl LinkProtectionPolicy {
    #[must_use]
    pub fn new(provider_id: impl Into<String>, store: Arc<dyn TokenStore>) -> Self {
        Self {
            provider_id: provider_id.into(),
            store,
        }
    }

    /// Returns true if `account_id`, owned by `user_id`, links to this provider.
    pub async fn is_protected(&self, account_id: AccountId, user_id: UserId) -> bool {
        match self.store.find_account(account_id, user_id).await {
            Ok(Some(account)) => account.provider() == self.provider_id,
            Ok(None) => false,
            Err(report) => {
                warn!(%account_id, error = %report, "account lookup failed; not protecting");
                false
            }
        }
    }
}
