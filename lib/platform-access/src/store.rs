//! Host seams: where links, users and sessions live.
//!
//! The host's persistence layer implements these. Writes are plain
//! overwrites; two requests refreshing the same link concurrently simply
//! race and the last write wins.

use async_trait::async_trait;
use provider_link_core::{AccountId, Result, UserId};

use crate::error::StoreError;
use crate::link::ExternalAccountLink;
use crate::session::{Session, SessionId};
use crate::user::LocalUser;

/// Storage for external account links.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Finds the user's link for `provider`. If several exist, the most
    /// recently created one wins.
    async fn find_link(
        &self,
        user_id: UserId,
        provider: &str,
    ) -> Result<Option<ExternalAccountLink>, StoreError>;

    /// Persists every field of `link`.
    async fn save_link(&self, link: &ExternalAccountLink) -> Result<(), StoreError>;

    /// Finds an account by ID, but only if `user_id` owns it.
    async fn find_account(
        &self,
        account_id: AccountId,
        user_id: UserId,
    ) -> Result<Option<ExternalAccountLink>, StoreError>;

    /// Removes an account owned by `user_id`. Returns whether a row was removed.
    async fn delete_account(&self, account_id: AccountId, user_id: UserId)
    -> Result<bool, StoreError>;
}

/// The host's user management.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, user_id: UserId) -> Result<Option<LocalUser>, StoreError>;

    async fn save_user(&self, user: &LocalUser) -> Result<(), StoreError>;

    /// Returns a display name derived from `raw` that no user holds yet.
    async fn generate_unique_display_name(&self, raw: &str) -> Result<String, StoreError>;

    /// Returns a synthetic email derived from `raw` that no user holds yet.
    async fn generate_unique_email(&self, raw: &str) -> Result<String, StoreError>;
}

/// Lookup and termination of local sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find_session(&self, id: &SessionId) -> Result<Option<Session>, StoreError>;

    async fn delete_session(&self, id: &SessionId) -> Result<(), StoreError>;
}
