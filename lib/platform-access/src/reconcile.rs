//! Identity reconciliation.
//!
//! Carries provider-side profile changes into the local records:
//! - A rename at the provider regenerates the local display name and the
//!   synthetic contact email. Renames are detected against the name
//!   remembered on the link, never against the local display name, which
//!   may have gained a suffix ("Kathy 17") to stay unique.
//! - A changed notification email is remembered on the link only. It is
//!   never copied to the user's contact email.
//!
//! Reconciling twice with the same provider data writes nothing the second
//! time.

use provider_link_core::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::link::ExternalAccountLink;
use crate::provider::{ProviderClient, ProviderProfile};
use crate::store::{TokenStore, UserDirectory};
use crate::user::LocalUser;

/// Applies provider profile changes to a link and its user.
#[derive(Clone)]
pub struct IdentityReconciler {
    store: Arc<dyn TokenStore>,
    users: Arc<dyn UserDirectory>,
    provider: Arc<dyn ProviderClient>,
}

impl IdentityReconciler {
    #[must_use]
    pub fn new(
        store: Arc<dyn TokenStore>,
        users: Arc<dyn UserDirectory>,
        provider: Arc<dyn ProviderClient>,
    ) -> Self {
        Self {
            store,
            users,
            provider,
        }
    }

    /// Reconciles `link` (and, on rename, `user`) with `profile`.
    ///
    /// `link` is updated in place so callers see what was persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting the link or the user fails. A
    /// failure to fetch the notification email is logged and ignored.
    pub async fn reconcile(
        &self,
        user: &LocalUser,
        link: &mut ExternalAccountLink,
        profile: &ProviderProfile,
    ) -> Result<(), StoreError> {
        match profile.member_name() {
            Some(provider_name) if link.member_name() != Some(provider_name) => {
                self.apply_rename(user, link, provider_name).await?;
            }
            Some(_) => {}
            None => debug!(account_id = %link.id(), "provider profile carries no member name"),
        }

        self.sync_notify_email(link).await
    }

    async fn apply_rename(
        &self,
        user: &LocalUser,
        link: &mut ExternalAccountLink,
        provider_name: &str,
    ) -> Result<(), StoreError> {
        info!(
            user_id = %user.id(),
            account_id = %link.id(),
            "member renamed at provider; regenerating local identity"
        );

        link.set_member_name(provider_name);
        self.store.save_link(link).await?;

        let mut renamed = user.clone();
        renamed.set_display_name(self.users.generate_unique_display_name(provider_name).await?);
        renamed.set_contact_email(self.users.generate_unique_email(provider_name).await?);
        self.users.save_user(&renamed).await
    }

    async fn sync_notify_email(&self, link: &mut ExternalAccountLink) -> Result<(), StoreError> {
        let notify_email = match self.provider.fetch_notify_email(link.access_token()).await {
            Ok(email) => email,
            Err(report) => {
                warn!(account_id = %link.id(), error = %report, "could not fetch notify email");
                None
            }
        };

        let Some(notify_email) = notify_email.filter(|email| !email.is_empty()) else {
            return Ok(());
        };
        if link.member_email() == Some(notify_email.as_str()) {
            return Ok(());
        }

        debug!(account_id = %link.id(), "notify email changed at provider");
        link.set_member_email(&notify_email);
        self.store.save_link(link).await
    }
}
