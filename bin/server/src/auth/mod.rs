//! Session authentication and the provider link guard.
//!
//! This module provides:
//! - Postgres implementations of the token, user and session stores
//! - The HTTP client for the identity provider
//! - `link_guard`, the middleware that checks the session user's provider
//!   link once per request and turns a broken link into a 401 (API) or a
//!   forced logout (interactive)
//! - The logout and account disconnect routes
//!
//! Login itself belongs to the host; this server only consumes sessions.

pub mod db;
pub mod middleware;
pub mod provider;
pub mod routes;

#[cfg(test)]
mod testing;

use provider_link_platform_access::{
    LinkProtectionPolicy, ProviderClient, ProviderConfig, SessionStore, TokenLifecycleManager,
    TokenStore, UserDirectory,
};
use std::sync::Arc;

use crate::config::{GuardConfig, SessionConfig};

pub use middleware::{AuthRejection, ProviderClientId, RequireAuth, link_guard};
pub use provider::HttpProviderClient;
pub use routes::{disconnect_account, link_status, logout};

/// Shared application state.
pub struct AppState {
    /// Session lookup and termination.
    pub sessions: Arc<dyn SessionStore>,
    /// Local users.
    pub users: Arc<dyn UserDirectory>,
    /// External account links.
    pub tokens: Arc<dyn TokenStore>,
    /// Validate/refresh/reconcile for the configured provider.
    pub lifecycle: TokenLifecycleManager,
    /// Refuses disconnection of provider accounts.
    pub protection: LinkProtectionPolicy,
    /// Client ID attached to every request.
    pub client_id: String,
    /// Session configuration.
    pub session_config: SessionConfig,
    /// Guard configuration.
    pub guard: GuardConfig,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        provider_config: &ProviderConfig,
        provider: Arc<dyn ProviderClient>,
        tokens: Arc<dyn TokenStore>,
        users: Arc<dyn UserDirectory>,
        sessions: Arc<dyn SessionStore>,
        session_config: SessionConfig,
        guard: GuardConfig,
    ) -> Self {
        let provider_id = provider_config.provider_id();
        Self {
            lifecycle: TokenLifecycleManager::new(
                provider_id,
                tokens.clone(),
                users.clone(),
                provider,
            ),
            protection: LinkProtectionPolicy::new(provider_id, tokens.clone()),
            client_id: provider_config.client_id().to_string(),
            sessions,
            users,
            tokens,
            session_config,
            guard,
        }
    }
}
