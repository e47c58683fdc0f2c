//! Provider link maintenance for provider-link.
//!
//! This crate keeps a local user's identity in step with a remote OAuth2
//! identity provider across the lifetime of their tokens:
//! - `TokenLifecycleManager`: validate → refresh → reconcile → broken
//! - `IdentityReconciler`: carries provider renames and notify emails over
//! - `RequestContext`: memoizes the outcome for a single request
//! - `LinkProtectionPolicy`: refuses to disconnect the provider account
//!
//! Storage, user management and the provider itself are reached through
//! the traits in [`store`] and [`provider`]; the host supplies them.
//!
//! # Example
//!
//! ```
//! use chrono::{Duration, Utc};
//! use provider_link_core::UserId;
//! use provider_link_platform_access::ExternalAccountLink;
//!
//! let link = ExternalAccountLink::new(UserId::new(), "sso", "access-token")
//!     .with_refresh_secret("refresh-secret")
//!     .with_member("Kathy", "kathy@example.org")
//!     .with_expires_at(Utc::now() - Duration::minutes(1));
//!
//! // Expired links are refreshed before anything is validated.
//! assert!(link.is_expired_at(Utc::now()));
//! assert_eq!(link.member_name(), Some("Kathy"));
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod lifecycle;
pub mod link;
pub mod naming;
pub mod protection;
pub mod provider;
pub mod reconcile;
pub mod session;
pub mod store;
pub mod user;

#[cfg(any(test, feature = "testing"))]
pub mod memory;

pub use config::{ProviderConfig, ProviderConfigBuilder};
pub use context::RequestContext;
pub use error::{ProviderError, StoreError};
pub use lifecycle::{TokenLifecycleManager, TokenValidationOutcome};
pub use link::ExternalAccountLink;
pub use protection::{LinkProtectionPolicy, PROTECTED_ACCOUNT_MESSAGE};
pub use provider::{ProviderClient, ProviderProfile, RefreshedToken};
pub use reconcile::IdentityReconciler;
pub use session::{Session, SessionId};
pub use store::{SessionStore, TokenStore, UserDirectory};
pub use user::LocalUser;
