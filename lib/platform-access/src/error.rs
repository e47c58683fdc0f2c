//! Error types for the platform-access crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `ProviderError`: failures talking to the identity provider. These never
//!   leave the lifecycle manager; they are reduced to a `Broken` outcome.
//! - `StoreError`: persistence failures in the host. These propagate.

use std::fmt;

/// Errors from provider calls (validate, refresh, notify email).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider could not be reached, or the call timed out.
    Transport { reason: String },
    /// The provider answered with a non-success HTTP status.
    Rejected { status: u16 },
    /// The token endpoint returned an OAuth2 error.
    OAuth { reason: String },
    /// The provider answered successfully but the body was unusable.
    InvalidResponse { reason: String },
    /// A refresh was needed but the link has no refresh secret.
    MissingRefreshSecret,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport { reason } => {
                write!(f, "provider transport failure: {reason}")
            }
            Self::Rejected { status } => {
                write!(f, "provider rejected the request with status {status}")
            }
            Self::OAuth { reason } => {
                write!(f, "provider OAuth2 error: {reason}")
            }
            Self::InvalidResponse { reason } => {
                write!(f, "invalid provider response: {reason}")
            }
            Self::MissingRefreshSecret => {
                write!(f, "no refresh secret stored for link")
            }
        }
    }
}

impl std::error::Error for ProviderError {}

/// Errors from the host's persistence layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The database call failed.
    Database { details: String },
    /// A stored row could not be turned back into a domain value.
    Corrupt { details: String },
    /// A record that must exist was missing.
    NotFound { what: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database { details } => write!(f, "database error: {details}"),
            Self::Corrupt { details } => write!(f, "corrupt record: {details}"),
            Self::NotFound { what } => write!(f, "{what} not found"),
        }
    }
}

impl std::error::Error for StoreError {}
