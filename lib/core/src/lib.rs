//! Core identifiers and error handling for provider-link.
//!
//! Everything here is shared by the platform-access crate (the token
//! lifecycle logic) and the server that hosts it.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{AccountId, ParseIdError, UserId};
