//! Error handling foundation for provider-link.
//!
//! Only the `Result` alias lives here. Each crate owns its domain error
//! enums and reports them through rootcause as they cross layers.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
