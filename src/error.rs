//! Error taxonomy for the environment core.
//!
//! One variant per error kind named in the specification. Configuration and
//! `Init` errors short-circuit the caller; runtime handler errors are logged
//! through `tracing` and swallowed so a single session never tears down the
//! whole environment.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("invalid configuration: {reason}")]
    ConfigInvalid { reason: String },

    #[error("venue '{venue}' returned no market metadata")]
    MetadataEmpty { venue: String },

    #[error("venue '{venue}' unavailable: {reason}")]
    VenueUnavailable { venue: String, reason: String },

    /// The persistence backend failed while reading or writing the market
    /// metadata cache for `venue` — distinct from `VenueUnavailable`, which
    /// is reserved for failures of the exchange adapter itself.
    #[error("metadata cache unavailable for venue '{venue}': {reason}")]
    CacheUnavailable { venue: String, reason: String },

    #[error("trade store unavailable for venue '{venue}', symbol '{symbol}': {reason}")]
    StoreUnavailable {
        venue: String,
        symbol: String,
        reason: String,
    },

    #[error("durable trade insert failed for venue '{venue}', symbol '{symbol}': {reason}")]
    StoreWriteFailed {
        venue: String,
        symbol: String,
        reason: String,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("symbol '{symbol}' has no market data store in session '{session}'")]
    SymbolUndefined { session: String, symbol: String },
}

pub type Result<T> = std::result::Result<T, EnvironmentError>;
