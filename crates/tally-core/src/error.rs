use std::time::Duration;

use thiserror::Error;

use crate::domain::Location;

/// Fatal failure of a single exchange call.
///
/// Every variant aborts the query that produced it; the core never retries.
/// Retry policy, if any, belongs to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Network-level failure (DNS, connection refused, timeout).
    #[error("{location} API request failed due to {reason}")]
    Transport { location: Location, reason: String },

    /// HTTP status outside the exchange's accepted set.
    #[error("{location} API request for {url} failed with HTTP status code {status}")]
    UnexpectedStatus {
        location: Location,
        url: String,
        status: u16,
    },

    /// The response body was not decodable JSON.
    #[error("{location} returned invalid JSON response")]
    InvalidJson { location: Location },

    /// Logical error reported by the exchange inside its error envelope.
    #[error("{message}")]
    Remote { location: Location, message: String },

    /// A single-resource payload (e.g. a balance) could not be interpreted.
    /// Unlike history records there is nothing partial to salvage here.
    #[error("{location} returned an unexpected payload: {reason}")]
    CorruptPayload { location: Location, reason: String },

    /// The exchange's request quota is exhausted.
    #[error("{location} request quota exhausted, retry in {}s", .retry_after.as_secs())]
    RateLimited {
        location: Location,
        retry_after: Duration,
    },

    /// The price oracle collaborator could not value an asset.
    #[error("failed to find usd price for {asset}")]
    PriceLookup { asset: String },
}

/// Per-record soft failure raised while normalizing one raw exchange record.
///
/// These never abort a history batch: the batch loop converts them into
/// warnings and carries on with the next record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("unknown asset '{0}'")]
    UnknownAsset(String),

    #[error("missing key entry for '{0}'")]
    MissingKey(String),

    #[error("{0}")]
    Deserialization(String),
}

/// Construction-time invariant violations on domain values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("asset symbol cannot be empty")]
    EmptyAssetSymbol,

    #[error("field '{field}' must be non-negative")]
    NegativeAmount { field: &'static str },

    #[error("timestamp must be RFC3339 UTC: '{value}'")]
    InvalidTimestamp { value: String },

    #[error("window start must not be after window end")]
    InvertedWindow,
}
