//! Core contracts for tally.
//!
//! This crate contains:
//! - Canonical domain models for normalized exchange data
//! - Request signing and per-exchange signing configuration
//! - HTTP transport abstraction and generic JSON payload handling
//! - The exchange adapter contract, its collaborator boundaries, and the
//!   BitMEX integration

pub mod adapters;
pub mod domain;
pub mod error;
pub mod exchange;
pub mod exchange_policy;
pub mod history;
pub mod http_client;
pub mod payload;
pub mod signing;
pub mod throttling;

pub use adapters::BitmexAdapter;
pub use domain::{
    Asset, AssetMovement, AssetRegistry, Location, MarginPosition, MissingTimestampPolicy,
    MovementCategory, StaticAssetRegistry, TimeWindow, UtcDateTime, ValuedBalance, ValuedBalances,
};
pub use error::{NormalizationError, RemoteError, ValidationError};
pub use exchange::{
    ApiKeyValidity, CollectingSink, Exchange, MessageSink, NullSink, PriceOracle,
    StaticPriceOracle,
};
pub use exchange_policy::ExchangePolicy;
pub use history::{fold_records, Collected, RecordOutcome, Warning};
pub use http_client::{
    HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, NoopHttpClient,
    ReqwestHttpClient,
};
pub use payload::{parse_response, Payload};
pub use signing::{Credentials, RequestSigner, SigningPolicy};
pub use throttling::ThrottlingQueue;
