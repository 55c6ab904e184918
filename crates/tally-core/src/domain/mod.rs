//! Canonical domain types for normalized exchange data.
//!
//! Everything produced by an adapter is expressed in these types: resolved
//! assets with exact smallest-unit scaling, immutable history facts
//! ([`MarginPosition`], [`AssetMovement`]), priced balances, and the inclusive
//! [`TimeWindow`] used to bound history queries.

mod asset;
mod events;
mod timestamp;
mod window;

pub use asset::{Asset, AssetRegistry, StaticAssetRegistry};
pub use events::{
    AssetMovement, Location, MarginPosition, MovementCategory, ValuedBalance, ValuedBalances,
};
pub use timestamp::UtcDateTime;
pub use window::{MissingTimestampPolicy, TimeWindow};
