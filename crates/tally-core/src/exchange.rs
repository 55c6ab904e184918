//! Exchange adapter contract and its collaborator boundaries.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use rust_decimal::Decimal;

use crate::domain::{
    Asset, AssetMovement, Location, MarginPosition, TimeWindow, ValuedBalances,
};
use crate::history::Collected;
use crate::RemoteError;

/// Result of probing an exchange with the configured credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiKeyValidity {
    Valid,
    Invalid { reason: String },
}

impl ApiKeyValidity {
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// External price oracle boundary. Failures are [`RemoteError`]s and propagate
/// unchanged through the balance query.
pub trait PriceOracle: Send + Sync {
    fn find_usd_price<'a>(
        &'a self,
        asset: &'a Asset,
    ) -> Pin<Box<dyn Future<Output = Result<Decimal, RemoteError>> + Send + 'a>>;
}

/// Fixed price table, for tests and for callers that price externally.
#[derive(Debug, Default)]
pub struct StaticPriceOracle {
    prices: BTreeMap<String, Decimal>,
}

impl StaticPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, symbol: impl Into<String>, price: Decimal) -> Self {
        self.prices.insert(symbol.into(), price);
        self
    }
}

impl PriceOracle for StaticPriceOracle {
    fn find_usd_price<'a>(
        &'a self,
        asset: &'a Asset,
    ) -> Pin<Box<dyn Future<Output = Result<Decimal, RemoteError>> + Send + 'a>> {
        Box::pin(async move {
            self.prices
                .get(asset.symbol())
                .copied()
                .ok_or_else(|| RemoteError::PriceLookup {
                    asset: asset.symbol().to_owned(),
                })
        })
    }
}

/// User-facing warning/notification boundary. Fire-and-forget; no return
/// value is consumed.
pub trait MessageSink: Send + Sync {
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Sink that drops everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl MessageSink for NullSink {
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

/// Sink that records messages, for assertions in tests.
#[derive(Debug, Default)]
pub struct CollectingSink {
    warnings: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings
            .lock()
            .expect("sink store should not be poisoned")
            .clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors
            .lock()
            .expect("sink store should not be poisoned")
            .clone()
    }
}

impl MessageSink for CollectingSink {
    fn warn(&self, message: &str) {
        self.warnings
            .lock()
            .expect("sink store should not be poisoned")
            .push(message.to_owned());
    }

    fn error(&self, message: &str) {
        self.errors
            .lock()
            .expect("sink store should not be poisoned")
            .push(message.to_owned());
    }
}

/// Exchange adapter contract.
///
/// One instance per exchange account; instances share no mutable state, and a
/// single instance issues one synchronous call per invocation. History
/// queries absorb per-record soft failures into warnings; balance queries are
/// all-or-nothing.
pub trait Exchange: Send + Sync {
    fn location(&self) -> Location;

    fn validate_api_key<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<ApiKeyValidity, RemoteError>> + Send + 'a>>;

    fn query_balances<'a>(
        &'a self,
        oracle: &'a dyn PriceOracle,
    ) -> Pin<Box<dyn Future<Output = Result<ValuedBalances, RemoteError>> + Send + 'a>>;

    fn query_margin_history<'a>(
        &'a self,
        window: TimeWindow,
    ) -> Pin<Box<dyn Future<Output = Result<Collected<MarginPosition>, RemoteError>> + Send + 'a>>;

    fn query_deposits_withdrawals<'a>(
        &'a self,
        window: TimeWindow,
    ) -> Pin<Box<dyn Future<Output = Result<Collected<AssetMovement>, RemoteError>> + Send + 'a>>;
}
