use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use crate::{NormalizationError, ValidationError};

/// Resolved reference to a known asset.
///
/// `unit_exponent` is the power-of-ten divisor between the asset's smallest
/// indivisible unit and its canonical decimal form (8 for BTC/satoshi).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Asset {
    symbol: String,
    unit_exponent: u32,
}

impl Asset {
    pub fn new(symbol: impl Into<String>, unit_exponent: u32) -> Result<Self, ValidationError> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            return Err(ValidationError::EmptyAssetSymbol);
        }
        Ok(Self {
            symbol,
            unit_exponent,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub const fn unit_exponent(&self) -> u32 {
        self.unit_exponent
    }

    /// Convert an amount expressed in the asset's smallest indivisible unit
    /// into canonical decimal form. Exact: `units / 10^unit_exponent`.
    pub fn from_smallest_unit(&self, units: Decimal) -> Decimal {
        if self.unit_exponent == 0 {
            return units;
        }
        units * Decimal::new(1, self.unit_exponent)
    }
}

impl Display for Asset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.symbol)
    }
}

impl Serialize for Asset {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.symbol)
    }
}

/// Asset registry collaborator boundary.
///
/// Resolution failure is a per-record soft failure, never fatal to a batch.
pub trait AssetRegistry: Send + Sync {
    fn resolve(&self, symbol: &str) -> Result<Asset, NormalizationError>;
}

/// Immutable in-memory registry seeded with the assets this aggregator knows.
pub struct StaticAssetRegistry {
    assets: BTreeMap<String, Asset>,
}

impl StaticAssetRegistry {
    pub fn new() -> Self {
        Self {
            assets: BTreeMap::new(),
        }
    }

    pub fn with_asset(mut self, asset: Asset) -> Self {
        self.assets.insert(asset.symbol().to_owned(), asset);
        self
    }
}

impl Default for StaticAssetRegistry {
    fn default() -> Self {
        let seed = [
            ("BTC", 8),
            ("ETH", 18),
            ("LTC", 8),
            ("DOGE", 8),
            ("XRP", 6),
            ("SOL", 9),
            ("USDT", 6),
            ("USDC", 6),
        ];

        let mut assets = BTreeMap::new();
        for (symbol, unit_exponent) in seed {
            let asset = Asset::new(symbol, unit_exponent).expect("seed symbols are non-empty");
            assets.insert(symbol.to_owned(), asset);
        }
        Self { assets }
    }
}

impl AssetRegistry for StaticAssetRegistry {
    fn resolve(&self, symbol: &str) -> Result<Asset, NormalizationError> {
        let canonical = symbol.trim().to_ascii_uppercase();
        self.assets
            .get(&canonical)
            .cloned()
            .ok_or_else(|| NormalizationError::UnknownAsset(symbol.to_owned()))
    }
}
