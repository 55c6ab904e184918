use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::{Asset, UtcDateTime};
use crate::ValidationError;

/// Exchange an event was sourced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Bitmex,
}

impl Location {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bitmex => "bitmex",
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of an asset movement. Direction lives here exclusively; movement
/// amounts are always non-negative magnitudes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementCategory {
    Deposit,
    Withdrawal,
}

impl MovementCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
        }
    }
}

impl Display for MovementCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed margin position. An immutable history fact once constructed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginPosition {
    pub location: Location,
    pub open_time: Option<UtcDateTime>,
    pub close_time: UtcDateTime,
    /// Signed realized profit or loss.
    pub profit_loss: Decimal,
    pub pl_asset: Asset,
    pub fee: Decimal,
    pub fee_asset: Asset,
    pub notes: String,
    pub link: String,
}

impl MarginPosition {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        location: Location,
        open_time: Option<UtcDateTime>,
        close_time: UtcDateTime,
        profit_loss: Decimal,
        pl_asset: Asset,
        fee: Decimal,
        fee_asset: Asset,
        notes: impl Into<String>,
        link: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        if fee.is_sign_negative() && !fee.is_zero() {
            return Err(ValidationError::NegativeAmount { field: "fee" });
        }
        Ok(Self {
            location,
            open_time,
            close_time,
            profit_loss,
            pl_asset,
            fee,
            fee_asset,
            notes: notes.into(),
            link: link.into(),
        })
    }
}

/// Deposit or withdrawal. An immutable history fact once constructed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetMovement {
    pub location: Location,
    pub category: MovementCategory,
    pub address: Option<String>,
    pub transaction_id: Option<String>,
    pub timestamp: UtcDateTime,
    pub asset: Asset,
    /// Non-negative magnitude; direction is carried by `category`.
    pub amount: Decimal,
    pub fee_asset: Asset,
    pub fee: Decimal,
    pub link: String,
}

impl AssetMovement {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        location: Location,
        category: MovementCategory,
        address: Option<String>,
        transaction_id: Option<String>,
        timestamp: UtcDateTime,
        asset: Asset,
        amount: Decimal,
        fee_asset: Asset,
        fee: Decimal,
        link: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(ValidationError::NegativeAmount { field: "amount" });
        }
        if fee.is_sign_negative() && !fee.is_zero() {
            return Err(ValidationError::NegativeAmount { field: "fee" });
        }
        Ok(Self {
            location,
            category,
            address,
            transaction_id,
            timestamp,
            asset,
            amount,
            fee_asset,
            fee,
            link: link.into(),
        })
    }
}

/// One asset's holdings priced by the external oracle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValuedBalance {
    pub amount: Decimal,
    pub usd_value: Decimal,
}

/// Balance query result: asset to priced holdings.
pub type ValuedBalances = BTreeMap<Asset, ValuedBalance>;
