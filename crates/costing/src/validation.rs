//! Data-quality findings.
//!
//! A [`ValidationError`] is a value, not a Rust error: findings are collected
//! and reported alongside results, and one bad transaction never stops the
//! rest of a batch.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cogs_core::{LotId, SaleId};

/// What was found. The serialized `code` is the stable external name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationErrorKind {
    /// Eligible lots exist but cannot cover the sale in full.
    InsufficientInventory { requested: Decimal, available: Decimal },
    /// No eligible lot at the sale date.
    NoInventory,
    /// A return could not be credited back to a lot.
    ReturnError { quantity: Decimal },
    DuplicateSaleId,
    ZeroQuantity,
    EmptySku,
    FutureDate { days_ahead: i64 },
    DuplicateLotId,
    /// Original quantity is zero or negative.
    InvalidQuantity { quantity: Decimal },
    NegativeRemaining { remaining: Decimal },
    RemainingExceedsOriginal { remaining: Decimal, original: Decimal },
    NegativePrice { unit_price: Decimal, freight_cost_per_unit: Decimal },
    /// Lots for the SKU exist, but every one arrives after the sale.
    SaleBeforeInventory { first_received: NaiveDate, days_gap: i64 },
    NoInventoryForSku,
    /// Net demand for the SKU over the whole batch exceeds remaining supply.
    InsufficientTotalInventory { demand: Decimal, supply: Decimal, shortfall: Decimal },
}

impl ValidationErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsufficientInventory { .. } => "INSUFFICIENT_INVENTORY",
            Self::NoInventory => "NO_INVENTORY",
            Self::ReturnError { .. } => "RETURN_ERROR",
            Self::DuplicateSaleId => "DUPLICATE_SALE_ID",
            Self::ZeroQuantity => "ZERO_QUANTITY",
            Self::EmptySku => "EMPTY_SKU",
            Self::FutureDate { .. } => "FUTURE_DATE",
            Self::DuplicateLotId => "DUPLICATE_LOT_ID",
            Self::InvalidQuantity { .. } => "INVALID_QUANTITY",
            Self::NegativeRemaining { .. } => "NEGATIVE_REMAINING",
            Self::RemainingExceedsOriginal { .. } => "REMAINING_EXCEEDS_ORIGINAL",
            Self::NegativePrice { .. } => "NEGATIVE_PRICE",
            Self::SaleBeforeInventory { .. } => "SALE_BEFORE_INVENTORY",
            Self::NoInventoryForSku => "NO_INVENTORY_FOR_SKU",
            Self::InsufficientTotalInventory { .. } => "INSUFFICIENT_TOTAL_INVENTORY",
        }
    }
}

/// Which stage produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingSource {
    /// Pre-flight checks (non-mutating).
    Validator,
    /// The allocation engine itself.
    Engine,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    #[serde(flatten)]
    pub kind: ValidationErrorKind,
    pub message: String,
    pub source: FindingSource,
    pub sale_id: Option<SaleId>,
    pub lot_id: Option<LotId>,
    pub sku: Option<String>,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, source: FindingSource, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source,
            sale_id: None,
            lot_id: None,
            sku: None,
        }
    }

    pub fn for_sale(mut self, sale_id: &SaleId, sku: &str) -> Self {
        self.sale_id = Some(sale_id.clone());
        self.sku = Some(sku.to_string());
        self
    }

    pub fn for_lot(mut self, lot_id: &LotId, sku: &str) -> Self {
        self.lot_id = Some(lot_id.clone());
        self.sku = Some(sku.to_string());
        self
    }

    pub fn for_sku(mut self, sku: &str) -> Self {
        self.sku = Some(sku.to_string());
        self
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

impl core::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn serializes_with_stable_code() {
        let finding = ValidationError::new(
            ValidationErrorKind::InsufficientInventory {
                requested: dec!(10),
                available: dec!(4),
            },
            FindingSource::Engine,
            "short",
        )
        .for_sale(&SaleId::new("S1"), "A");

        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["code"], "INSUFFICIENT_INVENTORY");
        assert_eq!(json["source"], "engine");
        assert_eq!(json["sale_id"], "S1");
        assert_eq!(finding.to_string(), "INSUFFICIENT_INVENTORY: short");
    }
}
