//! FIFO allocation engine.
//!
//! Pure and deterministic: given a snapshot and a batch of transactions it
//! returns attributions and a new snapshot, without touching the input.
//!
//! Processing order:
//!
//! 1. split the batch into returns and regular sales
//! 2. apply **every** return first, each credited to the oldest lot of its SKU
//! 3. order sales by `sale_date` (stable, so ties keep input order)
//! 4. allocate each sale oldest-lot-first, all or nothing

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cogs_core::{DomainError, LotId, SaleId};
use cogs_inventory::{InventorySnapshot, Sale};

use crate::attribution::{CogsAttribution, CogsSummary, LotAllocation};
use crate::validation::{FindingSource, ValidationError, ValidationErrorKind};

/// Costing method used for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostingMode {
    #[default]
    Fifo,
}

impl CostingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CostingMode::Fifo => "fifo",
        }
    }

    pub fn process(&self, snapshot: &InventorySnapshot, sales: &[Sale]) -> FifoOutcome {
        match self {
            CostingMode::Fifo => process_transactions(snapshot, sales),
        }
    }
}

impl FromStr for CostingMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fifo" => Ok(CostingMode::Fifo),
            other => Err(DomainError::validation(format!(
                "unsupported costing mode '{other}' (expected: fifo)"
            ))),
        }
    }
}

impl core::fmt::Display for CostingMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A return that was credited back to a lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedReturn {
    pub sale_id: SaleId,
    pub lot_id: LotId,
    pub sku: String,
    pub quantity: Decimal,
}

/// Result of one engine pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FifoOutcome {
    pub attributions: Vec<CogsAttribution>,
    pub snapshot: InventorySnapshot,
    pub validation_errors: Vec<ValidationError>,
    pub returns: Vec<AppliedReturn>,
}

impl FifoOutcome {
    pub fn total_cogs(&self) -> Decimal {
        self.attributions.iter().map(|a| a.total_cogs()).sum()
    }

    pub fn total_allocated(&self) -> Decimal {
        self.attributions.iter().map(|a| a.allocated_quantity()).sum()
    }

    pub fn total_returned(&self) -> Decimal {
        self.returns.iter().map(|r| r.quantity).sum()
    }
}

/// Run FIFO allocation over a private copy of `snapshot`.
pub fn process_transactions(snapshot: &InventorySnapshot, sales: &[Sale]) -> FifoOutcome {
    let mut working = snapshot.clone();
    let mut validation_errors = Vec::new();

    let (returns, regular): (Vec<&Sale>, Vec<&Sale>) = sales.iter().partition(|s| s.is_return());

    let mut applied = Vec::with_capacity(returns.len());
    for ret in returns {
        match apply_return(&mut working, ret) {
            Ok(applied_return) => applied.push(applied_return),
            Err(finding) => validation_errors.push(finding),
        }
    }

    let mut ordered = regular;
    ordered.sort_by_key(|s| s.sale_date);

    let mut attributions = Vec::with_capacity(ordered.len());
    for sale in ordered {
        match allocate_sale(&mut working, sale) {
            Ok(attribution) => attributions.push(attribution),
            Err(finding) => validation_errors.push(finding),
        }
    }

    tracing::debug!(
        attributions = attributions.len(),
        returns = applied.len(),
        findings = validation_errors.len(),
        "fifo pass complete"
    );

    FifoOutcome {
        attributions,
        snapshot: working,
        validation_errors,
        returns: applied,
    }
}

fn apply_return(working: &mut InventorySnapshot, ret: &Sale) -> Result<AppliedReturn, ValidationError> {
    let return_error = |message: String| {
        ValidationError::new(
            ValidationErrorKind::ReturnError {
                quantity: ret.quantity_sold,
            },
            FindingSource::Engine,
            message,
        )
        .for_sale(&ret.sale_id, &ret.sku)
    };

    let lot = working
        .oldest_position(&ret.sku)
        .and_then(|p| working.lot_at_mut(p))
        .ok_or_else(|| {
            tracing::warn!(sale_id = %ret.sale_id, sku = %ret.sku, "return dropped: no lot for sku");
            return_error(format!("no lot exists for SKU {} to receive the return", ret.sku))
        })?;

    lot.return_units(ret.quantity_sold).map_err(|e| {
        tracing::warn!(
            sale_id = %ret.sale_id,
            lot_id = %lot.lot_id,
            quantity = %ret.quantity_sold,
            error = %e,
            "return dropped"
        );
        return_error(e.to_string())
    })?;

    Ok(AppliedReturn {
        sale_id: ret.sale_id.clone(),
        lot_id: lot.lot_id.clone(),
        sku: ret.sku.clone(),
        quantity: ret.quantity_sold,
    })
}

fn allocate_sale(working: &mut InventorySnapshot, sale: &Sale) -> Result<CogsAttribution, ValidationError> {
    let positions = working.available_positions(&sale.sku, sale.sale_date);
    if positions.is_empty() {
        return Err(ValidationError::new(
            ValidationErrorKind::NoInventory,
            FindingSource::Engine,
            format!("no inventory for SKU {} on or before {}", sale.sku, sale.sale_date),
        )
        .for_sale(&sale.sale_id, &sale.sku));
    }

    let available: Decimal = positions
        .iter()
        .filter_map(|p| working.lot_at(*p))
        .map(|l| l.remaining_quantity())
        .sum();
    if available < sale.quantity_sold {
        return Err(ValidationError::new(
            ValidationErrorKind::InsufficientInventory {
                requested: sale.quantity_sold,
                available,
            },
            FindingSource::Engine,
            format!(
                "sale {} needs {} of SKU {}, only {} available",
                sale.sale_id, sale.quantity_sold, sale.sku, available
            ),
        )
        .for_sale(&sale.sale_id, &sale.sku));
    }

    let mut need = sale.quantity_sold;
    let mut allocations = Vec::new();
    for position in positions {
        if need.is_zero() {
            break;
        }
        let Some(lot) = working.lot_at_mut(position) else {
            continue;
        };
        let take = need.min(lot.remaining_quantity());
        // Cannot fail: take is positive and bounded by remaining.
        if lot.allocate(take).is_err() {
            continue;
        }
        need -= take;
        tracing::trace!(sale_id = %sale.sale_id, lot_id = %lot.lot_id, quantity = %take, "allocated");
        allocations.push(LotAllocation::new(
            lot.lot_id.clone(),
            &sale.sku,
            take,
            lot.total_unit_cost(),
        ));
    }

    Ok(CogsAttribution::new(sale, allocations))
}

/// Monthly rollup per (sku, period), sorted by sku then period.
pub fn calculate_summary(attributions: &[CogsAttribution]) -> Vec<CogsSummary> {
    let mut groups: BTreeMap<(String, String), (Decimal, Decimal)> = BTreeMap::new();
    for attribution in attributions {
        let entry = groups
            .entry((attribution.sku.clone(), attribution.period()))
            .or_insert((Decimal::ZERO, Decimal::ZERO));
        entry.0 += attribution.quantity_sold;
        entry.1 += attribution.total_cogs();
    }

    groups
        .into_iter()
        .map(|((sku, period), (quantity, cogs))| CogsSummary {
            sku,
            period,
            total_quantity_sold: quantity,
            total_cogs: cogs,
            average_unit_cost: if quantity.is_zero() {
                Decimal::ZERO
            } else {
                cogs / quantity
            },
        })
        .collect()
}
