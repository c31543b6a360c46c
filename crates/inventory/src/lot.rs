use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cogs_core::{DomainError, DomainResult, Entity, LotId, TenantId, TenantTagged};

/// One inventory receipt for a SKU.
///
/// Identity and cost are fixed at receipt; only `remaining_quantity` moves,
/// and only through [`PurchaseLot::allocate`] and [`PurchaseLot::return_units`].
/// Lots are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLot {
    pub lot_id: LotId,
    pub sku: String,
    pub received_date: NaiveDate,
    original_quantity: Decimal,
    remaining_quantity: Decimal,
    pub unit_price: Decimal,
    pub freight_cost_per_unit: Decimal,
    pub tenant_id: Option<TenantId>,
}

impl PurchaseLot {
    /// A freshly received lot (remaining = original).
    pub fn new(
        lot_id: impl Into<LotId>,
        sku: impl Into<String>,
        received_date: NaiveDate,
        quantity: Decimal,
        unit_price: Decimal,
        freight_cost_per_unit: Decimal,
    ) -> Self {
        Self {
            lot_id: lot_id.into(),
            sku: sku.into(),
            received_date,
            original_quantity: quantity,
            remaining_quantity: quantity,
            unit_price,
            freight_cost_per_unit,
            tenant_id: None,
        }
    }

    /// Override the remaining quantity, as loaded from an upload or a stored
    /// snapshot. Not range-checked; the validator reports bad values.
    pub fn with_remaining(mut self, remaining: Decimal) -> Self {
        self.remaining_quantity = remaining;
        self
    }

    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn original_quantity(&self) -> Decimal {
        self.original_quantity
    }

    pub fn remaining_quantity(&self) -> Decimal {
        self.remaining_quantity
    }

    /// Landed cost of one unit: purchase price plus per-unit freight.
    pub fn total_unit_cost(&self) -> Decimal {
        self.unit_price + self.freight_cost_per_unit
    }

    pub fn has_remaining(&self) -> bool {
        self.remaining_quantity > Decimal::ZERO
    }

    /// Consume `quantity` units.
    pub fn allocate(&mut self, quantity: Decimal) -> DomainResult<()> {
        if quantity <= Decimal::ZERO {
            return Err(DomainError::validation("allocation quantity must be positive"));
        }
        if quantity > self.remaining_quantity {
            return Err(DomainError::invariant(format!(
                "lot {} has {} remaining, cannot allocate {}",
                self.lot_id, self.remaining_quantity, quantity
            )));
        }
        self.remaining_quantity -= quantity;
        Ok(())
    }

    /// Put `quantity` units back.
    pub fn return_units(&mut self, quantity: Decimal) -> DomainResult<()> {
        if quantity <= Decimal::ZERO {
            return Err(DomainError::validation("return quantity must be positive"));
        }
        let restored = self.remaining_quantity + quantity;
        if restored > self.original_quantity {
            return Err(DomainError::invariant(format!(
                "returning {} to lot {} would exceed its original quantity {}",
                quantity, self.lot_id, self.original_quantity
            )));
        }
        self.remaining_quantity = restored;
        Ok(())
    }
}

impl Entity for PurchaseLot {
    type Id = LotId;

    fn id(&self) -> &LotId {
        &self.lot_id
    }
}

impl TenantTagged for PurchaseLot {
    fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    fn assign_tenant(&mut self, tenant_id: TenantId) {
        self.tenant_id = Some(tenant_id);
    }
}
