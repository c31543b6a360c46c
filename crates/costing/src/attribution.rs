use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cogs_core::{LotId, SaleId, TenantId};
use cogs_inventory::Sale;

/// Units of one sale drawn from one lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotAllocation {
    pub lot_id: LotId,
    pub sku: String,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
}

impl LotAllocation {
    pub fn new(lot_id: LotId, sku: impl Into<String>, quantity: Decimal, unit_cost: Decimal) -> Self {
        Self {
            lot_id,
            sku: sku.into(),
            quantity,
            unit_cost,
            total_cost: quantity * unit_cost,
        }
    }
}

/// A sale's cost of goods broken down across the lots it consumed.
///
/// Allocated quantities always sum to `quantity_sold`; a sale that cannot be
/// covered in full produces no attribution at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CogsAttribution {
    pub sale_id: SaleId,
    pub sku: String,
    pub sale_date: NaiveDate,
    pub quantity_sold: Decimal,
    pub tenant_id: Option<TenantId>,
    allocations: Vec<LotAllocation>,
    total_cogs: Decimal,
    average_unit_cost: Decimal,
}

impl CogsAttribution {
    pub fn new(sale: &Sale, allocations: Vec<LotAllocation>) -> Self {
        let total_cogs: Decimal = allocations.iter().map(|a| a.total_cost).sum();
        let average_unit_cost = if sale.quantity_sold.is_zero() {
            Decimal::ZERO
        } else {
            total_cogs / sale.quantity_sold
        };
        Self {
            sale_id: sale.sale_id.clone(),
            sku: sale.sku.clone(),
            sale_date: sale.sale_date,
            quantity_sold: sale.quantity_sold,
            tenant_id: sale.tenant_id,
            allocations,
            total_cogs,
            average_unit_cost,
        }
    }

    pub fn allocations(&self) -> &[LotAllocation] {
        &self.allocations
    }

    pub fn total_cogs(&self) -> Decimal {
        self.total_cogs
    }

    pub fn average_unit_cost(&self) -> Decimal {
        self.average_unit_cost
    }

    pub fn allocated_quantity(&self) -> Decimal {
        self.allocations.iter().map(|a| a.quantity).sum()
    }

    /// Accounting period of the sale, `YYYY-MM`.
    pub fn period(&self) -> String {
        self.sale_date.format("%Y-%m").to_string()
    }
}

/// Monthly rollup of attributions for one SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CogsSummary {
    pub sku: String,
    /// `YYYY-MM`
    pub period: String,
    pub total_quantity_sold: Decimal,
    pub total_cogs: Decimal,
    pub average_unit_cost: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn totals_and_average_derive_from_allocations() {
        let sale = Sale::new("S1", "A", NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(), dec!(120));
        let attribution = CogsAttribution::new(
            &sale,
            vec![
                LotAllocation::new(LotId::new("L1"), "A", dec!(100), dec!(11)),
                LotAllocation::new(LotId::new("L2"), "A", dec!(20), dec!(12)),
            ],
        );

        assert_eq!(attribution.total_cogs(), dec!(1340));
        assert_eq!(attribution.allocated_quantity(), dec!(120));
        assert_eq!(attribution.average_unit_cost(), dec!(1340) / dec!(120));
        assert_eq!(attribution.period(), "2024-02");
    }

    #[test]
    fn zero_quantity_sale_has_zero_average() {
        let sale = Sale::new("S1", "A", NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(), Decimal::ZERO);
        let attribution = CogsAttribution::new(&sale, vec![]);
        assert_eq!(attribution.average_unit_cost(), Decimal::ZERO);
    }
}
