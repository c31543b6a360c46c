use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cogs_core::{Entity, SaleId, TenantId, TenantTagged};

/// Direction of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Sale,
    Return,
}

/// One sale or return.
///
/// Inputs use a signed quantity: negative means units came back. After
/// construction `quantity_sold` is the magnitude and `transaction_type`
/// carries the direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub sale_id: SaleId,
    pub sku: String,
    pub sale_date: NaiveDate,
    pub quantity_sold: Decimal,
    pub transaction_type: TransactionType,
    pub tenant_id: Option<TenantId>,
}

impl Sale {
    /// Build a transaction from a signed quantity.
    pub fn new(
        sale_id: impl Into<SaleId>,
        sku: impl Into<String>,
        sale_date: NaiveDate,
        signed_quantity: Decimal,
    ) -> Self {
        let transaction_type = if signed_quantity < Decimal::ZERO {
            TransactionType::Return
        } else {
            TransactionType::Sale
        };
        Self {
            sale_id: sale_id.into(),
            sku: sku.into(),
            sale_date,
            quantity_sold: signed_quantity.abs(),
            transaction_type,
            tenant_id: None,
        }
    }

    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn is_return(&self) -> bool {
        self.transaction_type == TransactionType::Return
    }

    /// Quantity with the input sign restored (returns are negative).
    pub fn signed_quantity(&self) -> Decimal {
        match self.transaction_type {
            TransactionType::Sale => self.quantity_sold,
            TransactionType::Return => -self.quantity_sold,
        }
    }
}

impl Entity for Sale {
    type Id = SaleId;

    fn id(&self) -> &SaleId {
        &self.sale_id
    }
}

impl TenantTagged for Sale {
    fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    fn assign_tenant(&mut self, tenant_id: TenantId) {
        self.tenant_id = Some(tenant_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 5).unwrap()
    }

    #[test]
    fn negative_quantity_becomes_return() {
        let sale = Sale::new("S-1", "SKU-A", date(), dec!(-20));
        assert!(sale.is_return());
        assert_eq!(sale.quantity_sold, dec!(20));
        assert_eq!(sale.signed_quantity(), dec!(-20));
    }

    #[test]
    fn positive_and_zero_quantities_are_sales() {
        assert_eq!(
            Sale::new("S-1", "SKU-A", date(), dec!(5)).transaction_type,
            TransactionType::Sale
        );
        let zero = Sale::new("S-2", "SKU-A", date(), Decimal::ZERO);
        assert!(!zero.is_return());
        assert_eq!(zero.quantity_sold, Decimal::ZERO);
    }
}
