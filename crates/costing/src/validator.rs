//! Pre-flight validation of lots and sales.
//!
//! Four independent passes, none of which mutates its input. `validate_all`
//! runs every pass and concatenates the findings; there is no early exit.
//!
//! The aggregate-sufficiency pass nets demand over the whole batch while the
//! engine applies every return before any sale, so the two can disagree when
//! returns and sales interleave. The engine is authoritative per sale.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

use cogs_core::duplicate_ids;
use cogs_inventory::{PurchaseLot, Sale};

use crate::validation::{FindingSource, ValidationError, ValidationErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validator {
    today: NaiveDate,
}

impl Validator {
    /// Validator that treats `today` as the latest acceptable sale date.
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    /// Validator anchored at the current UTC date.
    pub fn for_today() -> Self {
        Self::new(Utc::now().date_naive())
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn validate_all(&self, lots: &[PurchaseLot], sales: &[Sale]) -> Vec<ValidationError> {
        let mut findings = self.validate_sales(sales);
        findings.extend(self.validate_lots(lots));
        findings.extend(self.validate_date_availability(lots, sales));
        findings.extend(self.validate_aggregate_sufficiency(lots, sales));
        tracing::debug!(
            lots = lots.len(),
            sales = sales.len(),
            findings = findings.len(),
            "pre-flight validation complete"
        );
        findings
    }

    /// Duplicate ids, zero quantities, empty SKUs and future dates.
    pub fn validate_sales(&self, sales: &[Sale]) -> Vec<ValidationError> {
        let mut findings: Vec<ValidationError> = duplicate_ids(sales)
            .into_iter()
            .map(|id| {
                let mut e = ValidationError::new(
                    ValidationErrorKind::DuplicateSaleId,
                    FindingSource::Validator,
                    format!("sale id {id} appears more than once"),
                );
                e.sale_id = Some(id);
                e
            })
            .collect();

        for sale in sales {
            if sale.quantity_sold.is_zero() {
                findings.push(
                    ValidationError::new(
                        ValidationErrorKind::ZeroQuantity,
                        FindingSource::Validator,
                        format!("sale {} has zero quantity", sale.sale_id),
                    )
                    .for_sale(&sale.sale_id, &sale.sku),
                );
            }
            if sale.sku.trim().is_empty() {
                findings.push(
                    ValidationError::new(
                        ValidationErrorKind::EmptySku,
                        FindingSource::Validator,
                        format!("sale {} has no SKU", sale.sale_id),
                    )
                    .for_sale(&sale.sale_id, &sale.sku),
                );
            }
            if sale.sale_date > self.today {
                let days_ahead = (sale.sale_date - self.today).num_days();
                findings.push(
                    ValidationError::new(
                        ValidationErrorKind::FutureDate { days_ahead },
                        FindingSource::Validator,
                        format!("sale {} is dated {} ({days_ahead} days ahead)", sale.sale_id, sale.sale_date),
                    )
                    .for_sale(&sale.sale_id, &sale.sku),
                );
            }
        }
        findings
    }

    /// Duplicate ids, bad quantities, negative prices and empty SKUs.
    pub fn validate_lots(&self, lots: &[PurchaseLot]) -> Vec<ValidationError> {
        let mut findings: Vec<ValidationError> = duplicate_ids(lots)
            .into_iter()
            .map(|id| {
                let mut e = ValidationError::new(
                    ValidationErrorKind::DuplicateLotId,
                    FindingSource::Validator,
                    format!("lot id {id} appears more than once"),
                );
                e.lot_id = Some(id);
                e
            })
            .collect();

        for lot in lots {
            let finding = |kind: ValidationErrorKind, message: String| {
                ValidationError::new(kind, FindingSource::Validator, message).for_lot(&lot.lot_id, &lot.sku)
            };
            let original = lot.original_quantity();
            let remaining = lot.remaining_quantity();

            if original <= Decimal::ZERO {
                findings.push(finding(
                    ValidationErrorKind::InvalidQuantity { quantity: original },
                    format!("lot {} has non-positive quantity {original}", lot.lot_id),
                ));
            }
            if remaining < Decimal::ZERO {
                findings.push(finding(
                    ValidationErrorKind::NegativeRemaining { remaining },
                    format!("lot {} has negative remaining quantity {remaining}", lot.lot_id),
                ));
            }
            if remaining > original {
                findings.push(finding(
                    ValidationErrorKind::RemainingExceedsOriginal { remaining, original },
                    format!("lot {} has {remaining} remaining of {original} received", lot.lot_id),
                ));
            }
            if lot.unit_price < Decimal::ZERO || lot.freight_cost_per_unit < Decimal::ZERO {
                findings.push(finding(
                    ValidationErrorKind::NegativePrice {
                        unit_price: lot.unit_price,
                        freight_cost_per_unit: lot.freight_cost_per_unit,
                    },
                    format!("lot {} has a negative price or freight cost", lot.lot_id),
                ));
            }
            if lot.sku.trim().is_empty() {
                findings.push(finding(
                    ValidationErrorKind::EmptySku,
                    format!("lot {} has no SKU", lot.lot_id),
                ));
            }
        }
        findings
    }

    /// Every regular sale needs at least one lot of its SKU with units on hand
    /// that was received on or before the sale date.
    pub fn validate_date_availability(&self, lots: &[PurchaseLot], sales: &[Sale]) -> Vec<ValidationError> {
        let mut findings = Vec::new();

        for sale in sales.iter().filter(|s| !s.is_return() && !s.sku.trim().is_empty()) {
            let sku_lots: Vec<&PurchaseLot> = lots.iter().filter(|l| l.sku == sale.sku).collect();

            if sku_lots
                .iter()
                .any(|l| l.has_remaining() && l.received_date <= sale.sale_date)
            {
                continue;
            }

            let Some(first_received) = sku_lots.iter().map(|l| l.received_date).min() else {
                findings.push(
                    ValidationError::new(
                        ValidationErrorKind::NoInventoryForSku,
                        FindingSource::Validator,
                        format!("no lots exist for SKU {}", sale.sku),
                    )
                    .for_sale(&sale.sale_id, &sale.sku),
                );
                continue;
            };

            // Earlier lots exist but are used up; the sufficiency pass covers that.
            if first_received <= sale.sale_date {
                continue;
            }

            let days_gap = (first_received - sale.sale_date).num_days();
            findings.push(
                ValidationError::new(
                    ValidationErrorKind::SaleBeforeInventory { first_received, days_gap },
                    FindingSource::Validator,
                    format!(
                        "sale {} on {} precedes first receipt of SKU {} on {first_received} by {days_gap} days",
                        sale.sale_id, sale.sale_date, sale.sku
                    ),
                )
                .for_sale(&sale.sale_id, &sale.sku),
            );
        }
        findings
    }

    /// Net signed demand per SKU against total remaining supply.
    pub fn validate_aggregate_sufficiency(&self, lots: &[PurchaseLot], sales: &[Sale]) -> Vec<ValidationError> {
        let mut demand: BTreeMap<&str, Decimal> = BTreeMap::new();
        for sale in sales {
            *demand.entry(sale.sku.as_str()).or_insert(Decimal::ZERO) += sale.signed_quantity();
        }

        demand
            .into_iter()
            .filter_map(|(sku, demand)| {
                let supply: Decimal = lots
                    .iter()
                    .filter(|l| l.sku == sku)
                    .map(|l| l.remaining_quantity())
                    .sum();
                (demand > supply).then(|| {
                    let shortfall = demand - supply;
                    ValidationError::new(
                        ValidationErrorKind::InsufficientTotalInventory { demand, supply, shortfall },
                        FindingSource::Validator,
                        format!("SKU {sku} needs {demand} but only {supply} remain (short {shortfall})"),
                    )
                    .for_sku(sku)
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn validator() -> Validator {
        Validator::new(d(2024, 6, 30))
    }

    fn lot(id: &str, sku: &str, received: NaiveDate, qty: Decimal) -> PurchaseLot {
        PurchaseLot::new(id, sku, received, qty, dec!(10), dec!(1))
    }

    fn codes(findings: &[ValidationError]) -> Vec<&'static str> {
        findings.iter().map(|f| f.code()).collect()
    }

    #[test]
    fn sales_pass_flags_each_problem() {
        let sales = vec![
            Sale::new("S1", "A", d(2024, 2, 1), dec!(5)),
            Sale::new("S1", "A", d(2024, 2, 2), dec!(5)),
            Sale::new("S2", "A", d(2024, 2, 3), Decimal::ZERO),
            Sale::new("S3", "  ", d(2024, 2, 4), dec!(1)),
            Sale::new("S4", "A", d(2024, 7, 5), dec!(1)),
        ];

        let findings = validator().validate_sales(&sales);

        assert_eq!(
            codes(&findings),
            vec!["DUPLICATE_SALE_ID", "ZERO_QUANTITY", "EMPTY_SKU", "FUTURE_DATE"]
        );
        assert_eq!(findings[3].kind, ValidationErrorKind::FutureDate { days_ahead: 5 });
    }

    #[test]
    fn lots_pass_flags_each_problem() {
        let lots = vec![
            lot("L1", "A", d(2024, 1, 1), dec!(10)),
            lot("L1", "A", d(2024, 1, 2), dec!(10)),
            lot("L2", "A", d(2024, 1, 1), Decimal::ZERO),
            lot("L3", "A", d(2024, 1, 1), dec!(5)).with_remaining(dec!(-1)),
            lot("L4", "A", d(2024, 1, 1), dec!(5)).with_remaining(dec!(6)),
            PurchaseLot::new("L5", "A", d(2024, 1, 1), dec!(5), dec!(-2), dec!(0)),
            lot("L6", "", d(2024, 1, 1), dec!(5)),
        ];

        let findings = validator().validate_lots(&lots);

        assert_eq!(
            codes(&findings),
            vec![
                "DUPLICATE_LOT_ID",
                "INVALID_QUANTITY",
                "NEGATIVE_REMAINING",
                "REMAINING_EXCEEDS_ORIGINAL",
                "NEGATIVE_PRICE",
                "EMPTY_SKU",
            ]
        );
    }

    #[test]
    fn date_pass_distinguishes_late_lots_from_missing_sku() {
        let lots = vec![lot("L1", "A", d(2024, 3, 11), dec!(10))];
        let sales = vec![
            Sale::new("S1", "A", d(2024, 3, 1), dec!(1)),
            Sale::new("S2", "B", d(2024, 3, 1), dec!(1)),
            Sale::new("S3", "A", d(2024, 3, 20), dec!(1)),
            Sale::new("R1", "B", d(2024, 3, 1), dec!(-1)),
        ];

        let findings = validator().validate_date_availability(&lots, &sales);

        assert_eq!(findings.len(), 2);
        assert_eq!(
            findings[0].kind,
            ValidationErrorKind::SaleBeforeInventory {
                first_received: d(2024, 3, 11),
                days_gap: 10
            }
        );
        assert_eq!(findings[1].kind, ValidationErrorKind::NoInventoryForSku);
        assert_eq!(findings[1].sku.as_deref(), Some("B"));
    }

    #[test]
    fn aggregate_pass_nets_returns_against_sales() {
        let lots = vec![lot("L1", "A", d(2024, 1, 1), dec!(10))];
        let covered = vec![
            Sale::new("S1", "A", d(2024, 2, 1), dec!(12)),
            Sale::new("R1", "A", d(2024, 2, 2), dec!(-3)),
        ];
        assert!(validator().validate_aggregate_sufficiency(&lots, &covered).is_empty());

        let short = vec![Sale::new("S1", "A", d(2024, 2, 1), dec!(14))];
        let findings = validator().validate_aggregate_sufficiency(&lots, &short);
        assert_eq!(
            findings[0].kind,
            ValidationErrorKind::InsufficientTotalInventory {
                demand: dec!(14),
                supply: dec!(10),
                shortfall: dec!(4)
            }
        );
    }

    #[test]
    fn validate_all_concatenates_every_pass_without_mutating() {
        let lots = vec![lot("L1", "A", d(2024, 1, 1), dec!(10))];
        let sales = vec![
            Sale::new("S1", "", d(2024, 2, 1), dec!(1)),
            Sale::new("S2", "B", d(2024, 2, 1), dec!(1)),
        ];
        let lots_before = lots.clone();

        let findings = validator().validate_all(&lots, &sales);

        assert_eq!(
            codes(&findings),
            vec![
                "EMPTY_SKU",
                "NO_INVENTORY_FOR_SKU",
                "INSUFFICIENT_TOTAL_INVENTORY",
                "INSUFFICIENT_TOTAL_INVENTORY",
            ]
        );
        assert_eq!(lots, lots_before);
        assert!(findings.iter().all(|f| f.source == FindingSource::Validator));
    }
}
