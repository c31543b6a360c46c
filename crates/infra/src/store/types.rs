//! Records written by a run: snapshot entries, movements and COGS output.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cogs_core::{LotId, RunId, TenantId};
use cogs_costing::{CogsAttribution, CogsSummary, ValidationError};
use cogs_inventory::PurchaseLot;

/// Which point of a run a snapshot entry captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotPhase {
    /// Lot state as the run found it (the rollback target).
    Before,
    /// Lot state the run left behind.
    After,
    /// Lot state written back by a rollback.
    Restored,
}

/// A by-value copy of one lot at one point of a run.
///
/// `is_current` records whether the entry was written as the lot's live
/// state; `superseded_at` is set once a later entry takes over. The tenant's
/// current inventory is every current entry not yet superseded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub run_id: RunId,
    pub tenant_id: TenantId,
    pub phase: SnapshotPhase,
    pub is_current: bool,
    pub lot: PurchaseLot,
    pub recorded_at: DateTime<Utc>,
    pub superseded_at: Option<DateTime<Utc>>,
}

impl SnapshotEntry {
    pub fn before(run_id: RunId, tenant_id: TenantId, lot: PurchaseLot) -> Self {
        Self::new(run_id, tenant_id, SnapshotPhase::Before, false, lot)
    }

    pub fn after(run_id: RunId, tenant_id: TenantId, lot: PurchaseLot) -> Self {
        Self::new(run_id, tenant_id, SnapshotPhase::After, true, lot)
    }

    pub fn restored(run_id: RunId, tenant_id: TenantId, lot: PurchaseLot) -> Self {
        Self::new(run_id, tenant_id, SnapshotPhase::Restored, true, lot)
    }

    fn new(run_id: RunId, tenant_id: TenantId, phase: SnapshotPhase, is_current: bool, lot: PurchaseLot) -> Self {
        Self {
            run_id,
            tenant_id,
            phase,
            is_current,
            lot,
            recorded_at: Utc::now(),
            superseded_at: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.is_current && self.superseded_at.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Sale,
    Return,
    Rollback,
}

/// Net change of one lot's remaining quantity within one run. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryMovement {
    pub run_id: RunId,
    pub tenant_id: TenantId,
    pub lot_id: LotId,
    pub sku: String,
    pub movement_type: MovementType,
    /// Signed: negative when units left the lot.
    pub quantity_delta: Decimal,
    pub remaining_before: Decimal,
    pub remaining_after: Decimal,
    pub recorded_at: DateTime<Utc>,
}

impl InventoryMovement {
    /// Movement from `before` to `after`, or `None` when the lot did not change.
    ///
    /// Rollback movements are typed as such; otherwise the sign decides
    /// between sale and return.
    pub fn between(
        run_id: RunId,
        tenant_id: TenantId,
        before: &PurchaseLot,
        after: &PurchaseLot,
        rollback: bool,
    ) -> Option<Self> {
        let remaining_before = before.remaining_quantity();
        let remaining_after = after.remaining_quantity();
        let quantity_delta = remaining_after - remaining_before;
        if quantity_delta.is_zero() {
            return None;
        }

        let movement_type = if rollback {
            MovementType::Rollback
        } else if quantity_delta.is_sign_negative() {
            MovementType::Sale
        } else {
            MovementType::Return
        };

        Some(Self {
            run_id,
            tenant_id,
            lot_id: after.lot_id.clone(),
            sku: after.sku.clone(),
            movement_type,
            quantity_delta,
            remaining_before,
            remaining_after,
            recorded_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAttribution {
    pub run_id: RunId,
    pub tenant_id: TenantId,
    pub attribution: CogsAttribution,
    /// Cleared when the run is rolled back; the row itself is kept.
    pub is_valid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSummary {
    pub run_id: RunId,
    pub tenant_id: TenantId,
    pub summary: CogsSummary,
    pub is_valid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredValidationError {
    pub run_id: RunId,
    pub tenant_id: TenantId,
    pub error: ValidationError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn lot(remaining: Decimal) -> PurchaseLot {
        PurchaseLot::new(
            "L1",
            "A",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            dec!(100),
            dec!(10),
            dec!(1),
        )
        .with_remaining(remaining)
    }

    #[test]
    fn movement_type_follows_sign() {
        let (run, tenant) = (RunId::new(), TenantId::new());

        let sale = InventoryMovement::between(run, tenant, &lot(dec!(100)), &lot(dec!(20)), false).unwrap();
        assert_eq!(sale.movement_type, MovementType::Sale);
        assert_eq!(sale.quantity_delta, dec!(-80));

        let ret = InventoryMovement::between(run, tenant, &lot(dec!(20)), &lot(dec!(25)), false).unwrap();
        assert_eq!(ret.movement_type, MovementType::Return);
        assert_eq!(ret.quantity_delta, dec!(5));

        let rollback = InventoryMovement::between(run, tenant, &lot(dec!(20)), &lot(dec!(100)), true).unwrap();
        assert_eq!(rollback.movement_type, MovementType::Rollback);
    }

    #[test]
    fn unchanged_lot_has_no_movement() {
        let (run, tenant) = (RunId::new(), TenantId::new());
        assert!(InventoryMovement::between(run, tenant, &lot(dec!(50)), &lot(dec!(50.000)), false).is_none());
    }

    #[test]
    fn snapshot_entry_phases() {
        let (run, tenant) = (RunId::new(), TenantId::new());
        assert!(!SnapshotEntry::before(run, tenant, lot(dec!(1))).is_live());
        assert!(SnapshotEntry::after(run, tenant, lot(dec!(1))).is_live());

        let mut restored = SnapshotEntry::restored(run, tenant, lot(dec!(1)));
        assert_eq!(restored.phase, SnapshotPhase::Restored);
        restored.superseded_at = Some(Utc::now());
        assert!(!restored.is_live());
    }
}
