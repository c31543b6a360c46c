//! Working state of a tenant's lots at a point in time.
//!
//! A snapshot owns its lots by value. Cloning it yields an independent copy,
//! so mutating a working snapshot can never reach back into a "before" copy
//! that was taken for persistence. Lots are addressed by their position in
//! the snapshot (`LotPosition`) rather than by shared references.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cogs_core::LotId;

use crate::lot::PurchaseLot;

/// Index of a lot inside an [`InventorySnapshot`].
pub type LotPosition = usize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    lots: Vec<PurchaseLot>,
}

impl InventorySnapshot {
    pub fn new(lots: Vec<PurchaseLot>) -> Self {
        Self { lots }
    }

    pub fn lots(&self) -> &[PurchaseLot] {
        &self.lots
    }

    pub fn into_lots(self) -> Vec<PurchaseLot> {
        self.lots
    }

    pub fn len(&self) -> usize {
        self.lots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    pub fn lot(&self, lot_id: &LotId) -> Option<&PurchaseLot> {
        self.lots.iter().find(|l| &l.lot_id == lot_id)
    }

    pub fn lot_at(&self, position: LotPosition) -> Option<&PurchaseLot> {
        self.lots.get(position)
    }

    pub fn lot_at_mut(&mut self, position: LotPosition) -> Option<&mut PurchaseLot> {
        self.lots.get_mut(position)
    }

    /// Positions of every lot for `sku`, oldest first (ties by lot id).
    pub fn positions_for_sku(&self, sku: &str) -> Vec<LotPosition> {
        let mut positions: Vec<LotPosition> = self
            .lots
            .iter()
            .enumerate()
            .filter(|(_, l)| l.sku == sku)
            .map(|(idx, _)| idx)
            .collect();
        positions.sort_by(|a, b| {
            let (la, lb) = (&self.lots[*a], &self.lots[*b]);
            la.received_date
                .cmp(&lb.received_date)
                .then_with(|| la.lot_id.cmp(&lb.lot_id))
        });
        positions
    }

    /// Positions of lots for `sku` that can be consumed on `as_of`: remaining
    /// above zero and received on or before that date, oldest first.
    pub fn available_positions(&self, sku: &str, as_of: NaiveDate) -> Vec<LotPosition> {
        self.positions_for_sku(sku)
            .into_iter()
            .filter(|p| {
                let lot = &self.lots[*p];
                lot.has_remaining() && lot.received_date <= as_of
            })
            .collect()
    }

    /// Lots for `sku` that can be consumed on `as_of`, oldest first.
    pub fn get_available_lots(&self, sku: &str, as_of: NaiveDate) -> Vec<&PurchaseLot> {
        self.available_positions(sku, as_of)
            .into_iter()
            .map(|p| &self.lots[p])
            .collect()
    }

    /// Chronologically oldest lot for `sku`, regardless of remaining quantity.
    pub fn oldest_position(&self, sku: &str) -> Option<LotPosition> {
        self.positions_for_sku(sku).into_iter().next()
    }

    pub fn total_remaining(&self, sku: &str) -> Decimal {
        self.lots
            .iter()
            .filter(|l| l.sku == sku)
            .map(|l| l.remaining_quantity())
            .sum()
    }

    /// Remaining quantity per SKU, keyed in SKU order.
    pub fn remaining_by_sku(&self) -> BTreeMap<String, Decimal> {
        let mut totals = BTreeMap::new();
        for lot in &self.lots {
            *totals.entry(lot.sku.clone()).or_insert(Decimal::ZERO) += lot.remaining_quantity();
        }
        totals
    }
}

impl From<Vec<PurchaseLot>> for InventorySnapshot {
    fn from(lots: Vec<PurchaseLot>) -> Self {
        Self::new(lots)
    }
}
