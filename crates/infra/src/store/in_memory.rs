//! In-memory `CogsStore` for tests/dev.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use cogs_core::{RunId, TenantId};
use cogs_costing::{CogsAttribution, CogsSummary, ValidationError};
use cogs_inventory::PurchaseLot;

use super::r#trait::{CogsStore, StoreError};
use super::types::{
    InventoryMovement, SnapshotEntry, StoredAttribution, StoredSummary, StoredValidationError,
};
use crate::run::{CogsRun, RunStatus};

/// Process-local store. Runs are keyed by id; everything else is kept in
/// append order.
#[derive(Debug, Default)]
pub struct InMemoryCogsStore {
    runs: RwLock<HashMap<RunId, CogsRun>>,
    snapshots: RwLock<Vec<SnapshotEntry>>,
    movements: RwLock<Vec<InventoryMovement>>,
    attributions: RwLock<Vec<StoredAttribution>>,
    summaries: RwLock<Vec<StoredSummary>>,
    validation_errors: RwLock<Vec<StoredValidationError>>,
}

impl InMemoryCogsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self::new())
    }

    /// Seed a tenant's live inventory, as an onboarding upload would.
    pub fn seed_lots(&self, tenant_id: TenantId, lots: Vec<PurchaseLot>) -> Result<(), StoreError> {
        let seed_run = RunId::new();
        for lot in lots {
            self.save_inventory_snapshot(SnapshotEntry::after(seed_run, tenant_id, lot.with_tenant(tenant_id)))?;
        }
        Ok(())
    }

    pub fn get_cogs_summaries(&self, run_id: RunId, tenant_id: TenantId) -> Result<Vec<StoredSummary>, StoreError> {
        self.ensure_run_owner(run_id, tenant_id)?;
        Ok(read(&self.summaries)?
            .iter()
            .filter(|s| s.run_id == run_id && s.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    /// Fails if `run_id` is known under another tenant.
    fn ensure_run_owner(&self, run_id: RunId, tenant_id: TenantId) -> Result<(), StoreError> {
        match read(&self.runs)?.get(&run_id) {
            Some(run) if run.tenant_id != tenant_id => Err(StoreError::TenantIsolation),
            _ => Ok(()),
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StoreError> {
    lock.read().map_err(|_| StoreError::Storage("lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StoreError> {
    lock.write().map_err(|_| StoreError::Storage("lock poisoned".to_string()))
}

fn active_conflict(runs: &HashMap<RunId, CogsRun>, candidate: &CogsRun) -> Option<RunId> {
    if !candidate.status.is_active() {
        return None;
    }
    runs.values()
        .find(|r| r.tenant_id == candidate.tenant_id && r.run_id != candidate.run_id && r.status.is_active())
        .map(|r| r.run_id)
}

impl CogsStore for InMemoryCogsStore {
    fn save_run(&self, run: &CogsRun) -> Result<(), StoreError> {
        let mut runs = write(&self.runs)?;
        if runs.contains_key(&run.run_id) {
            return Err(StoreError::Conflict(format!("run {} already exists", run.run_id)));
        }
        if let Some(active) = active_conflict(&runs, run) {
            return Err(StoreError::Conflict(format!(
                "tenant {} already has active run {active}",
                run.tenant_id
            )));
        }
        runs.insert(run.run_id, run.clone());
        Ok(())
    }

    fn update_run(&self, run: &CogsRun) -> Result<(), StoreError> {
        let mut runs = write(&self.runs)?;
        match runs.get(&run.run_id) {
            None => return Err(StoreError::NotFound(format!("run {}", run.run_id))),
            Some(existing) if existing.tenant_id != run.tenant_id => return Err(StoreError::TenantIsolation),
            Some(_) => {}
        }
        if let Some(active) = active_conflict(&runs, run) {
            return Err(StoreError::Conflict(format!(
                "tenant {} already has active run {active}",
                run.tenant_id
            )));
        }
        runs.insert(run.run_id, run.clone());
        Ok(())
    }

    fn get_run(&self, tenant_id: TenantId, run_id: RunId) -> Result<Option<CogsRun>, StoreError> {
        match read(&self.runs)?.get(&run_id) {
            Some(run) if run.tenant_id == tenant_id => Ok(Some(run.clone())),
            Some(_) => Err(StoreError::TenantIsolation),
            None => Ok(None),
        }
    }

    fn get_active_runs(&self, tenant_id: TenantId) -> Result<Vec<RunId>, StoreError> {
        let runs = read(&self.runs)?;
        let mut active: Vec<_> = runs
            .values()
            .filter(|r| r.tenant_id == tenant_id && r.status.is_active())
            .collect();
        active.sort_by_key(|r| r.started_at);
        Ok(active.into_iter().map(|r| r.run_id).collect())
    }

    fn list_runs(&self, tenant_id: TenantId) -> Result<Vec<CogsRun>, StoreError> {
        let runs = read(&self.runs)?;
        let mut result: Vec<_> = runs.values().filter(|r| r.tenant_id == tenant_id).cloned().collect();
        result.sort_by_key(|r| (r.started_at, r.run_id));
        Ok(result)
    }

    fn save_inventory_snapshot(&self, entry: SnapshotEntry) -> Result<(), StoreError> {
        self.ensure_run_owner(entry.run_id, entry.tenant_id)?;
        let mut snapshots = write(&self.snapshots)?;
        if entry.is_current {
            for live in snapshots.iter_mut().filter(|e| {
                e.is_live() && e.tenant_id == entry.tenant_id && e.lot.lot_id == entry.lot.lot_id
            }) {
                live.superseded_at = Some(entry.recorded_at);
            }
        }
        snapshots.push(entry);
        Ok(())
    }

    fn get_inventory_snapshots(
        &self,
        run_id: RunId,
        tenant_id: TenantId,
        is_current: bool,
    ) -> Result<Vec<SnapshotEntry>, StoreError> {
        self.ensure_run_owner(run_id, tenant_id)?;
        Ok(read(&self.snapshots)?
            .iter()
            .filter(|e| e.run_id == run_id && e.tenant_id == tenant_id && e.is_current == is_current)
            .cloned()
            .collect())
    }

    fn current_lots(&self, tenant_id: TenantId) -> Result<Vec<PurchaseLot>, StoreError> {
        let mut lots: Vec<PurchaseLot> = read(&self.snapshots)?
            .iter()
            .filter(|e| e.tenant_id == tenant_id && e.is_live())
            .map(|e| e.lot.clone())
            .collect();
        lots.sort_by(|a, b| {
            a.received_date
                .cmp(&b.received_date)
                .then_with(|| a.lot_id.cmp(&b.lot_id))
        });
        Ok(lots)
    }

    fn save_inventory_movement(&self, movement: InventoryMovement) -> Result<(), StoreError> {
        self.ensure_run_owner(movement.run_id, movement.tenant_id)?;
        write(&self.movements)?.push(movement);
        Ok(())
    }

    fn get_inventory_movements(
        &self,
        run_id: RunId,
        tenant_id: TenantId,
    ) -> Result<Vec<InventoryMovement>, StoreError> {
        self.ensure_run_owner(run_id, tenant_id)?;
        Ok(read(&self.movements)?
            .iter()
            .filter(|m| m.run_id == run_id && m.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    fn save_cogs_attributions(
        &self,
        run_id: RunId,
        tenant_id: TenantId,
        attributions: &[CogsAttribution],
    ) -> Result<(), StoreError> {
        self.ensure_run_owner(run_id, tenant_id)?;
        write(&self.attributions)?.extend(attributions.iter().cloned().map(|attribution| StoredAttribution {
            run_id,
            tenant_id,
            attribution,
            is_valid: true,
        }));
        Ok(())
    }

    fn save_cogs_summaries(
        &self,
        run_id: RunId,
        tenant_id: TenantId,
        summaries: &[CogsSummary],
    ) -> Result<(), StoreError> {
        self.ensure_run_owner(run_id, tenant_id)?;
        write(&self.summaries)?.extend(summaries.iter().cloned().map(|summary| StoredSummary {
            run_id,
            tenant_id,
            summary,
            is_valid: true,
        }));
        Ok(())
    }

    fn save_validation_errors(
        &self,
        run_id: RunId,
        tenant_id: TenantId,
        errors: &[ValidationError],
    ) -> Result<(), StoreError> {
        self.ensure_run_owner(run_id, tenant_id)?;
        write(&self.validation_errors)?.extend(errors.iter().cloned().map(|error| StoredValidationError {
            run_id,
            tenant_id,
            error,
        }));
        Ok(())
    }

    fn get_validation_errors(&self, run_id: RunId, tenant_id: TenantId) -> Result<Vec<ValidationError>, StoreError> {
        self.ensure_run_owner(run_id, tenant_id)?;
        Ok(read(&self.validation_errors)?
            .iter()
            .filter(|e| e.run_id == run_id && e.tenant_id == tenant_id)
            .map(|e| e.error.clone())
            .collect())
    }

    fn get_cogs_attributions(
        &self,
        run_id: RunId,
        tenant_id: TenantId,
    ) -> Result<Vec<StoredAttribution>, StoreError> {
        self.ensure_run_owner(run_id, tenant_id)?;
        Ok(read(&self.attributions)?
            .iter()
            .filter(|a| a.run_id == run_id && a.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    fn invalidate_cogs_data(&self, run_id: RunId, tenant_id: TenantId) -> Result<(), StoreError> {
        self.ensure_run_owner(run_id, tenant_id)?;
        for a in write(&self.attributions)?
            .iter_mut()
            .filter(|a| a.run_id == run_id && a.tenant_id == tenant_id)
        {
            a.is_valid = false;
        }
        for s in write(&self.summaries)?
            .iter_mut()
            .filter(|s| s.run_id == run_id && s.tenant_id == tenant_id)
        {
            s.is_valid = false;
        }
        Ok(())
    }

    fn mark_run_rolled_back(&self, run_id: RunId, tenant_id: TenantId, rollback_by: &str) -> Result<bool, StoreError> {
        let mut runs = write(&self.runs)?;
        let run = runs
            .get_mut(&run_id)
            .ok_or_else(|| StoreError::NotFound(format!("run {run_id}")))?;
        if run.tenant_id != tenant_id {
            return Err(StoreError::TenantIsolation);
        }
        // Check and flip under one write lock.
        if run.status == RunStatus::RolledBack {
            return Ok(false);
        }
        run.mark_rolled_back(rollback_by, Utc::now())?;
        Ok(true)
    }

    fn create_rollback_audit_entry(
        &self,
        run_id: RunId,
        tenant_id: TenantId,
        rollback_by: &str,
    ) -> Result<RunId, StoreError> {
        let mut runs = write(&self.runs)?;
        let original = runs
            .get(&run_id)
            .ok_or_else(|| StoreError::NotFound(format!("run {run_id}")))?;
        if original.tenant_id != tenant_id {
            return Err(StoreError::TenantIsolation);
        }
        let audit = CogsRun::rollback_audit(original, rollback_by, Utc::now());
        let audit_id = audit.run_id;
        runs.insert(audit_id, audit);
        Ok(audit_id)
    }
}
