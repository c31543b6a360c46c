use std::sync::Arc;

use thiserror::Error;

use cogs_accounting::{JournalAccounts, JournalEntry, JournalFormat};
use cogs_core::{DomainError, RunId, TenantId};
use cogs_costing::{CogsAttribution, CogsSummary, ValidationError};
use cogs_inventory::PurchaseLot;

use super::types::{InventoryMovement, SnapshotEntry, StoredAttribution};
use crate::run::CogsRun;

/// Persistence adapter for runs and everything a run writes.
///
/// Every read and write is tenant-scoped; touching a record that belongs to
/// another tenant is a [`StoreError::TenantIsolation`].
///
/// Implementations must back the one-active-run-per-tenant rule: `save_run`
/// rejects a PENDING/RUNNING run when the tenant already has one
/// ([`StoreError::Conflict`]).
pub trait CogsStore: Send + Sync {
    fn save_run(&self, run: &CogsRun) -> Result<(), StoreError>;

    fn update_run(&self, run: &CogsRun) -> Result<(), StoreError>;

    fn get_run(&self, tenant_id: TenantId, run_id: RunId) -> Result<Option<CogsRun>, StoreError>;

    /// Runs in PENDING or RUNNING.
    fn get_active_runs(&self, tenant_id: TenantId) -> Result<Vec<RunId>, StoreError>;

    /// All runs of a tenant, oldest first.
    fn list_runs(&self, tenant_id: TenantId) -> Result<Vec<CogsRun>, StoreError>;

    /// Append a snapshot entry. A current entry supersedes the live entry of
    /// the same lot.
    fn save_inventory_snapshot(&self, entry: SnapshotEntry) -> Result<(), StoreError>;

    /// `is_current = false` yields the run's "before" entries; `true` the
    /// entries it wrote as live state.
    fn get_inventory_snapshots(
        &self,
        run_id: RunId,
        tenant_id: TenantId,
        is_current: bool,
    ) -> Result<Vec<SnapshotEntry>, StoreError>;

    /// The tenant's live lot state, ordered by received date then lot id.
    fn current_lots(&self, tenant_id: TenantId) -> Result<Vec<PurchaseLot>, StoreError>;

    fn save_inventory_movement(&self, movement: InventoryMovement) -> Result<(), StoreError>;

    fn get_inventory_movements(
        &self,
        run_id: RunId,
        tenant_id: TenantId,
    ) -> Result<Vec<InventoryMovement>, StoreError>;

    fn save_cogs_attributions(
        &self,
        run_id: RunId,
        tenant_id: TenantId,
        attributions: &[CogsAttribution],
    ) -> Result<(), StoreError>;

    fn save_cogs_summaries(
        &self,
        run_id: RunId,
        tenant_id: TenantId,
        summaries: &[CogsSummary],
    ) -> Result<(), StoreError>;

    fn save_validation_errors(
        &self,
        run_id: RunId,
        tenant_id: TenantId,
        errors: &[ValidationError],
    ) -> Result<(), StoreError>;

    fn get_validation_errors(&self, run_id: RunId, tenant_id: TenantId) -> Result<Vec<ValidationError>, StoreError>;

    fn get_cogs_attributions(
        &self,
        run_id: RunId,
        tenant_id: TenantId,
    ) -> Result<Vec<StoredAttribution>, StoreError>;

    /// Soft-delete: flags the run's attributions and summaries invalid.
    fn invalidate_cogs_data(&self, run_id: RunId, tenant_id: TenantId) -> Result<(), StoreError>;

    /// Atomically flip a COMPLETED or FAILED run to ROLLED_BACK.
    ///
    /// Returns `false` without writing when the run is already ROLLED_BACK,
    /// so exactly one of several concurrent callers sees `true`. Any other
    /// status is a [`DomainError::InvalidState`].
    fn mark_run_rolled_back(&self, run_id: RunId, tenant_id: TenantId, rollback_by: &str) -> Result<bool, StoreError>;

    /// Writes the synthetic COMPLETED run recording the rollback of `run_id`.
    fn create_rollback_audit_entry(
        &self,
        run_id: RunId,
        tenant_id: TenantId,
        rollback_by: &str,
    ) -> Result<RunId, StoreError>;

    /// Double-entry journal for the run's still-valid attributions.
    ///
    /// A run with none (every sale a finding, or rolled back) renders an
    /// empty entry dated when the run completed.
    fn generate_journal_entry(
        &self,
        run_id: RunId,
        tenant_id: TenantId,
        format: JournalFormat,
        accounts: &JournalAccounts,
    ) -> Result<String, StoreError> {
        let run = self
            .get_run(tenant_id, run_id)?
            .ok_or_else(|| StoreError::NotFound(format!("run {run_id}")))?;
        let run_date = run.completed_at.unwrap_or(run.started_at).date_naive();

        let attributions: Vec<CogsAttribution> = self
            .get_cogs_attributions(run_id, tenant_id)?
            .into_iter()
            .filter(|a| a.is_valid)
            .map(|a| a.attribution)
            .collect();

        let entry = JournalEntry::for_run(run_id, tenant_id, &attributions, accounts, run_date)?;
        Ok(entry.render(format)?)
    }
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("tenant isolation violation")]
    TenantIsolation,
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("storage error: {0}")]
    Storage(String),
}

impl<S: CogsStore + ?Sized> CogsStore for Arc<S> {
    fn save_run(&self, run: &CogsRun) -> Result<(), StoreError> {
        (**self).save_run(run)
    }

    fn update_run(&self, run: &CogsRun) -> Result<(), StoreError> {
        (**self).update_run(run)
    }

    fn get_run(&self, tenant_id: TenantId, run_id: RunId) -> Result<Option<CogsRun>, StoreError> {
        (**self).get_run(tenant_id, run_id)
    }

    fn get_active_runs(&self, tenant_id: TenantId) -> Result<Vec<RunId>, StoreError> {
        (**self).get_active_runs(tenant_id)
    }

    fn list_runs(&self, tenant_id: TenantId) -> Result<Vec<CogsRun>, StoreError> {
        (**self).list_runs(tenant_id)
    }

    fn save_inventory_snapshot(&self, entry: SnapshotEntry) -> Result<(), StoreError> {
        (**self).save_inventory_snapshot(entry)
    }

    fn get_inventory_snapshots(
        &self,
        run_id: RunId,
        tenant_id: TenantId,
        is_current: bool,
    ) -> Result<Vec<SnapshotEntry>, StoreError> {
        (**self).get_inventory_snapshots(run_id, tenant_id, is_current)
    }

    fn current_lots(&self, tenant_id: TenantId) -> Result<Vec<PurchaseLot>, StoreError> {
        (**self).current_lots(tenant_id)
    }

    fn save_inventory_movement(&self, movement: InventoryMovement) -> Result<(), StoreError> {
        (**self).save_inventory_movement(movement)
    }

    fn get_inventory_movements(
        &self,
        run_id: RunId,
        tenant_id: TenantId,
    ) -> Result<Vec<InventoryMovement>, StoreError> {
        (**self).get_inventory_movements(run_id, tenant_id)
    }

    fn save_cogs_attributions(
        &self,
        run_id: RunId,
        tenant_id: TenantId,
        attributions: &[CogsAttribution],
    ) -> Result<(), StoreError> {
        (**self).save_cogs_attributions(run_id, tenant_id, attributions)
    }

    fn save_cogs_summaries(
        &self,
        run_id: RunId,
        tenant_id: TenantId,
        summaries: &[CogsSummary],
    ) -> Result<(), StoreError> {
        (**self).save_cogs_summaries(run_id, tenant_id, summaries)
    }

    fn save_validation_errors(
        &self,
        run_id: RunId,
        tenant_id: TenantId,
        errors: &[ValidationError],
    ) -> Result<(), StoreError> {
        (**self).save_validation_errors(run_id, tenant_id, errors)
    }

    fn get_validation_errors(&self, run_id: RunId, tenant_id: TenantId) -> Result<Vec<ValidationError>, StoreError> {
        (**self).get_validation_errors(run_id, tenant_id)
    }

    fn get_cogs_attributions(
        &self,
        run_id: RunId,
        tenant_id: TenantId,
    ) -> Result<Vec<StoredAttribution>, StoreError> {
        (**self).get_cogs_attributions(run_id, tenant_id)
    }

    fn invalidate_cogs_data(&self, run_id: RunId, tenant_id: TenantId) -> Result<(), StoreError> {
        (**self).invalidate_cogs_data(run_id, tenant_id)
    }

    fn mark_run_rolled_back(&self, run_id: RunId, tenant_id: TenantId, rollback_by: &str) -> Result<bool, StoreError> {
        (**self).mark_run_rolled_back(run_id, tenant_id, rollback_by)
    }

    fn create_rollback_audit_entry(
        &self,
        run_id: RunId,
        tenant_id: TenantId,
        rollback_by: &str,
    ) -> Result<RunId, StoreError> {
        (**self).create_rollback_audit_entry(run_id, tenant_id, rollback_by)
    }

    fn generate_journal_entry(
        &self,
        run_id: RunId,
        tenant_id: TenantId,
        format: JournalFormat,
        accounts: &JournalAccounts,
    ) -> Result<String, StoreError> {
        (**self).generate_journal_entry(run_id, tenant_id, format, accounts)
    }
}
