//! Journaled COGS run orchestrator.
//!
//! Wraps the FIFO engine with a persisted unit of work:
//!
//! 1. reject the call if the tenant already has a run in flight
//! 2. persist the run (PENDING, then RUNNING)
//! 3. persist a "before" snapshot entry per lot
//! 4. run the engine on a private copy of the lots
//! 5. persist one movement per changed lot
//! 6. persist "after" entries, attributions, summaries and findings
//! 7. mark the run COMPLETED (findings do not fail a run)
//!
//! Errors after step 2 mark the run FAILED and are reported through
//! [`RunResult`]. Rollback flips the run to ROLLED_BACK, writes the "before"
//! entries back as the tenant's live lot state and soft-invalidates the run's
//! COGS rows.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use cogs_accounting::JournalFormat;
use cogs_core::{DomainError, LotId, RunId, TenantId, TenantScope};
use cogs_costing::{CogsAttribution, CogsSummary, CostingMode, FifoOutcome, ValidationError, calculate_summary};
use cogs_inventory::{InventorySnapshot, PurchaseLot, Sale, ensure_tenant_id_on_lots, ensure_tenant_id_on_sales};

use crate::config::OrchestratorConfig;
use crate::run::{CogsRun, RunStats, RunStatus};
use crate::store::{CogsStore, InventoryMovement, SnapshotEntry, StoreError};

/// Input of [`CogsRunOrchestrator::create_and_execute_run`].
///
/// Sales use the signed convention: a negative quantity is a return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRunRequest {
    pub tenant_id: TenantId,
    pub lots: Vec<PurchaseLot>,
    pub sales: Vec<Sale>,
    /// Costing mode name; empty means the configured default.
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl CreateRunRequest {
    pub fn new(tenant_id: TenantId, lots: Vec<PurchaseLot>, sales: Vec<Sale>) -> Self {
        Self {
            tenant_id,
            lots,
            sales,
            mode: None,
            created_by: None,
        }
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn with_created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = Some(created_by.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: RunId,
    pub tenant_id: TenantId,
    pub status: RunStatus,
    pub total_cogs: Decimal,
    pub total_sales_processed: usize,
    pub attributions: Vec<CogsAttribution>,
    pub summaries: Vec<CogsSummary>,
    /// Validator and engine findings.
    pub validation_errors: Vec<ValidationError>,
    pub error_message: Option<String>,
}

impl RunResult {
    fn completed(run: &CogsRun, execution: Execution) -> Self {
        Self {
            run_id: run.run_id,
            tenant_id: run.tenant_id,
            status: run.status,
            total_cogs: run.total_cogs_calculated,
            total_sales_processed: run.total_sales_processed,
            attributions: execution.outcome.attributions,
            summaries: execution.summaries,
            validation_errors: execution.findings,
            error_message: None,
        }
    }

    fn failed(run: &CogsRun) -> Self {
        Self {
            run_id: run.run_id,
            tenant_id: run.tenant_id,
            status: run.status,
            total_cogs: Decimal::ZERO,
            total_sales_processed: 0,
            attributions: Vec::new(),
            summaries: Vec::new(),
            validation_errors: Vec::new(),
            error_message: run.error_message.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackStatus {
    RolledBack,
    AlreadyRolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackResult {
    pub run_id: RunId,
    /// The synthetic audit run; `None` only if an earlier rollback left none.
    pub rollback_run_id: Option<RunId>,
    pub status: RollbackStatus,
    pub restored_lots_count: usize,
    pub message: String,
}

/// Call-level orchestrator error. Data-quality findings are never errors.
#[derive(Debug, Clone, Error)]
pub enum RunError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("tenant mismatch: expected {expected}, found {found}")]
    TenantMismatch { expected: TenantId, found: TenantId },
    #[error("no tenant in scope")]
    MissingTenant,
    #[error("concurrent run rejected: {0}")]
    Concurrency(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("tenant isolation violation")]
    TenantIsolation,
    #[error("storage error: {0}")]
    Storage(String),
}

impl RunError {
    /// Stable machine-readable code for transports.
    pub fn code(&self) -> &'static str {
        match self {
            RunError::Validation(_) => "validation",
            RunError::InvariantViolation(_) => "invariant_violation",
            RunError::TenantMismatch { .. } => "tenant_mismatch",
            RunError::MissingTenant => "missing_tenant",
            RunError::Concurrency(_) => "conflict",
            RunError::NotFound(_) => "not_found",
            RunError::InvalidState(_) => "invalid_state",
            RunError::TenantIsolation => "tenant_isolation",
            RunError::Storage(_) => "storage",
        }
    }
}

impl From<DomainError> for RunError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => RunError::Validation(msg),
            DomainError::InvariantViolation(msg) => RunError::InvariantViolation(msg),
            DomainError::TenantMismatch { expected, found } => RunError::TenantMismatch { expected, found },
            DomainError::MissingTenant => RunError::MissingTenant,
            DomainError::NotFound(what) => RunError::NotFound(what),
            DomainError::Conflict(msg) => RunError::Concurrency(msg),
            DomainError::InvalidState(msg) => RunError::InvalidState(msg),
        }
    }
}

impl From<StoreError> for RunError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(what) => RunError::NotFound(what),
            StoreError::Conflict(msg) => RunError::Concurrency(msg),
            StoreError::TenantIsolation => RunError::TenantIsolation,
            StoreError::Domain(err) => err.into(),
            StoreError::Storage(msg) => RunError::Storage(msg),
        }
    }
}

struct Execution {
    outcome: FifoOutcome,
    summaries: Vec<CogsSummary>,
    findings: Vec<ValidationError>,
}

/// Runs the costing engine as a persisted, reversible unit of work.
///
/// Every entry point resolves the tenant from the caller's [`TenantScope`]
/// first and fails fast without one.
pub struct CogsRunOrchestrator<S> {
    store: S,
    config: OrchestratorConfig,
}

impl<S: CogsStore> CogsRunOrchestrator<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, OrchestratorConfig::default())
    }

    pub fn with_config(store: S, config: OrchestratorConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn create_and_execute_run(&self, scope: &TenantScope, request: CreateRunRequest) -> Result<RunResult, RunError> {
        let tenant_id = scoped_tenant(scope, request.tenant_id)?;
        let mode = match request.mode.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.parse::<CostingMode>()?,
            _ => self.config.default_mode,
        };

        let CreateRunRequest {
            mut lots,
            mut sales,
            created_by,
            ..
        } = request;
        ensure_tenant_id_on_lots(scope, &mut lots)?;
        ensure_tenant_id_on_sales(scope, &mut sales)?;

        if let Some(active_run_id) = self.store.get_active_runs(tenant_id)?.first() {
            warn!(%tenant_id, %active_run_id, "run rejected: tenant already has a run in progress");
            return Err(RunError::Concurrency(format!(
                "tenant {tenant_id} already has run {active_run_id} in progress"
            )));
        }

        let created_by = self.actor(created_by.as_deref());
        let mut run = CogsRun::new(tenant_id, mode, created_by);
        self.store.save_run(&run)?;
        info!(
            %tenant_id,
            run_id = %run.run_id,
            %mode,
            lots = lots.len(),
            sales = sales.len(),
            "cogs run created"
        );

        run.mark_running()?;
        match self.execute(&mut run, &lots, &sales) {
            Ok(execution) => {
                info!(
                    %tenant_id,
                    run_id = %run.run_id,
                    total_cogs = %run.total_cogs_calculated,
                    sales_processed = run.total_sales_processed,
                    validation_errors = run.validation_errors_count,
                    "cogs run completed"
                );
                Ok(RunResult::completed(&run, execution))
            }
            Err(err) => {
                let message = err.to_string();
                warn!(%tenant_id, run_id = %run.run_id, error = %message, "cogs run failed");
                run.mark_failed(message)?;
                if let Err(store_err) = self.store.update_run(&run) {
                    error!(
                        %tenant_id,
                        run_id = %run.run_id,
                        error = %store_err,
                        "could not persist FAILED status"
                    );
                    return Err(store_err.into());
                }
                Ok(RunResult::failed(&run))
            }
        }
    }

    /// Steps 2-7 for a run already marked RUNNING in memory. `run` is only
    /// replaced by its completed state once that state is persisted.
    fn execute(&self, run: &mut CogsRun, lots: &[PurchaseLot], sales: &[Sale]) -> Result<Execution, RunError> {
        self.store.update_run(run)?;
        let (run_id, tenant_id) = (run.run_id, run.tenant_id);

        for lot in lots {
            self.store
                .save_inventory_snapshot(SnapshotEntry::before(run_id, tenant_id, lot.clone()))?;
        }

        let mut findings = if self.config.prevalidate {
            self.config.validator().validate_all(lots, sales)
        } else {
            Vec::new()
        };

        let before = InventorySnapshot::new(lots.to_vec());
        let outcome = run.mode.process(&before, sales);

        for (old, new) in before.lots().iter().zip(outcome.snapshot.lots()) {
            if let Some(movement) = InventoryMovement::between(run_id, tenant_id, old, new, false) {
                debug!(
                    %run_id,
                    lot_id = %movement.lot_id,
                    sku = %movement.sku,
                    delta = %movement.quantity_delta,
                    "inventory movement"
                );
                self.store.save_inventory_movement(movement)?;
            }
        }

        for lot in outcome.snapshot.lots() {
            self.store
                .save_inventory_snapshot(SnapshotEntry::after(run_id, tenant_id, lot.clone()))?;
        }

        let summaries = calculate_summary(&outcome.attributions);
        self.store
            .save_cogs_attributions(run_id, tenant_id, &outcome.attributions)?;
        self.store.save_cogs_summaries(run_id, tenant_id, &summaries)?;

        findings.extend(outcome.validation_errors.iter().cloned());
        self.store.save_validation_errors(run_id, tenant_id, &findings)?;

        let mut completed = run.clone();
        completed.mark_completed(RunStats {
            total_sales_processed: outcome.attributions.len(),
            total_cogs_calculated: outcome.total_cogs(),
            validation_errors_count: findings.len(),
        })?;
        self.store.update_run(&completed)?;
        *run = completed;

        Ok(Execution {
            outcome,
            summaries,
            findings,
        })
    }

    /// Reverse a COMPLETED or FAILED run. Calling it again on the same run is
    /// a no-op reporting [`RollbackStatus::AlreadyRolledBack`].
    ///
    /// The status flip is the first write and is atomic in the store, so of
    /// several concurrent calls only one restores anything. Rollback is
    /// refused while the tenant has a run in flight.
    ///
    /// Inventory is restored from the run's "before" entries, not by
    /// reversing its movements, so a later run's effect on the same lots is
    /// overwritten.
    pub fn rollback_run(
        &self,
        scope: &TenantScope,
        run_id: RunId,
        rollback_by: Option<&str>,
    ) -> Result<RollbackResult, RunError> {
        let tenant_id = scope.require_tenant()?;
        let run = self
            .store
            .get_run(tenant_id, run_id)?
            .ok_or_else(|| RunError::NotFound(format!("run {run_id}")))?;

        if run.status == RunStatus::RolledBack {
            return self.already_rolled_back(tenant_id, run_id);
        }

        if !run.status.can_roll_back() {
            return Err(RunError::InvalidState(format!(
                "run {run_id} is {} and cannot be rolled back",
                run.status
            )));
        }

        if let Some(active_run_id) = self.store.get_active_runs(tenant_id)?.first() {
            warn!(%tenant_id, %run_id, %active_run_id, "rollback rejected: tenant has a run in progress");
            return Err(RunError::Concurrency(format!(
                "tenant {tenant_id} has run {active_run_id} in progress"
            )));
        }

        let rollback_by = self.actor(rollback_by);
        if !self.store.mark_run_rolled_back(run_id, tenant_id, &rollback_by)? {
            return self.already_rolled_back(tenant_id, run_id);
        }

        let before = self.store.get_inventory_snapshots(run_id, tenant_id, false)?;
        let live: HashMap<LotId, PurchaseLot> = self
            .store
            .current_lots(tenant_id)?
            .into_iter()
            .map(|lot| (lot.lot_id.clone(), lot))
            .collect();

        for entry in &before {
            if let Some(current) = live.get(&entry.lot.lot_id) {
                if let Some(movement) = InventoryMovement::between(run_id, tenant_id, current, &entry.lot, true) {
                    self.store.save_inventory_movement(movement)?;
                }
            }
            self.store
                .save_inventory_snapshot(SnapshotEntry::restored(run_id, tenant_id, entry.lot.clone()))?;
        }

        self.store.invalidate_cogs_data(run_id, tenant_id)?;
        let rollback_run_id = self
            .store
            .create_rollback_audit_entry(run_id, tenant_id, &rollback_by)?;

        info!(
            %tenant_id,
            %run_id,
            %rollback_run_id,
            restored_lots = before.len(),
            rollback_by = %rollback_by,
            "run rolled back"
        );

        Ok(RollbackResult {
            run_id,
            rollback_run_id: Some(rollback_run_id),
            status: RollbackStatus::RolledBack,
            restored_lots_count: before.len(),
            message: format!("restored {} lots from run {run_id}", before.len()),
        })
    }

    fn already_rolled_back(&self, tenant_id: TenantId, run_id: RunId) -> Result<RollbackResult, RunError> {
        let rollback_run_id = self
            .store
            .list_runs(tenant_id)?
            .into_iter()
            .find(|r| r.rollback_of_run_id == Some(run_id))
            .map(|r| r.run_id);
        info!(%tenant_id, %run_id, "run already rolled back");
        Ok(RollbackResult {
            run_id,
            rollback_run_id,
            status: RollbackStatus::AlreadyRolledBack,
            restored_lots_count: 0,
            message: format!("run {run_id} was already rolled back"),
        })
    }

    pub fn generate_journal_entry(
        &self,
        scope: &TenantScope,
        run_id: RunId,
        format: JournalFormat,
    ) -> Result<String, RunError> {
        let tenant_id = scope.require_tenant()?;
        Ok(self
            .store
            .generate_journal_entry(run_id, tenant_id, format, &self.config.journal_accounts)?)
    }

    /// The tenant's live lot state, ready to feed the next run.
    pub fn current_lots(&self, scope: &TenantScope) -> Result<Vec<PurchaseLot>, RunError> {
        let tenant_id = scope.require_tenant()?;
        Ok(self.store.current_lots(tenant_id)?)
    }

    pub fn get_run(&self, scope: &TenantScope, run_id: RunId) -> Result<CogsRun, RunError> {
        let tenant_id = scope.require_tenant()?;
        self.store
            .get_run(tenant_id, run_id)?
            .ok_or_else(|| RunError::NotFound(format!("run {run_id}")))
    }

    pub fn list_runs(&self, scope: &TenantScope) -> Result<Vec<CogsRun>, RunError> {
        let tenant_id = scope.require_tenant()?;
        Ok(self.store.list_runs(tenant_id)?)
    }

    fn actor(&self, requested: Option<&str>) -> String {
        match requested.map(str::trim) {
            Some(actor) if !actor.is_empty() => actor.to_string(),
            _ => self.config.default_actor.clone(),
        }
    }
}

/// The tenant in scope, which must be the one the request names.
fn scoped_tenant(scope: &TenantScope, requested: TenantId) -> Result<TenantId, RunError> {
    let current = scope.require_tenant()?;
    if current != requested {
        return Err(DomainError::tenant_mismatch(current, requested).into());
    }
    Ok(current)
}
