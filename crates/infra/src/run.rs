//! COGS run lifecycle.
//!
//! ```text
//! PENDING -> RUNNING -> COMPLETED -> ROLLED_BACK
//!                    \-> FAILED ----/
//! ```
//!
//! A rollback also records a synthetic audit run (COMPLETED, with
//! `rollback_of_run_id` pointing at the reversed run).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cogs_core::{DomainError, DomainResult, RunId, TenantId};
use cogs_costing::CostingMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    RolledBack,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "PENDING",
            RunStatus::Running => "RUNNING",
            RunStatus::Completed => "COMPLETED",
            RunStatus::Failed => "FAILED",
            RunStatus::RolledBack => "ROLLED_BACK",
        }
    }

    /// In flight; at most one such run per tenant.
    pub fn is_active(&self) -> bool {
        matches!(self, RunStatus::Pending | RunStatus::Running)
    }

    pub fn can_roll_back(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl core::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statistics recorded when a run completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_sales_processed: usize,
    pub total_cogs_calculated: Decimal,
    pub validation_errors_count: usize,
}

/// One execution of the costing engine against a tenant's data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CogsRun {
    pub run_id: RunId,
    pub tenant_id: TenantId,
    pub status: RunStatus,
    pub mode: CostingMode,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_by: String,
    pub rollback_of_run_id: Option<RunId>,
    pub rolled_back_by: Option<String>,
    pub rolled_back_at: Option<DateTime<Utc>>,
    pub total_sales_processed: usize,
    pub total_cogs_calculated: Decimal,
    pub validation_errors_count: usize,
}

impl CogsRun {
    /// A new PENDING run.
    pub fn new(tenant_id: TenantId, mode: CostingMode, created_by: impl Into<String>) -> Self {
        Self {
            run_id: RunId::new(),
            tenant_id,
            status: RunStatus::Pending,
            mode,
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
            created_by: created_by.into(),
            rollback_of_run_id: None,
            rolled_back_by: None,
            rolled_back_at: None,
            total_sales_processed: 0,
            total_cogs_calculated: Decimal::ZERO,
            validation_errors_count: 0,
        }
    }

    /// The COMPLETED audit record written when `original` is rolled back.
    pub fn rollback_audit(original: &CogsRun, rollback_by: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            status: RunStatus::Completed,
            started_at: at,
            completed_at: Some(at),
            rollback_of_run_id: Some(original.run_id),
            ..Self::new(original.tenant_id, original.mode, rollback_by)
        }
    }

    pub fn stats(&self) -> RunStats {
        RunStats {
            total_sales_processed: self.total_sales_processed,
            total_cogs_calculated: self.total_cogs_calculated,
            validation_errors_count: self.validation_errors_count,
        }
    }

    pub fn mark_running(&mut self) -> DomainResult<()> {
        self.transition(RunStatus::Pending, RunStatus::Running)
    }

    pub fn mark_completed(&mut self, stats: RunStats) -> DomainResult<()> {
        self.transition(RunStatus::Running, RunStatus::Completed)?;
        self.completed_at = Some(Utc::now());
        self.total_sales_processed = stats.total_sales_processed;
        self.total_cogs_calculated = stats.total_cogs_calculated;
        self.validation_errors_count = stats.validation_errors_count;
        Ok(())
    }

    /// Only an in-flight run can fail.
    pub fn mark_failed(&mut self, error: impl Into<String>) -> DomainResult<()> {
        if !self.status.is_active() {
            return Err(self.illegal(RunStatus::Failed));
        }
        self.status = RunStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error_message = Some(error.into());
        Ok(())
    }

    pub fn mark_rolled_back(&mut self, rollback_by: impl Into<String>, at: DateTime<Utc>) -> DomainResult<()> {
        if !self.status.can_roll_back() {
            return Err(self.illegal(RunStatus::RolledBack));
        }
        self.status = RunStatus::RolledBack;
        self.rolled_back_by = Some(rollback_by.into());
        self.rolled_back_at = Some(at);
        Ok(())
    }

    fn transition(&mut self, from: RunStatus, to: RunStatus) -> DomainResult<()> {
        if self.status != from {
            return Err(self.illegal(to));
        }
        self.status = to;
        Ok(())
    }

    fn illegal(&self, to: RunStatus) -> DomainError {
        DomainError::invalid_state(format!(
            "run {} cannot move from {} to {}",
            self.run_id, self.status, to
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn run() -> CogsRun {
        CogsRun::new(TenantId::new(), CostingMode::Fifo, "tester")
    }

    #[test]
    fn happy_path_lifecycle() {
        let mut run = run();
        assert_eq!(run.status, RunStatus::Pending);
        assert!(run.status.is_active());

        run.mark_running().unwrap();
        run.mark_completed(RunStats {
            total_sales_processed: 3,
            total_cogs_calculated: dec!(1340.00),
            validation_errors_count: 1,
        })
        .unwrap();

        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.completed_at.is_some());
        assert_eq!(run.stats().total_cogs_calculated, dec!(1340.00));
        assert!(run.status.can_roll_back());
    }

    #[test]
    fn cannot_complete_without_running() {
        let mut run = run();
        let err = run.mark_completed(RunStats::default()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
        assert_eq!(run.status, RunStatus::Pending);
    }

    #[test]
    fn failed_run_keeps_error_and_is_rollback_eligible() {
        let mut run = run();
        run.mark_running().unwrap();
        run.mark_failed("disk full").unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error_message.as_deref(), Some("disk full"));
        assert!(run.mark_failed("again").is_err());

        run.mark_rolled_back("ops", Utc::now()).unwrap();
        assert_eq!(run.status, RunStatus::RolledBack);
        assert_eq!(run.rolled_back_by.as_deref(), Some("ops"));
    }

    #[test]
    fn in_flight_run_cannot_be_rolled_back() {
        let mut run = run();
        run.mark_running().unwrap();
        assert!(matches!(
            run.mark_rolled_back("ops", Utc::now()),
            Err(DomainError::InvalidState(_))
        ));
    }

    #[test]
    fn audit_run_references_original() {
        let original = run();
        let audit = CogsRun::rollback_audit(&original, "ops", Utc::now());

        assert_ne!(audit.run_id, original.run_id);
        assert_eq!(audit.tenant_id, original.tenant_id);
        assert_eq!(audit.status, RunStatus::Completed);
        assert_eq!(audit.rollback_of_run_id, Some(original.run_id));
        assert_eq!(audit.created_by, "ops");
    }

    #[test]
    fn status_serializes_screaming_snake() {
        let json = serde_json::to_string(&RunStatus::RolledBack).unwrap();
        assert_eq!(json, "\"ROLLED_BACK\"");
    }
}
