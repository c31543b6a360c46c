//! Infrastructure layer: run lifecycle, persistence boundary and the
//! journaled orchestrator around the costing engine.

pub mod config;
pub mod orchestrator;
pub mod run;
pub mod store;


pub use config::OrchestratorConfig;
pub use orchestrator::{
    CogsRunOrchestrator, CreateRunRequest, RollbackResult, RollbackStatus, RunError, RunResult,
};
pub use run::{CogsRun, RunStats, RunStatus};
pub use store::{CogsStore, InMemoryCogsStore, StoreError};
