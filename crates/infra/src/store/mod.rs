//! Persistence boundary for COGS runs.
//!
//! The orchestrator only talks to [`CogsStore`]; the concrete store is a
//! deployment concern. [`InMemoryCogsStore`] backs tests and local use.

pub mod in_memory;
pub mod r#trait;
pub mod types;

pub use in_memory::InMemoryCogsStore;
pub use r#trait::{CogsStore, StoreError};
pub use types::{
    InventoryMovement, MovementType, SnapshotEntry, SnapshotPhase, StoredAttribution, StoredSummary,
    StoredValidationError,
};
