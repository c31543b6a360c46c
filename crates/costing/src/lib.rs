//! Costing domain module: FIFO cost-of-goods-sold allocation.
//!
//! Deterministic domain logic only. Given a tenant's lots and a batch of
//! sales/returns it computes per-sale COGS attributions, a new inventory
//! snapshot, monthly summaries and data-quality findings.

pub mod attribution;
pub mod engine;
pub mod validation;
pub mod validator;

pub use attribution::{CogsAttribution, CogsSummary, LotAllocation};
pub use engine::{AppliedReturn, CostingMode, FifoOutcome, calculate_summary, process_transactions};
pub use validation::{FindingSource, ValidationError, ValidationErrorKind};
pub use validator::Validator;
