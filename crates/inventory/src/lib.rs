//! Inventory domain module.
//!
//! Purchase lots, sale/return transactions and the inventory snapshot the
//! costing engine works on. Pure domain logic (no IO, no storage).

pub mod lot;
pub mod sale;
pub mod snapshot;
pub mod tenant;

pub use lot::PurchaseLot;
pub use sale::{Sale, TransactionType};
pub use snapshot::{InventorySnapshot, LotPosition};
pub use tenant::{all_owned_by, ensure_tenant_id_on_lots, ensure_tenant_id_on_sales, filter_by_tenant};
