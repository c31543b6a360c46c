//! Accounting output for COGS runs.
//!
//! Builds the double-entry journal entry (debit COGS, credit Inventory) for a
//! run's attributions and renders it for external accounting tools.

pub mod journal;

pub use journal::{Account, AccountKind, JournalAccounts, JournalEntry, JournalEntryLine, JournalFormat};
