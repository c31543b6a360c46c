//! `cogs-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error model, and request-scoped tenant context.

pub mod entity;
pub mod error;
pub mod id;
pub mod tenant;

pub use entity::{Entity, duplicate_ids};
pub use error::{DomainError, DomainResult};
pub use id::{LotId, RunId, SaleId, TenantId};
pub use tenant::{TenantGuard, TenantScope, TenantTagged, ensure_tenant_id, filter_by_tenant};
