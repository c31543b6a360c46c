//! Tenant tagging for incoming lots and sales.

use cogs_core::{DomainResult, TenantId, TenantScope, ensure_tenant_id};

use crate::lot::PurchaseLot;
use crate::sale::Sale;

pub use cogs_core::filter_by_tenant;

/// Adopt untagged lots into the tenant in scope; reject lots owned by another tenant.
pub fn ensure_tenant_id_on_lots(scope: &TenantScope, lots: &mut [PurchaseLot]) -> DomainResult<usize> {
    let assigned = ensure_tenant_id(scope, lots)?;
    tracing::debug!(count = lots.len(), assigned, "lots tagged with tenant");
    Ok(assigned)
}

/// Adopt untagged sales into the tenant in scope; reject sales owned by another tenant.
pub fn ensure_tenant_id_on_sales(scope: &TenantScope, sales: &mut [Sale]) -> DomainResult<usize> {
    let assigned = ensure_tenant_id(scope, sales)?;
    tracing::debug!(count = sales.len(), assigned, "sales tagged with tenant");
    Ok(assigned)
}

/// True when every record is tagged with `tenant_id`.
pub fn all_owned_by(lots: &[PurchaseLot], sales: &[Sale], tenant_id: TenantId) -> bool {
    lots.iter().all(|l| l.tenant_id == Some(tenant_id))
        && sales.iter().all(|s| s.tenant_id == Some(tenant_id))
}
