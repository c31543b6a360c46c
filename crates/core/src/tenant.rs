//! Request-scoped tenant context.
//!
//! Every mutating entry point works inside a [`TenantScope`] carried by the
//! caller for one logical operation. Scopes nest: entering a tenant pushes it,
//! and the returned [`TenantGuard`] restores the prior tenant when dropped,
//! whether the operation returns normally, bails out with `?`, or unwinds.
//!
//! There is no process-wide "current tenant"; a scope is a plain value owned
//! by the request that created it.

use core::ops::{Deref, DerefMut};

use crate::error::{DomainError, DomainResult};
use crate::id::TenantId;

/// Stack of tenants entered for the current logical operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantScope {
    stack: Vec<TenantId>,
}

impl TenantScope {
    /// An empty scope (no tenant active).
    pub fn new() -> Self {
        Self::default()
    }

    /// A scope rooted at `tenant_id`, e.g. for one request.
    pub fn for_tenant(tenant_id: TenantId) -> Self {
        Self {
            stack: vec![tenant_id],
        }
    }

    /// The innermost active tenant, if any.
    pub fn current(&self) -> Option<TenantId> {
        self.stack.last().copied()
    }

    /// Number of nested tenant entries.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Fail fast when no tenant is active.
    pub fn require_tenant(&self) -> DomainResult<TenantId> {
        self.current().ok_or(DomainError::MissingTenant)
    }

    /// Enter `tenant_id` until the returned guard is dropped.
    pub fn enter(&mut self, tenant_id: TenantId) -> TenantGuard<'_> {
        let restore_to = self.stack.len();
        self.stack.push(tenant_id);
        tracing::trace!(%tenant_id, depth = restore_to + 1, "entered tenant scope");
        TenantGuard {
            scope: self,
            restore_to,
        }
    }

    /// Run `f` with `tenant_id` active, restoring the prior scope afterwards.
    pub fn scoped<T>(&mut self, tenant_id: TenantId, f: impl FnOnce(&mut TenantScope) -> T) -> T {
        let mut guard = self.enter(tenant_id);
        f(&mut guard)
    }
}

/// Restores the enclosing [`TenantScope`] to its prior state on drop.
#[derive(Debug)]
pub struct TenantGuard<'a> {
    scope: &'a mut TenantScope,
    restore_to: usize,
}

impl Deref for TenantGuard<'_> {
    type Target = TenantScope;

    fn deref(&self) -> &TenantScope {
        self.scope
    }
}

impl DerefMut for TenantGuard<'_> {
    fn deref_mut(&mut self) -> &mut TenantScope {
        self.scope
    }
}

impl Drop for TenantGuard<'_> {
    fn drop(&mut self) {
        self.scope.stack.truncate(self.restore_to);
        tracing::trace!(depth = self.restore_to, "left tenant scope");
    }
}

/// Records that belong to exactly one tenant once tagged.
///
/// Untagged records (`None`) are adopted by the tenant in scope; records
/// already tagged to a different tenant are rejected.
pub trait TenantTagged {
    fn tenant_id(&self) -> Option<TenantId>;

    fn assign_tenant(&mut self, tenant_id: TenantId);
}

/// Tag every untagged record with the active tenant.
///
/// All records are checked before any is modified, so a mismatch leaves the
/// slice untouched. Returns how many records were newly tagged.
pub fn ensure_tenant_id<T: TenantTagged>(scope: &TenantScope, items: &mut [T]) -> DomainResult<usize> {
    let tenant_id = scope.require_tenant()?;

    if let Some(found) = items
        .iter()
        .filter_map(|item| item.tenant_id())
        .find(|found| *found != tenant_id)
    {
        return Err(DomainError::tenant_mismatch(tenant_id, found));
    }

    let mut assigned = 0;
    for item in items.iter_mut().filter(|item| item.tenant_id().is_none()) {
        item.assign_tenant(tenant_id);
        assigned += 1;
    }
    Ok(assigned)
}

/// Pure filter: records tagged with `tenant_id` (untagged records are dropped).
pub fn filter_by_tenant<T: TenantTagged + Clone>(items: &[T], tenant_id: TenantId) -> Vec<T> {
    items
        .iter()
        .filter(|item| item.tenant_id() == Some(tenant_id))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Tagged(Option<TenantId>);

    impl TenantTagged for Tagged {
        fn tenant_id(&self) -> Option<TenantId> {
            self.0
        }

        fn assign_tenant(&mut self, tenant_id: TenantId) {
            self.0 = Some(tenant_id);
        }
    }

    #[test]
    fn require_tenant_fails_without_scope() {
        let scope = TenantScope::new();
        assert_eq!(scope.require_tenant(), Err(DomainError::MissingTenant));
    }

    #[test]
    fn nested_scopes_restore_prior_tenant() {
        let outer_tenant = TenantId::new();
        let inner_tenant = TenantId::new();
        let mut scope = TenantScope::new();

        {
            let mut outer = scope.enter(outer_tenant);
            assert_eq!(outer.current(), Some(outer_tenant));
            {
                let inner = outer.enter(inner_tenant);
                assert_eq!(inner.current(), Some(inner_tenant));
                assert_eq!(inner.depth(), 2);
            }
            assert_eq!(outer.current(), Some(outer_tenant));
        }

        assert_eq!(scope.current(), None);
    }

    #[test]
    fn rooted_scope_survives_nested_entries() {
        let root = TenantId::new();
        let mut scope = TenantScope::for_tenant(root);
        scope.scoped(TenantId::new(), |inner| assert_eq!(inner.depth(), 2));
        assert_eq!(scope.require_tenant(), Ok(root));
    }

    #[test]
    fn scope_is_restored_on_error_return() {
        fn failing(scope: &mut TenantScope, tenant_id: TenantId) -> DomainResult<()> {
            let guard = scope.enter(tenant_id);
            guard.require_tenant()?;
            Err(DomainError::validation("boom"))
        }

        let mut scope = TenantScope::new();
        assert!(failing(&mut scope, TenantId::new()).is_err());
        assert_eq!(scope.depth(), 0);
    }

    #[test]
    fn scope_is_restored_on_panic() {
        let mut scope = TenantScope::new();
        let outer_tenant = TenantId::new();
        let mut outer = scope.enter(outer_tenant);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            outer.scoped(TenantId::new(), |_| panic!("engine blew up"));
        }));

        assert!(result.is_err());
        assert_eq!(outer.current(), Some(outer_tenant));
    }

    #[test]
    fn ensure_tenant_id_tags_untagged_records() {
        let tenant_id = TenantId::new();
        let mut scope = TenantScope::new();
        let guard = scope.enter(tenant_id);

        let mut items = vec![Tagged(None), Tagged(Some(tenant_id)), Tagged(None)];
        let assigned = ensure_tenant_id(&guard, &mut items).unwrap();

        assert_eq!(assigned, 2);
        assert!(items.iter().all(|i| i.0 == Some(tenant_id)));
    }

    #[test]
    fn ensure_tenant_id_rejects_foreign_records_without_mutation() {
        let tenant_id = TenantId::new();
        let other = TenantId::new();
        let mut scope = TenantScope::new();
        let guard = scope.enter(tenant_id);

        let mut items = vec![Tagged(None), Tagged(Some(other))];
        let err = ensure_tenant_id(&guard, &mut items).unwrap_err();

        assert_eq!(err, DomainError::tenant_mismatch(tenant_id, other));
        assert_eq!(items[0], Tagged(None));
    }

    #[test]
    fn filter_by_tenant_keeps_only_matching_records() {
        let a = TenantId::new();
        let b = TenantId::new();
        let items = vec![Tagged(Some(a)), Tagged(Some(b)), Tagged(None), Tagged(Some(a))];

        assert_eq!(filter_by_tenant(&items, a).len(), 2);
        assert_eq!(filter_by_tenant(&items, b), vec![Tagged(Some(b))]);
    }
}
