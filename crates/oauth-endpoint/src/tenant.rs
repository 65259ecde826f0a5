//! Request-scoped tenant context with guaranteed release.
//!
//! The login redirect embeds the tenant the flow belongs to. The tenant id
//! is set by whatever handled the inbound request and must not outlive it:
//! a tenant id leaking into another request is a cross-tenant isolation
//! bug. Each request therefore carries its own [`ScopedTenant`] and passes
//! it into every builder call, and the builders clear it on every exit
//! path, including errors, via [`TenantClearGuard`]. Contexts are never
//! shared between in-flight requests.

use std::sync::RwLock;

/// Tenant id used when no tenant context has been established.
pub const DEFAULT_TENANT_ID: &str = "-1234";

/// "Current tenant" of the request being handled.
///
/// Passed into each builder call so tests can observe the clear-on-exit
/// contract with a double.
pub trait TenantContext: Send + Sync {
    fn tenant_id(&self) -> Option<String>;
    fn set(&self, tenant_id: &str);
    fn clear(&self);
}

/// Single-request implementation; handlers construct one per request.
#[derive(Default)]
pub struct ScopedTenant {
    current: RwLock<Option<String>>,
}

impl ScopedTenant {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TenantContext for ScopedTenant {
    fn tenant_id(&self) -> Option<String> {
        self.current.read().unwrap().clone()
    }

    fn set(&self, tenant_id: &str) {
        *self.current.write().unwrap() = Some(tenant_id.to_string());
    }

    fn clear(&self) {
        *self.current.write().unwrap() = None;
    }
}

/// Clears the tenant context when dropped, so early returns and error paths
/// release it too.
pub struct TenantClearGuard<'a> {
    context: &'a dyn TenantContext,
}

impl<'a> TenantClearGuard<'a> {
    pub fn new(context: &'a dyn TenantContext) -> Self {
        Self { context }
    }

    pub fn tenant_id(&self) -> Option<String> {
        self.context.tenant_id()
    }
}

impl Drop for TenantClearGuard<'_> {
    fn drop(&mut self) {
        self.context.clear();
    }
}
