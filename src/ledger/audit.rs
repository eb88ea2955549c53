//! Best-effort audit trail
//!
//! Recording never fails from the caller's point of view: a write error is
//! logged and dropped so the primary action is unaffected.

use super::store::Store;
use log::warn;
use serde_json::Value;

/// Audit event names
pub mod events {
    pub const LOGIN: &str = "login";
    pub const BOOTSTRAP_ADMIN: &str = "bootstrap_admin";
    pub const APPROVE: &str = "approve";
    pub const NARRATIVE_OK: &str = "narrative_ok";
    pub const NARRATIVE_FAIL: &str = "narrative_fail";
    pub const USAGE_FAIL: &str = "usage_fail";
    pub const RENDER_OK: &str = "render_ok";
    pub const RENDER_FAIL: &str = "render_fail";
}

#[derive(Clone)]
pub struct AuditTrail {
    store: Store,
}

impl AuditTrail {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn record(&self, email: Option<&str>, event_type: &str, detail: Value) {
        if let Err(e) = self.store.insert_audit(email, event_type, &detail) {
            warn!("audit write '{}' dropped: {}", event_type, e);
        }
    }
}
