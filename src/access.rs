//! Login, admin bootstrap and approval gate

use crate::ledger::{audit::events, normalize_email, AuditTrail, Store, StoreError, User};
use log::{info, warn};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("email is required")]
    EmptyEmail,
    #[error("not logged in")]
    UnknownUser,
    #[error("bootstrap key does not match")]
    BadBootstrapKey,
    #[error("administrator privileges required")]
    NotAdmin,
    #[error("approval pending: an administrator must approve this account")]
    NotApproved,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Gatekeeper for identities
#[derive(Clone)]
pub struct AccessControl {
    store: Store,
    audit: AuditTrail,
    admin_email: String,
    bootstrap_key: SecretString,
}

impl AccessControl {
    pub fn new(store: Store, admin_email: &str, bootstrap_key: SecretString) -> Self {
        Self {
            audit: AuditTrail::new(store.clone()),
            store,
            admin_email: normalize_email(admin_email),
            bootstrap_key,
        }
    }

    fn is_configured_admin(&self, email: &str) -> bool {
        !self.admin_email.is_empty() && email == self.admin_email
    }

    /// Register or refresh an identity.
    ///
    /// The configured admin email is approved and promoted on every login.
    /// Other identities are created unapproved and keep their state afterwards.
    pub fn login(&self, email: &str) -> Result<User, AccessError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(AccessError::EmptyEmail);
        }

        let is_admin_login = self.is_configured_admin(&email);
        let user = if is_admin_login {
            self.store.upsert_user(&email, true, true)?
        } else {
            self.store.insert_user_if_absent(&email, false, false)?;
            self.fetch(&email)?
        };

        self.audit.record(
            Some(&email),
            events::LOGIN,
            json!({ "is_admin": is_admin_login, "auto_approved": is_admin_login }),
        );
        info!("login: {} (admin: {})", email, user.is_admin);
        Ok(user)
    }

    /// Promote a logged-in identity to approved admin with the bootstrap key
    pub fn bootstrap_admin(&self, email: &str, key: &str) -> Result<User, AccessError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(AccessError::EmptyEmail);
        }
        self.fetch(&email)?;

        if !constant_time_eq(key.as_bytes(), self.bootstrap_key.expose_secret().as_bytes()) {
            warn!("bootstrap attempt with wrong key by {}", email);
            return Err(AccessError::BadBootstrapKey);
        }

        let user = self.store.upsert_user(&email, true, true)?;
        self.audit
            .record(Some(&email), events::BOOTSTRAP_ADMIN, json!({ "target": email }));
        info!("bootstrap: {} is now an approved admin", email);
        Ok(user)
    }

    /// Approve or revoke `target`. Creates the target if it never logged in.
    pub fn set_approval(&self, actor: &str, target: &str, approved: bool) -> Result<User, AccessError> {
        let actor = self.require_admin(actor)?;
        let target = normalize_email(target);
        if target.is_empty() {
            return Err(AccessError::EmptyEmail);
        }

        let target_is_admin = self.is_configured_admin(&target);
        self.store
            .insert_user_if_absent(&target, approved, target_is_admin)?;
        self.store.set_approval(&target, approved)?;

        self.audit.record(
            Some(&actor.email),
            events::APPROVE,
            json!({ "target": target, "approved": approved }),
        );
        info!("{} set approval of {} to {}", actor.email, target, approved);
        self.fetch(&target)
    }

    /// Every user, admin only
    pub fn list_users(&self, actor: &str) -> Result<Vec<User>, AccessError> {
        self.require_admin(actor)?;
        Ok(self.store.list_users()?)
    }

    /// Look up a logged-in identity
    pub fn current_user(&self, email: &str) -> Result<User, AccessError> {
        self.fetch(&normalize_email(email))
    }

    pub fn require_admin(&self, email: &str) -> Result<User, AccessError> {
        let user = self.current_user(email)?;
        if user.is_admin {
            Ok(user)
        } else {
            Err(AccessError::NotAdmin)
        }
    }

    fn fetch(&self, email: &str) -> Result<User, AccessError> {
        self.store.get_user(email)?.ok_or(AccessError::UnknownUser)
    }
}

/// Admins bypass approval; everyone else must be approved
pub fn require_report_access(user: &User) -> Result<(), AccessError> {
    if user.is_admin || user.approved {
        Ok(())
    } else {
        Err(AccessError::NotApproved)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
