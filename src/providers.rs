//! Credential and tenant collaborators
//!
//! The session never obtains tokens or picks tenants itself. It asks these
//! providers synchronously each time it builds a [`SessionTarget`], so a
//! token refresh or tenant switch is picked up by the next connection built.
//!
//! Providers are read while the session holds its registry lock. They must
//! return promptly and must not call back into the session.
//!
//! [`SessionTarget`]: crate::protocol::SessionTarget

use crate::config::default_tenant_id;
use std::sync::RwLock;

/// Source of bearer tokens
pub trait CredentialProvider: Send + Sync {
    /// Token to present in the `Authorization` header
    fn current_access_token(&self) -> String;

    /// Whether a usable credential is available
    fn is_authenticated(&self) -> bool;
}

/// Source of the tenant routing key
pub trait TenantProvider: Send + Sync {
    fn current_tenant_id(&self) -> String;
}

/// In-memory credential holder, updated by whatever performs the login flow
#[derive(Debug, Default)]
pub struct StaticCredentials {
    token: RwLock<Option<String>>,
}

impl StaticCredentials {
    pub fn new<S: Into<String>>(token: S) -> Self {
        let token = token.into();
        Self {
            token: RwLock::new((!token.is_empty()).then_some(token)),
        }
    }

    /// Credentials with no token; `is_authenticated` reports false
    pub fn unauthenticated() -> Self {
        Self::default()
    }

    pub fn set_token<S: Into<String>>(&self, token: S) {
        let token = token.into();
        let mut guard = self.token.write().unwrap_or_else(|e| e.into_inner());
        *guard = (!token.is_empty()).then_some(token);
    }

    /// Forget the token, e.g. on logout
    pub fn clear(&self) {
        let mut guard = self.token.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }
}

impl CredentialProvider for StaticCredentials {
    fn current_access_token(&self) -> String {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .unwrap_or_default()
    }

    fn is_authenticated(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

/// Reads the token from an environment variable on every call
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    var_name: String,
}

impl EnvCredentials {
    pub fn new<S: Into<String>>(var_name: S) -> Self {
        Self {
            var_name: var_name.into(),
        }
    }

    pub fn var_name(&self) -> &str {
        &self.var_name
    }

    fn read(&self) -> Option<String> {
        std::env::var(&self.var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

impl CredentialProvider for EnvCredentials {
    fn current_access_token(&self) -> String {
        self.read().unwrap_or_default()
    }

    fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }
}

/// Currently selected tenant, `"default"` until one is chosen
#[derive(Debug)]
pub struct TenantContext {
    tenant_id: RwLock<String>,
}

impl TenantContext {
    pub fn new<S: Into<String>>(tenant_id: S) -> Self {
        Self {
            tenant_id: RwLock::new(tenant_id.into()),
        }
    }

    pub fn set_tenant_id<S: Into<String>>(&self, tenant_id: S) {
        let mut guard = self.tenant_id.write().unwrap_or_else(|e| e.into_inner());
        *guard = tenant_id.into();
    }

    pub fn is_default_tenant(&self) -> bool {
        self.current_tenant_id() == default_tenant_id()
    }
}

impl Default for TenantContext {
    fn default() -> Self {
        Self::new(default_tenant_id())
    }
}

impl TenantProvider for TenantContext {
    fn current_tenant_id(&self) -> String {
        self.tenant_id
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
