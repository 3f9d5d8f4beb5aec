use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::browser::SessionError;
use crate::config::TenantSettings;
use crate::types::{ElementProbe, WatchKey};

// ============================================================================
// BROWSER: one isolated session per check
// ============================================================================

/// Opens a fresh, isolated browsing session for a single check. No session
/// or cookie state is ever reused across checks.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    type Session: DomSession + Send;

    /// Launch a session and navigate it to `url`. A partially-opened session
    /// must be torn down before the error is returned.
    async fn open(&self, url: &str) -> Result<Self::Session, SessionError>;
}

/// A live page session owned by exactly one check.
#[async_trait]
pub trait DomSession: Send {
    /// Single non-blocking query: is the element there right now, and if so,
    /// what is its raw text content (or the named attribute's value)?
    async fn probe(
        &self,
        selector: &str,
        attribute: Option<&str>,
    ) -> Result<ElementProbe, SessionError>;

    /// Secondary readiness probe: wait up to `within` for the page's network
    /// activity to settle. `Ok(false)` means the bound elapsed first.
    async fn wait_until_settled(&self, within: Duration) -> Result<bool, SessionError>;

    /// Best-effort lookup of an icon href in the document head.
    async fn discover_icon(&self) -> Result<Option<String>, SessionError>;

    /// Tear the session down. Must be called exactly once per check.
    async fn close(self) -> Result<(), SessionError>;
}

// ============================================================================
// COLLABORATOR SEAMS: settings + durable watch store
// ============================================================================

/// Per-tenant settings lookup, supplied by the settings collaborator.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn settings(&self, tenant_id: &str) -> Result<TenantSettings>;
}

/// The durable watch store. The core performs exactly one kind of mutation:
/// the scoped `active`-flag update applied when a change is confirmed.
#[async_trait]
pub trait WatchStore: Send + Sync {
    /// Set `active` on every stored watch matching the composite key.
    /// Returns the number of rows touched. Idempotent.
    async fn set_active(&self, key: &WatchKey, active: bool) -> Result<u64>;
}
