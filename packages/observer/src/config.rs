use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fallback when a tenant has no stored settings row.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Per-tenant settings for checks. Concurrent checks for different tenants
/// may legitimately wait different durations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSettings {
    /// Seconds to wait for the watched element before declaring timeout.
    pub timeout_secs: u64,
}

impl TenantSettings {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// The element-readiness bound as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}
