use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Composite identity of a watch: tenant, owner within the tenant, and the
/// owner-chosen name. All persisted updates are scoped by the full key so
/// watches sharing a name across owners or tenants never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WatchKey {
    pub tenant_id: String,
    pub owner_id: String,
    pub name: String,
}

impl WatchKey {
    pub fn new(
        tenant_id: impl Into<String>,
        owner_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            owner_id: owner_id.into(),
            name: name.into(),
        }
    }
}

/// A persisted specification of a page, selector, and baseline text to
/// monitor for change. Supplied by the command/scheduler collaborators;
/// the core only ever mutates `thumbnail` (opportunistic icon discovery)
/// and, indirectly, the stored `active` flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watch {
    pub key: WatchKey,
    pub url: String,
    pub css_selector: String,
    /// Attribute to read instead of the element's text content.
    pub dom_element_property: Option<String>,
    /// Last-known normalized text, the comparison baseline. May be empty.
    pub current_text: String,
    pub thumbnail: Option<String>,
    /// Desired persisted state once a change is confirmed.
    pub keep_active: bool,
}

/// Outcome of a single non-blocking DOM query for the watched element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementProbe {
    /// The selector matched nothing (yet).
    Missing,
    /// The element exists; `content` is its raw text or attribute value.
    Found { content: Option<String> },
}

/// Five-way classification of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrapeResultKind {
    NoChange,
    Change,
    TextNotFound,
    ElementNotFound,
    Timeout,
}

/// Terminal outcome of one check. Constructed exactly once, at the terminal
/// branch of classification, and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResult {
    watch: Watch,
    kind: ScrapeResultKind,
    checked_at: DateTime<Utc>,
}

impl ScrapeResult {
    pub fn new(watch: Watch, kind: ScrapeResultKind) -> Self {
        Self {
            watch,
            kind,
            checked_at: Utc::now(),
        }
    }

    pub fn watch(&self) -> &Watch {
        &self.watch
    }

    pub fn kind(&self) -> ScrapeResultKind {
        self.kind
    }

    pub fn checked_at(&self) -> DateTime<Utc> {
        self.checked_at
    }
}
