pub mod browser;
pub mod classifier;
pub mod config;
pub mod readiness;
pub mod scrape;
pub mod storage;
pub mod thumbnail;
pub mod traits;
pub mod types;

// Re-exports for clean API
pub use browser::{ChromeEngine, SessionError};
pub use classifier::classify;
pub use config::TenantSettings;
pub use scrape::observe;
pub use readiness::{Readiness, POLL_INTERVAL, SETTLE_WINDOW};
pub use storage::PostgresStore;
pub use traits::{BrowserEngine, DomSession, SettingsProvider, WatchStore};
pub use types::{ElementProbe, ScrapeResult, ScrapeResultKind, Watch, WatchKey};
