use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::traits::{BrowserEngine, DomSession};
use crate::types::ElementProbe;

/// Errors from the browser layer. None of these ever escape `observe`:
/// open/wait failures map to the `Timeout` result kind, icon failures are
/// swallowed, and teardown failures are logged.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid browser configuration: {0}")]
    Config(String),

    #[error("failed to launch browser")]
    Launch(#[source] CdpError),

    #[error("failed to navigate to {url}")]
    Navigate {
        url: String,
        #[source]
        source: CdpError,
    },

    #[error("browser evaluation failed")]
    Evaluate(#[source] CdpError),

    #[error("failed to tear down browser session")]
    Teardown(#[source] CdpError),
}

/// Returns the first icon-typed link href in the document head, or null.
const ICON_QUERY: &str = r#"
(() => {
    const link = document.querySelector('head link[rel~="icon"][type^="image/"]');
    return link ? link.getAttribute('href') : null;
})()
"#;

/// Launches one headless Chrome process per check. Each check gets a fresh
/// browser, so no cookies, cache, or session state leak between checks.
#[derive(Debug, Clone, Default)]
pub struct ChromeEngine;

impl ChromeEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrowserEngine for ChromeEngine {
    type Session = ChromeSession;

    async fn open(&self, url: &str) -> Result<ChromeSession, SessionError> {
        let config = BrowserConfig::builder()
            .build()
            .map_err(SessionError::Config)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(SessionError::Launch)?;

        // The handler stream must be driven for the CDP connection to make
        // progress; it ends when the browser shuts down.
        let handler_task = tokio::spawn(async move {
            while handler.next().await.is_some() {}
        });

        match browser.new_page(url).await {
            Ok(page) => Ok(ChromeSession {
                browser,
                page,
                handler_task,
            }),
            Err(err) => {
                // Half-open session: tear down before reporting the failure.
                if let Err(teardown) = browser.close().await {
                    tracing::warn!(error = %teardown, "teardown after failed navigation also failed");
                }
                handler_task.abort();
                Err(SessionError::Navigate {
                    url: url.to_string(),
                    source: err,
                })
            }
        }
    }
}

/// A live Chrome session owned by a single check.
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl DomSession for ChromeSession {
    async fn probe(
        &self,
        selector: &str,
        attribute: Option<&str>,
    ) -> Result<ElementProbe, SessionError> {
        let element = match self.page.find_element(selector).await {
            Ok(element) => element,
            // chromiumoxide reports "no match" as an error; the readiness
            // race keeps polling either way.
            Err(_) => return Ok(ElementProbe::Missing),
        };

        let content = match attribute {
            Some(name) => element
                .attribute(name)
                .await
                .map_err(SessionError::Evaluate)?,
            None => element.inner_text().await.map_err(SessionError::Evaluate)?,
        };

        Ok(ElementProbe::Found { content })
    }

    async fn wait_until_settled(&self, within: Duration) -> Result<bool, SessionError> {
        match tokio::time::timeout(within, self.page.wait_for_navigation()).await {
            Ok(Ok(_)) => Ok(true),
            Ok(Err(err)) => Err(SessionError::Evaluate(err)),
            Err(_) => Ok(false),
        }
    }

    async fn discover_icon(&self) -> Result<Option<String>, SessionError> {
        let evaluated = self
            .page
            .evaluate(ICON_QUERY)
            .await
            .map_err(SessionError::Evaluate)?;
        Ok(evaluated.into_value::<Option<String>>().unwrap_or(None))
    }

    async fn close(mut self) -> Result<(), SessionError> {
        let closed = self.browser.close().await;
        if closed.is_ok() {
            // Reap the Chrome process, but never hang a check on it.
            let _ = tokio::time::timeout(Duration::from_secs(5), self.browser.wait()).await;
        }
        self.handler_task.abort();
        closed.map_err(SessionError::Teardown)?;
        Ok(())
    }
}
