use std::time::Duration;

use tokio::time::Instant;

use crate::traits::DomSession;
use crate::types::ElementProbe;

/// How often the primary wait re-queries the selector.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Bound on the secondary network-settle probe.
pub const SETTLE_WINDOW: Duration = Duration::from_secs(1);

/// Three-way outcome of the readiness race, decided before any result kind
/// is assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// The element appeared within the bound; `content` is its raw text or
    /// attribute value.
    Found { content: Option<String> },
    /// The bound elapsed, but the page then settled: the element is absent
    /// on a fully-loaded page.
    ConfirmedAbsent,
    /// Neither the element appeared nor the page settled. Slow network or a
    /// page that never loaded; try again on the next scheduled check.
    Inconclusive,
}

/// Race "selector appears" against `timeout`, then fall back to a short
/// settle probe to distinguish "page never finished loading" from "page
/// loaded but the element is genuinely gone".
///
/// Probe errors are treated as "not present yet": a page that keeps failing
/// degrades into the timeout path rather than surfacing an infrastructure
/// error to the caller.
pub async fn await_element<S: DomSession>(
    session: &S,
    selector: &str,
    attribute: Option<&str>,
    timeout: Duration,
) -> Readiness {
    let deadline = Instant::now() + timeout;

    loop {
        match session.probe(selector, attribute).await {
            Ok(ElementProbe::Found { content }) => {
                return Readiness::Found { content };
            }
            Ok(ElementProbe::Missing) => {}
            Err(err) => {
                tracing::debug!(selector = %selector, error = %err, "probe failed, retrying");
            }
        }

        let now = Instant::now();
        if now >= deadline {
            break;
        }
        tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
    }

    match session.wait_until_settled(SETTLE_WINDOW).await {
        Ok(true) => Readiness::ConfirmedAbsent,
        Ok(false) => Readiness::Inconclusive,
        Err(err) => {
            tracing::debug!(error = %err, "settle probe failed");
            Readiness::Inconclusive
        }
    }
}
