//! Source driver contract and registry (§4.2).

pub mod http;
pub mod metrics;
pub mod peer;

use crate::config::{ServerSettings, SourceConfig, SourceKind};
use crate::error::MonitorError;
use crate::status::{AppStatus, Location};
use futures::future::{self, Future};
use std::pin::Pin;
use std::time::Duration;

/// Everything one `scrape()` call needs. All fields are owned so the
/// returned future can be `'static` (the teacher's `fetch_releases`
/// clones for the same reason -- "to keep the async closure 'static").
pub struct ScrapeRequest {
    pub source: SourceConfig,
    pub server: ServerSettings,
    pub timeout: Duration,
    pub max_parallel: usize,
    pub client: reqwest::Client,
    /// This node's own configured locations, needed only by the peer
    /// driver to drop name-colliding incoming locations (§4.2, §9).
    pub own_locations: Vec<Location>,
}

pub type ScrapeResult = Result<(Vec<AppStatus>, Vec<Location>), MonitorError>;
pub type DriverFuture = Pin<Box<dyn Future<Output = ScrapeResult> + Send>>;

/// Common contract every source kind implements. On any error, drivers
/// must return `Err` rather than a partial result so the orchestrator
/// treats the scrape as failed without touching the cache (§4.2).
pub trait Driver: Send + Sync {
    fn scrape(&self, req: ScrapeRequest) -> DriverFuture;
}

/// Build the driver for one configured source kind.
///
/// Unknown kinds are already filtered out with a warning during config
/// validation (§4.2), so this always succeeds for a `SourceConfig` that
/// made it through `config::load`.
pub fn build_driver(kind: SourceKind) -> Box<dyn Driver> {
    match kind {
        SourceKind::Metrics => Box::new(metrics::MetricsDriver),
        SourceKind::Http => Box::new(http::HttpDriver),
        SourceKind::Peer => Box::new(peer::PeerDriver),
    }
}

/// Run a scrape future under the source's configured timeout, mapping a
/// timeout into `MonitorError::ScrapeTimeout` (§4.2, §7).
pub fn with_timeout(source_name: String, timeout: Duration, fut: DriverFuture) -> DriverFuture {
    Box::pin(async move {
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(MonitorError::ScrapeTimeout { source: source_name }),
        }
    })
}

/// Helper for drivers with nothing to do (e.g. an app list with zero
/// entries): resolves immediately to an empty, successful scrape.
pub fn empty_ok() -> DriverFuture {
    Box::pin(future::ready(Ok((Vec::new(), Vec::new()))))
}
