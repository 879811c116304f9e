//! Per-source scrape state machine (§4.3), generalizing the teacher's
//! `Scraper` actor: one actor per configured source, ticking on its own
//! schedule and replacing that source's cache slot on every successful
//! scrape.

use crate::state::{AppState, LocationRegistry};
use actix::prelude::*;
use commons::cache::ReplaceContext;
use commons::config::SourceConfig;
use commons::drivers::{self, Driver};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub struct SourceOrchestrator {
    source: SourceConfig,
    driver: Box<dyn Driver>,
    state: Arc<AppState>,
    client: reqwest::Client,
    interval: Duration,
    timeout: Duration,
    max_parallel: usize,
}

impl SourceOrchestrator {
    pub fn new(
        source: SourceConfig,
        state: Arc<AppState>,
        client: reqwest::Client,
        interval: Duration,
        timeout: Duration,
        max_parallel: usize,
    ) -> Self {
        let driver = drivers::build_driver(source.kind);
        SourceOrchestrator {
            source,
            driver,
            state,
            client,
            interval,
            timeout,
            max_parallel,
        }
    }

    /// Schedule an immediate refresh of the state machine.
    pub fn tick_now(ctx: &mut Context<Self>) {
        ctx.notify(RefreshTick {})
    }

    /// Schedule a delayed refresh of the state machine.
    pub fn tick_later(ctx: &mut Context<Self>, after: Duration) -> actix::SpawnHandle {
        ctx.notify_later(RefreshTick {}, after)
    }
}

impl Actor for SourceOrchestrator {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        // Kick-start the state machine.
        Self::tick_now(ctx);
    }
}

pub(crate) struct RefreshTick {}

impl Message for RefreshTick {
    type Result = Result<(), failure::Error>;
}

impl Handler<RefreshTick> for SourceOrchestrator {
    type Result = ResponseActFuture<Self, Result<(), failure::Error>>;

    fn handle(&mut self, _msg: RefreshTick, _ctx: &mut Self::Context) -> Self::Result {
        let source_name = self.source.name.clone();
        let source_labels = self.source.labels.clone();

        let req = drivers::ScrapeRequest {
            source: self.source.clone(),
            server: self.state.server.clone(),
            timeout: self.timeout,
            max_parallel: self.max_parallel,
            client: self.client.clone(),
            own_locations: self.state.locations.config_locations(),
        };
        let timer = crate::metrics::SCRAPE_DURATION_SECONDS
            .with_label_values(&[&source_name])
            .start_timer();
        let scrape = drivers::with_timeout(source_name.clone(), self.timeout, self.driver.scrape(req));

        let handled = actix::fut::wrap_future::<_, Self>(scrape)
            .map(move |result, actor, _ctx| {
                timer.observe_duration();
                apply_scrape_result(&actor.state, &source_name, &source_labels, result);
            })
            .then(|_res, actor, ctx| {
                let pause = actor.interval;
                Self::tick_later(ctx, pause);
                actix::fut::ok(())
            });

        Box::new(handled)
    }
}

fn apply_scrape_result(
    state: &Arc<AppState>,
    source_name: &str,
    source_labels: &BTreeMap<String, String>,
    result: drivers::ScrapeResult,
) {
    match result {
        Ok((apps, peer_locations)) => {
            let ctx = ReplaceContext {
                server_host_url: &state.server.host_url,
                server_labels: &state.server.labels,
                source_labels,
            };
            match state.cache.replace(source_name, apps, &ctx) {
                Ok(outcome) => {
                    crate::metrics::SCRAPE_TOTAL
                        .with_label_values(&[source_name, "ok"])
                        .inc();
                    log::debug!(
                        "scrape ok for '{}': added={} skipped={} duration_ms={}",
                        source_name,
                        outcome.apps_added,
                        outcome.apps_skipped,
                        outcome.duration_ms
                    );
                }
                Err(e) => {
                    crate::metrics::SCRAPE_TOTAL
                        .with_label_values(&[source_name, "error"])
                        .inc();
                    log::error!("cache replace failed for '{}': {}", source_name, e);
                }
            }
            if !peer_locations.is_empty() {
                let registry: &Arc<LocationRegistry> = &state.locations;
                registry.replace_peer_locations(source_name, peer_locations);
            }
            record_cache_gauges(state);
        }
        Err(e) => {
            crate::metrics::SCRAPE_TOTAL
                .with_label_values(&[source_name, "error"])
                .inc();
            log::warn!("transient scrape failure for '{}': {}", source_name, e);
        }
    }
}

fn record_cache_gauges(state: &Arc<AppState>) {
    let mut counts: BTreeMap<String, i64> = BTreeMap::new();
    for app in state.cache.snapshot() {
        *counts.entry(app.origin_url).or_insert(0) += 1;
    }
    for (origin, count) in counts {
        crate::metrics::CACHE_APPS.with_label_values(&[&origin]).set(count);
    }
}
