//! Three-level status cache: `cache[origin_url][source_name][app_name]` (§4.4).

use crate::error::MonitorError;
use crate::index::LabelIndex;
use crate::status::{self, AppStatus, Status};
use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::Instant;

/// Inputs a `Replace` needs beyond the raw scraped apps: the labels to
/// merge in and the server's own `host_url` (§4.4 step 1).
pub struct ReplaceContext<'a> {
    pub server_host_url: &'a str,
    pub server_labels: &'a BTreeMap<String, String>,
    pub source_labels: &'a BTreeMap<String, String>,
}

/// Per-batch counters recorded by `Replace` (§4.4 step 7). The caller
/// (the scrape orchestrator) folds these into its own Prometheus metrics;
/// the cache itself stays policy-free and metrics-unaware.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplaceOutcome {
    pub apps_added: usize,
    pub apps_skipped: usize,
    pub duration_ms: u64,
}

type OriginMap = BTreeMap<String, BTreeMap<String, BTreeMap<String, AppStatus>>>;

struct CacheInner {
    origins: OriginMap,
    index: LabelIndex,
}

/// Status cache plus its label index, behind a single reader-writer lock.
///
/// Writes are per-scrape batches and short; no lock is ever held across
/// driver I/O (§5). The index is rebuilt synchronously inside the write
/// critical section so readers never observe cache/index disagreement.
pub struct Cache {
    inner: RwLock<CacheInner>,
}

impl Default for Cache {
    fn default() -> Self {
        Cache {
            inner: RwLock::new(CacheInner {
                origins: BTreeMap::new(),
                index: LabelIndex::new(),
            }),
        }
    }
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the `(origin, source)` slot(s) touched by one scrape batch.
    ///
    /// Per-app validation drops bad entries (counted as skipped) rather
    /// than failing the whole batch. An empty `apps` list removes
    /// `source_name` from every origin bucket (§4.4 step 5).
    pub fn replace(
        &self,
        source_name: &str,
        apps: Vec<AppStatus>,
        ctx: &ReplaceContext,
    ) -> Result<ReplaceOutcome, MonitorError> {
        let started = Instant::now();
        if ctx.server_host_url.trim().is_empty() {
            return Err(MonitorError::ConfigInvalid(
                "server host_url must not be empty".to_string(),
            ));
        }

        let mut outcome = ReplaceOutcome::default();
        // Group accepted, validated apps by normalized origin (§4.4 step 2-3).
        let mut by_origin: BTreeMap<String, BTreeMap<String, AppStatus>> = BTreeMap::new();
        for mut app in apps {
            if app.name.trim().is_empty()
                || app.location.trim().is_empty()
                || app.origin_url.trim().is_empty()
            {
                outcome.apps_skipped += 1;
                continue;
            }
            let normalized_origin = match status::normalize_origin_url(&app.origin_url) {
                Some(o) => o,
                None => {
                    outcome.apps_skipped += 1;
                    continue;
                }
            };
            if app.name.len() > status::MAX_NAME_LEN {
                app.name.truncate(status::MAX_NAME_LEN);
            }
            app.labels = status::merge_labels(ctx.server_labels, ctx.source_labels, &app.labels);
            app.origin_url = normalized_origin.clone();

            by_origin
                .entry(normalized_origin)
                .or_insert_with(BTreeMap::new)
                .insert(app.name.clone(), app);
            outcome.apps_added += 1;
        }

        let mut guard = self.inner.write().expect("cache lock poisoned");
        if by_origin.is_empty() {
            // Empty scrape result: remove this source from every origin,
            // then drop any origin left with no sources (§4.4 step 5).
            guard.origins.retain(|_origin, sources| {
                sources.remove(source_name);
                !sources.is_empty()
            });
        } else {
            for (origin, apps_by_name) in by_origin {
                guard
                    .origins
                    .entry(origin)
                    .or_insert_with(BTreeMap::new)
                    .insert(source_name.to_string(), apps_by_name);
            }
        }

        let snapshot = Self::flatten(&guard.origins);
        guard.index = LabelIndex::rebuild(&snapshot);

        outcome.duration_ms = started.elapsed().as_millis() as u64;
        Ok(outcome)
    }

    fn flatten(origins: &OriginMap) -> Vec<AppStatus> {
        origins
            .values()
            .flat_map(|sources| sources.values())
            .flat_map(|apps| apps.values().cloned())
            .collect()
    }

    /// A value-copy snapshot of every app currently cached. Callers cannot
    /// mutate the cache through it.
    pub fn snapshot(&self) -> Vec<AppStatus> {
        let guard = self.inner.read().expect("cache lock poisoned");
        Self::flatten(&guard.origins)
    }

    /// Snapshot of apps cached for one `(origin, source)` slot, used by tests
    /// and by the sync endpoint's "is this origin already known" checks.
    pub fn slot(&self, origin_url: &str, source_name: &str) -> Vec<AppStatus> {
        let guard = self.inner.read().expect("cache lock poisoned");
        guard
            .origins
            .get(origin_url)
            .and_then(|sources| sources.get(source_name))
            .map(|apps| apps.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        let guard = self.inner.read().expect("cache lock poisoned");
        guard.origins.is_empty()
    }

    /// Run a closure against the current label index, e.g. for a filtered
    /// lookup, without exposing the lock guard's lifetime to the caller.
    pub fn with_index<T>(&self, f: impl FnOnce(&LabelIndex) -> T) -> T {
        let guard = self.inner.read().expect("cache lock poisoned");
        f(&guard.index)
    }
}

/// Coerce an app's status before it ever reaches the cache. Exposed so
/// drivers can normalize values they parse from upstream responses.
pub fn coerce_status(raw: &str) -> Status {
    Status::from_str_lossy(raw)
}
