use prometheus::{HistogramVec, IntCounterVec, IntGauge, IntGaugeVec};

lazy_static::lazy_static! {
    pub(crate) static ref SCRAPE_TOTAL: IntCounterVec = register_int_counter_vec!(
        "availmon_scrape_total",
        "Total number of completed scrapes, by source and result",
        &["source", "result"]
    ).unwrap();

    pub(crate) static ref SCRAPE_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "availmon_scrape_duration_seconds",
        "Duration of a source scrape",
        &["source"]
    ).unwrap();

    pub(crate) static ref CACHE_APPS: IntGaugeVec = register_int_gauge_vec!(
        "availmon_cache_apps",
        "Number of apps currently cached, by origin",
        &["origin"]
    ).unwrap();

    pub(crate) static ref SYNC_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "availmon_sync_requests_total",
        "Total number of incoming /sync requests, by result",
        &["result"]
    ).unwrap();

    // NOTE: alternatively this could come from the runtime library, see
    // https://prometheus.io/docs/instrumenting/writing_clientlibs/#process-metrics
    pub(crate) static ref PROCESS_START_TIME: IntGauge = register_int_gauge!(opts!(
        "process_start_time_seconds",
        "Start time of the process since unix epoch in seconds."
    )).unwrap();
}
