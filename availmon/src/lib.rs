#[macro_use]
extern crate log;
#[macro_use]
extern crate prometheus;

pub mod cli;
pub mod handlers;
pub mod metrics;
pub mod orchestrator;
pub mod state;

use actix::prelude::*;
use actix_web::{web, App, HttpServer};
use clap::{crate_name, crate_version, Parser};
use commons::authz::Role;
use commons::cache::Cache;
use commons::tls::TlsPool;
use failure::{Fallible, ResultExt};
use state::{AppState, LocationRegistry};
use std::sync::Arc;

/// Top-level log target for this application.
static APP_LOG_TARGET: &str = "availmon";

pub fn run() -> Fallible<()> {
    let cli_opts = cli::CliOptions::parse();

    env_logger::Builder::from_default_env()
        .format_timestamp_secs()
        .format_module_path(false)
        .filter(Some(APP_LOG_TARGET), cli_opts.loglevel())
        .try_init()
        .context("failed to initialize logging")?;

    let config = commons::config::load(&cli_opts.config_path, cli_opts.credentials_path.as_ref())
        .context("failed to load configuration")?;

    let sys = actix::System::new("availmon");

    let tls_pool = Arc::new(
        TlsPool::new(config.server.custom_ca_path.as_deref(), config.scraping.timeout)
            .context("failed to build TLS trust pool")?,
    );

    let cache = Arc::new(Cache::new());
    let location_registry = Arc::new(LocationRegistry::new(config.locations.clone()));
    let roles: Vec<Role> = config.roles.clone();

    let app_state = Arc::new(AppState {
        cache: Arc::clone(&cache),
        locations: Arc::clone(&location_registry),
        roles,
        server: config.server.clone(),
    });

    for source in &config.sources {
        let client = tls_pool
            .client_for(source.custom_ca_path.as_deref())
            .context("failed to build scrape client")?;
        let state_for_source = Arc::clone(&app_state);
        let source = source.clone();
        let interval = config.scraping.interval;
        let timeout = source.timeout;
        let max_parallel = config.scraping.max_parallel;
        orchestrator::SourceOrchestrator::new(source, state_for_source, client, interval, timeout, max_parallel)
            .start();
    }

    metrics::PROCESS_START_TIME.set(chrono::Utc::now().timestamp());
    info!("starting server ({} {})", crate_name!(), crate_version!());

    let main_socket = std::net::SocketAddr::new(std::net::Ipv4Addr::UNSPECIFIED.into(), config.server.port);
    debug!("main service address: {}", main_socket);

    let origin_allowlist: Option<Vec<String>> = None;
    let http_state = Arc::clone(&app_state);
    HttpServer::new(move || {
        App::new()
            .wrap(commons::web::build_cors_middleware(&origin_allowlist))
            .data(Arc::clone(&http_state))
            .route("/api/apps", web::get().to(handlers::get_apps))
            .route("/api/locations", web::get().to(handlers::get_locations))
            .route("/api/labels", web::get().to(handlers::get_labels))
            .route("/sync", web::get().to(handlers::get_sync))
            .route("/metrics", web::get().to(commons::metrics::serve_metrics))
            .route("/healthz", web::get().to(handlers::healthz))
            .route("/readyz", web::get().to(handlers::readyz))
    })
    .bind(main_socket)?
    .run();

    sys.run()?;
    Ok(())
}
