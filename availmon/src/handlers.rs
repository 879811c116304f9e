//! HTTP handlers: the query API, the peer-sync endpoint, and the two
//! probe endpoints (§6.4).

use crate::state::AppState;
use actix_web::{web, HttpRequest, HttpResponse};
use commons::authz::Principal;
use commons::error::MonitorError;
use commons::hmac_auth;
use commons::{filter, locations as rollup};
use serde_derive::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Authentication/session handling is an out-of-scope collaborator
/// (§9); every request is treated as the admin principal until that
/// collaborator is wired in.
fn current_principal(_req: &HttpRequest) -> Principal {
    Principal::admin()
}

fn error_response(err: MonitorError) -> HttpResponse {
    HttpResponse::build(err.status_code()).json(ErrorBody {
        error: err.public_message(),
    })
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

pub async fn get_apps(req: HttpRequest, state: web::Data<Arc<AppState>>) -> HttpResponse {
    let principal = current_principal(&req);
    let filters = filter::parse(req.query_string());
    for warning in &filters.warnings {
        log::warn!("query filter warning: {}", warning);
    }

    let snapshot = state.cache.snapshot();
    let filtered = state
        .cache
        .with_index(|index| filter::evaluate(&snapshot, index, &filters));
    let visible = commons::authz::filter_apps(&principal, &filtered);
    HttpResponse::Ok().json(AppsBody { apps: visible })
}

#[derive(Serialize)]
struct AppsBody {
    apps: Vec<commons::status::AppStatus>,
}

pub async fn get_locations(req: HttpRequest, state: web::Data<Arc<AppState>>) -> HttpResponse {
    let principal = current_principal(&req);
    let filters = filter::parse(req.query_string());
    let filter_active = !filters.is_empty();

    let snapshot = state.cache.snapshot();
    let filtered = state
        .cache
        .with_index(|index| filter::evaluate(&snapshot, index, &filters));
    let visible = commons::authz::filter_apps(&principal, &filtered);

    let all_locations = state.locations.snapshot();
    let rolled_up = rollup::aggregate(&all_locations, &visible, filter_active);
    HttpResponse::Ok().json(LocationsBody { locations: rolled_up })
}

#[derive(Serialize)]
struct LocationsBody {
    locations: Vec<commons::status::Location>,
}

/// The bare query-param *name* (not a `key=` field) selects the labels
/// mode: no params lists every key, the first param's name lists that
/// key's values (§6, S4 -- `GET /api/labels?env` lists `env`'s values).
fn requested_label_key(req: &HttpRequest) -> Option<String> {
    url::form_urlencoded::parse(req.query_string().as_bytes())
        .next()
        .map(|(key, _value)| key.into_owned())
}

pub async fn get_labels(req: HttpRequest, state: web::Data<Arc<AppState>>) -> HttpResponse {
    let principal = current_principal(&req);
    let snapshot = commons::authz::filter_apps(&principal, &state.cache.snapshot());

    match requested_label_key(&req) {
        None => {
            let keys: std::collections::BTreeSet<String> = snapshot
                .iter()
                .flat_map(|app| app.labels.keys().cloned())
                .collect();
            let keys = commons::authz::filter_label_keys(&principal, keys);
            HttpResponse::Ok().json(LabelsBody { labels: keys })
        }
        Some(key) => {
            let values: std::collections::BTreeSet<String> = snapshot
                .iter()
                .filter_map(|app| app.labels.get(&key).cloned())
                .collect();
            let values = commons::authz::filter_label_values(&principal, &key, values);
            HttpResponse::Ok().json(LabelsBody { labels: values })
        }
    }
}

#[derive(Serialize)]
struct LabelsBody {
    labels: std::collections::BTreeSet<String>,
}

/// Peer-sync endpoint: every app and location this node currently knows
/// about, signed the same way the peer driver expects to verify (§4.1, §4.2).
pub async fn get_sync(req: HttpRequest, state: web::Data<Arc<AppState>>) -> HttpResponse {
    if !state.server.sync_enable {
        crate::metrics::SYNC_REQUESTS_TOTAL.with_label_values(&["disabled"]).inc();
        return error_response(MonitorError::Forbidden);
    }

    if let Some(secret) = &state.server.token {
        let timestamp = req
            .headers()
            .get(hmac_auth::HEADER_TIMESTAMP)
            .and_then(|v| v.to_str().ok());
        let signature = req
            .headers()
            .get(hmac_auth::HEADER_SIGNATURE)
            .and_then(|v| v.to_str().ok());
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        if let Err(_failure) = hmac_auth::verify(secret.as_bytes(), "GET", "/sync", timestamp, signature, b"", now) {
            crate::metrics::SYNC_REQUESTS_TOTAL.with_label_values(&["unauthorized"]).inc();
            return error_response(MonitorError::Unauthorized);
        }
    }

    crate::metrics::SYNC_REQUESTS_TOTAL.with_label_values(&["ok"]).inc();
    let filters = filter::parse(req.query_string());
    let snapshot = state.cache.snapshot();
    let apps = state
        .cache
        .with_index(|index| filter::evaluate(&snapshot, index, &filters));
    let body = SyncBody {
        locations: state.locations.snapshot(),
        apps,
    };
    HttpResponse::Ok().json(body)
}

#[derive(Serialize)]
struct SyncBody {
    locations: Vec<commons::status::Location>,
    apps: Vec<commons::status::AppStatus>,
}

pub async fn healthz() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}

/// Ready once at least one scrape has populated the cache.
pub async fn readyz(state: web::Data<Arc<AppState>>) -> HttpResponse {
    if state.cache.is_empty() {
        HttpResponse::ServiceUnavailable().finish()
    } else {
        HttpResponse::Ok().finish()
    }
}
