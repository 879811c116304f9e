//! End-to-end coverage of the query API and the peer-sync endpoint,
//! wired against a cache seeded directly (no live drivers involved).

use actix_web::{test, web, App};
use availmon::handlers;
use availmon::state::{AppState, LocationRegistry};
use commons::cache::{Cache, ReplaceContext};
use commons::config::ServerSettings;
use commons::status::{AppStatus, Location, Status};
use serde_derive::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Deserialize)]
struct AppsBody {
    apps: Vec<AppStatus>,
}

#[derive(Deserialize)]
struct LocationsBody {
    locations: Vec<Location>,
}

#[derive(Deserialize)]
struct LabelsBody {
    labels: Vec<String>,
}

fn app_status(name: &str, location: &str, status: Status, labels: &[(&str, &str)]) -> AppStatus {
    AppStatus {
        name: name.to_string(),
        location: location.to_string(),
        status,
        source: "probe".to_string(),
        origin_url: "https://self.example".to_string(),
        labels: labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
    }
}

fn server_settings(sync_enable: bool, token: Option<&str>) -> ServerSettings {
    ServerSettings {
        host_url: "https://self.example".to_string(),
        port: 8080,
        sync_enable,
        custom_ca_path: None,
        token: token.map(String::from),
        labels: BTreeMap::new(),
        metrics_auth: commons::config::AuthKind::None,
        trust_proxy_headers: false,
    }
}

fn build_state(server: ServerSettings, locations: Vec<Location>, seed: Vec<AppStatus>) -> Arc<AppState> {
    let cache = Arc::new(Cache::new());
    let empty = BTreeMap::new();
    cache
        .replace(
            "probe",
            seed,
            &ReplaceContext {
                server_host_url: &server.host_url,
                server_labels: &empty,
                source_labels: &empty,
            },
        )
        .unwrap();

    Arc::new(AppState {
        cache,
        locations: Arc::new(LocationRegistry::new(locations)),
        roles: Vec::new(),
        server,
    })
}

#[actix_rt::test]
async fn apps_endpoint_reflects_cache_and_status_filter() {
    let seed = vec![
        app_status("checkout", "us-east", Status::Up, &[("env", "prod")]),
        app_status("billing", "us-east", Status::Down, &[("env", "prod")]),
    ];
    let state = build_state(server_settings(false, None), vec![], seed);

    let mut service = test::init_service(
        App::new()
            .data(state)
            .route("/api/apps", web::get().to(handlers::get_apps)),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/apps?status=up").to_request();
    let resp: AppsBody = test::read_response_json(&mut service, req).await;
    assert_eq!(resp.apps.len(), 1);
    assert_eq!(resp.apps[0].name, "checkout");
}

#[actix_rt::test]
async fn locations_endpoint_applies_rollup_law() {
    let seed = vec![
        app_status("checkout", "us-east", Status::Up, &[]),
        app_status("billing", "us-east", Status::Down, &[]),
    ];
    let locations = vec![Location {
        name: "us-east".to_string(),
        latitude: 40.0,
        longitude: -74.0,
        source: "config".to_string(),
        status: None,
    }];
    let state = build_state(server_settings(false, None), locations, seed);

    let mut service = test::init_service(
        App::new()
            .data(state)
            .route("/api/locations", web::get().to(handlers::get_locations)),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/locations").to_request();
    let resp: LocationsBody = test::read_response_json(&mut service, req).await;
    assert_eq!(resp.locations.len(), 1);
    assert_eq!(resp.locations[0].status, Some(Status::Down));
}

#[actix_rt::test]
async fn labels_endpoint_lists_keys_then_values() {
    let seed = vec![app_status("checkout", "us-east", Status::Up, &[("env", "prod")])];
    let state = build_state(server_settings(false, None), vec![], seed);

    let mut service = test::init_service(
        App::new()
            .data(state)
            .route("/api/labels", web::get().to(handlers::get_labels)),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/labels").to_request();
    let keys: LabelsBody = test::read_response_json(&mut service, req).await;
    assert_eq!(keys.labels, vec!["env".to_string()]);

    let req = test::TestRequest::get().uri("/api/labels?env").to_request();
    let values: LabelsBody = test::read_response_json(&mut service, req).await;
    assert_eq!(values.labels, vec!["prod".to_string()]);
}

#[actix_rt::test]
async fn sync_endpoint_is_forbidden_when_disabled() {
    let state = build_state(server_settings(false, None), vec![], vec![]);

    let mut service =
        test::init_service(App::new().data(state).route("/sync", web::get().to(handlers::get_sync))).await;

    let req = test::TestRequest::get().uri("/sync").to_request();
    let resp = test::call_service(&mut service, req).await;
    assert_eq!(resp.status(), 403);
}

#[actix_rt::test]
async fn sync_endpoint_rejects_missing_signature_then_accepts_a_valid_one() {
    let state = build_state(server_settings(true, Some("shared-secret")), vec![], vec![]);

    let mut service =
        test::init_service(App::new().data(state).route("/sync", web::get().to(handlers::get_sync))).await;

    let req = test::TestRequest::get().uri("/sync").to_request();
    let resp = test::call_service(&mut service, req).await;
    assert_eq!(resp.status(), 401);

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
        .to_string();
    let signature = commons::hmac_auth::sign(b"shared-secret", "GET", "/sync", &now, b"");
    let req = test::TestRequest::get()
        .uri("/sync")
        .header(commons::hmac_auth::HEADER_TIMESTAMP, now)
        .header(commons::hmac_auth::HEADER_SIGNATURE, signature)
        .to_request();
    let resp = test::call_service(&mut service, req).await;
    assert_eq!(resp.status(), 200);
}
