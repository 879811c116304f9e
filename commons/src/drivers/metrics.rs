//! Metrics driver: evaluates a PromQL instant query per configured app (§4.2).

use super::{DriverFuture, ScrapeRequest, ScrapeResult};
use crate::config::AuthKind;
use crate::status::{AppStatus, Status};
use futures::stream::{self, StreamExt};

pub struct MetricsDriver;

impl super::Driver for MetricsDriver {
    fn scrape(&self, req: ScrapeRequest) -> DriverFuture {
        Box::pin(run(req))
    }
}

async fn run(req: ScrapeRequest) -> ScrapeResult {
    let ScrapeRequest {
        source,
        client,
        max_parallel,
        ..
    } = req;

    let endpoint = format!("{}/api/v1/query", source.url.trim_end_matches('/'));
    let apps = source.apps.clone();
    let max_parallel = max_parallel.max(1);

    let results: Vec<AppStatus> = stream::iter(apps.into_iter())
        .map(|app| {
            let client = client.clone();
            let endpoint = endpoint.clone();
            let auth = source.auth.clone();
            let token = source.token.clone();
            let source_name = source.name.clone();
            let app_labels = app.labels.clone();
            async move {
                let query = app.query.clone().unwrap_or_else(|| format!("up{{app=\"{}\"}}", app.name));
                let status = query_instant(&client, &endpoint, &query, &auth, token.as_deref()).await;
                AppStatus {
                    name: app.name,
                    location: app.location,
                    status,
                    source: source_name,
                    origin_url: String::new(),
                    labels: app_labels,
                }
            }
        })
        .buffer_unordered(max_parallel)
        .collect()
        .await;

    Ok((results, Vec::new()))
}

/// Evaluate one instant query. First sample value `1.0` -> `up`, `0.0` ->
/// `down`; non-2xx or unparseable payload -> `unavailable` (§4.2).
async fn query_instant(
    client: &reqwest::Client,
    endpoint: &str,
    query: &str,
    auth: &AuthKind,
    token: Option<&str>,
) -> Status {
    let mut builder = client.post(endpoint).form(&[("query", query)]);
    builder = apply_auth(builder, auth, token);

    let resp = match builder.send().await {
        Ok(r) => r,
        Err(_) => return Status::Unavailable,
    };
    if !resp.status().is_success() {
        return Status::Unavailable;
    }
    let body: serde_json::Value = match resp.json().await {
        Ok(v) => v,
        Err(_) => return Status::Unavailable,
    };

    let first_value = body
        .get("data")
        .and_then(|d| d.get("result"))
        .and_then(|r| r.as_array())
        .and_then(|arr| arr.first())
        .and_then(|sample| sample.get("value"))
        .and_then(|value| value.as_array())
        .and_then(|pair| pair.get(1))
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<f64>().ok());

    match first_value {
        Some(v) if v == 1.0 => Status::Up,
        Some(v) if v == 0.0 => Status::Down,
        _ => Status::Unavailable,
    }
}

fn apply_auth(builder: reqwest::RequestBuilder, auth: &AuthKind, token: Option<&str>) -> reqwest::RequestBuilder {
    match (auth, token) {
        (AuthKind::Bearer, Some(t)) => builder.bearer_auth(t),
        (AuthKind::Basic, Some(t)) => {
            let mut parts = t.splitn(2, ':');
            let user = parts.next().unwrap_or_default();
            let pass = parts.next();
            builder.basic_auth(user, pass)
        }
        _ => builder,
    }
}
