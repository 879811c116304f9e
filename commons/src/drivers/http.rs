//! HTTP driver: probes a plain URL per configured app (§4.2).

use super::{DriverFuture, ScrapeRequest, ScrapeResult};
use crate::status::{AppStatus, Status};
use futures::stream::{self, StreamExt};

pub struct HttpDriver;

impl super::Driver for HttpDriver {
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

    let apps = source.apps.clone();
    let max_parallel = max_parallel.max(1);
    let source_url = source.url.clone();

    let results: Vec<AppStatus> = stream::iter(apps.into_iter())
        .map(|app| {
            let client = client.clone();
            let source_name = source.name.clone();
            let default_url = source_url.clone();
            async move {
                let url = app.url.clone().unwrap_or(default_url);
                let status = probe(&client, &url).await;
                AppStatus {
                    name: app.name,
                    location: app.location,
                    status,
                    source: source_name,
                    origin_url: String::new(),
                    labels: app.labels,
                }
            }
        })
        .buffer_unordered(max_parallel)
        .collect()
        .await;

    Ok((results, Vec::new()))
}

/// 2xx -> up, any other response reached -> down, unreachable/timeout ->
/// unavailable (§4.2).
async fn probe(client: &reqwest::Client, url: &str) -> Status {
    match client.get(url).send().await {
        Ok(resp) if resp.status().is_success() => Status::Up,
        Ok(_) => Status::Down,
        Err(_) => Status::Unavailable,
    }
}
