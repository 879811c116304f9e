//! Peer driver: fetches another node's `/sync` payload (§4.2, §9).

use super::{DriverFuture, ScrapeRequest, ScrapeResult};
use crate::error::MonitorError;
use crate::hmac_auth;
use crate::status::{normalize_origin_url, AppStatus, Location};
use serde_derive::Deserialize;
use std::time::{SystemTime, UNIX_EPOCH};

pub struct PeerDriver;

impl super::Driver for PeerDriver {
    fn scrape(&self, req: ScrapeRequest) -> DriverFuture {
        Box::pin(run(req))
    }
}

#[derive(Debug, Deserialize)]
struct SyncPayload {
    #[serde(default)]
    locations: Vec<Location>,
    #[serde(default)]
    apps: Vec<AppStatus>,
}

async fn run(req: ScrapeRequest) -> ScrapeResult {
    let ScrapeRequest {
        source,
        client,
        own_locations,
        ..
    } = req;

    let path = "/sync";
    let url = format!("{}{}", source.url.trim_end_matches('/'), path);
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| MonitorError::ScrapeFailed {
            source: source.name.clone(),
            reason: format!("clock error: {}", e),
        })?
        .as_secs()
        .to_string();

    let mut builder = client.get(&url);
    if let Some(secret) = &source.token {
        let signature = hmac_auth::sign(secret.as_bytes(), "GET", path, &timestamp, b"");
        builder = builder
            .header(hmac_auth::HEADER_TIMESTAMP, timestamp)
            .header(hmac_auth::HEADER_SIGNATURE, signature);
    }

    let resp = builder.send().await.map_err(|e| MonitorError::ScrapeFailed {
        source: source.name.clone(),
        reason: e.to_string(),
    })?;
    if !resp.status().is_success() {
        return Err(MonitorError::ScrapeFailed {
            source: source.name.clone(),
            reason: format!("peer returned status {}", resp.status()),
        });
    }
    let payload: SyncPayload = resp.json().await.map_err(|e| MonitorError::ScrapeFailed {
        source: source.name.clone(),
        reason: format!("invalid sync payload: {}", e),
    })?;

    // Loop cut: drop anything the peer is merely relaying from a node we
    // already scrape directly ourselves (§9).
    let directly_scraped: Vec<String> = source
        .directly_scraped_peers
        .iter()
        .filter_map(|u| normalize_origin_url(u))
        .collect();

    let own_origin = normalize_origin_url(&source.url);

    let apps = payload
        .apps
        .into_iter()
        .filter_map(|mut app| {
            let origin = if app.origin_url.trim().is_empty() {
                own_origin.clone().unwrap_or_default()
            } else {
                normalize_origin_url(&app.origin_url).unwrap_or(app.origin_url.clone())
            };
            if directly_scraped.iter().any(|o| o == &origin) {
                return None;
            }
            app.origin_url = origin;
            Some(app)
        })
        .collect();

    // Drop any peer-reported location that collides by name with one this
    // node already has configured; our own config wins (§9).
    let locations = payload
        .locations
        .into_iter()
        .filter(|loc| !own_locations.iter().any(|own| own.name == loc.name))
        .collect();

    Ok((apps, locations))
}
