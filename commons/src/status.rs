//! Core data model: `AppStatus`, `Location` and the enums/helpers they share.

use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum length an app name is truncated to (§3 Data Model).
pub const MAX_NAME_LEN: usize = 255;

/// Up/down/unavailable status of one application, as observed by one source.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Up,
    Down,
    Unavailable,
}

impl Status {
    /// All statuses, in a stable order, used to build rollups and index keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Up => "up",
            Status::Down => "down",
            Status::Unavailable => "unavailable",
        }
    }
}

impl<'de> serde::Deserialize<'de> for Status {
    /// Unknown upstream status strings coerce to `Unavailable` rather than
    /// failing deserialization (§9: "this spec coerces to unavailable").
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Status::from_str_lossy(&raw))
    }
}

impl Status {
    pub fn from_str_lossy(raw: &str) -> Status {
        match raw.to_ascii_lowercase().as_str() {
            "up" => Status::Up,
            "down" => Status::Down,
            _ => Status::Unavailable,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation of one application at one moment (§3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppStatus {
    pub name: String,
    pub location: String,
    pub status: Status,
    pub source: String,
    pub origin_url: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl AppStatus {
    /// App-id used as the label-index's value type: `"<source>:<name>"` (§4.5).
    pub fn app_id(&self) -> String {
        format!("{}:{}", self.source, self.name)
    }
}

/// A geographic point, optionally carrying a rollup status (§3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub status: Option<Status>,
}

impl Location {
    pub fn validate_bounds(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Normalize a URL per §3/§8-S6: lowercase scheme and host, strip the
/// default port for the scheme, strip a bare trailing `/` on the root path.
pub fn normalize_origin_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut url = reqwest::Url::parse(trimmed).ok()?;

    let scheme = url.scheme().to_ascii_lowercase();
    url.set_scheme(&scheme).ok()?;

    if let Some(host) = url.host_str() {
        let lowered = host.to_ascii_lowercase();
        url.set_host(Some(&lowered)).ok()?;
    }

    let is_default_port = match (scheme.as_str(), url.port()) {
        ("http", Some(80)) => true,
        ("https", Some(443)) => true,
        _ => false,
    };
    if is_default_port {
        url.set_port(None).ok()?;
    }

    if url.path() == "/" {
        url.set_path("");
    }

    Some(url.as_str().trim_end_matches('/').to_string())
}

/// Merge labels with later maps winning: `app ⊕ source ⊕ server`,
/// implemented as three passes over a fresh map (§9 "Label merge precedence").
pub fn merge_labels(
    server: &BTreeMap<String, String>,
    source: &BTreeMap<String, String>,
    app: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = BTreeMap::new();
    for (k, v) in server {
        merged.insert(k.clone(), v.clone());
    }
    for (k, v) in source {
        merged.insert(k.clone(), v.clone());
    }
    for (k, v) in app {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_unknown_status_to_unavailable() {
        assert_eq!(Status::from_str_lossy("up"), Status::Up);
        assert_eq!(Status::from_str_lossy("DOWN"), Status::Down);
        assert_eq!(Status::from_str_lossy("flaky"), Status::Unavailable);
    }

    #[test]
    fn normalizes_scheme_host_port_and_root_path() {
        let a = normalize_origin_url("HTTPS://Host:443/").unwrap();
        let b = normalize_origin_url("https://host/").unwrap();
        let c = normalize_origin_url("https://host").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn rejects_empty_origin() {
        assert_eq!(normalize_origin_url(""), None);
        assert_eq!(normalize_origin_url("   "), None);
    }

    #[test]
    fn label_merge_precedence_is_app_over_source_over_server() {
        let server = maplit::btreemap! { "env".to_string() => "server".to_string(), "z".to_string() => "z".to_string() };
        let source = maplit::btreemap! { "env".to_string() => "source".to_string() };
        let app = maplit::btreemap! { "env".to_string() => "app".to_string() };
        let merged = merge_labels(&server, &source, &app);
        assert_eq!(merged.get("env"), Some(&"app".to_string()));
        assert_eq!(merged.get("z"), Some(&"z".to_string()));
    }
}
