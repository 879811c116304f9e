//! Error kinds shared by the scraper and the query API.

use failure::Fail;

/// Top-level error kind for the availability-monitoring core.
///
/// Variants map 1:1 onto the error-handling design: `ConfigInvalid` is
/// fatal at startup, `ScrapeFailed`/`ScrapeTimeout` are transient and
/// never touch the cache, `ValidationRejected` only drops one app from
/// a batch, and `Unauthorized`/`Forbidden`/`InternalEncode` are HTTP-facing.
#[derive(Debug, Fail)]
pub enum MonitorError {
    #[fail(display = "invalid configuration: {}", _0)]
    ConfigInvalid(String),

    #[fail(display = "scrape failed for source '{}': {}", source, reason)]
    ScrapeFailed { source: String, reason: String },

    #[fail(display = "scrape timed out for source '{}'", source)]
    ScrapeTimeout { source: String },

    #[fail(display = "rejected app '{}' from source '{}': {}", app, source, reason)]
    ValidationRejected {
        source: String,
        app: String,
        reason: String,
    },

    #[fail(display = "unauthorized")]
    Unauthorized,

    #[fail(display = "forbidden")]
    Forbidden,

    #[fail(display = "failed to encode response: {}", _0)]
    InternalEncode(String),
}

impl MonitorError {
    /// HTTP status code this error should be reported as.
    pub fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            MonitorError::ConfigInvalid(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MonitorError::ScrapeFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            MonitorError::ScrapeTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            MonitorError::ValidationRejected { .. } => StatusCode::BAD_REQUEST,
            MonitorError::Unauthorized => StatusCode::UNAUTHORIZED,
            MonitorError::Forbidden => StatusCode::FORBIDDEN,
            MonitorError::InternalEncode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to an HTTP client.
    ///
    /// `Unauthorized`/`Forbidden` deliberately never echo back the
    /// underlying reason (missing header vs. bad signature vs. stale
    /// timestamp), so a client cannot probe which check failed.
    pub fn public_message(&self) -> String {
        match self {
            MonitorError::Unauthorized => "unauthorized".to_string(),
            MonitorError::Forbidden => "forbidden".to_string(),
            other => other.to_string(),
        }
    }
}
