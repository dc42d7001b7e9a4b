use std::time::Duration;
use thiserror::Error;

/// Failures talking to the rendered page.
#[derive(Debug, Error)]
pub enum DriverError {
    /// No WebDriver server accepted a new session
    #[error("failed to open browser session: {0}")]
    Connect(String),

    /// The browser reported an error while loading the URL
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// The URL did not reach the requested load state in time
    #[error("navigation to {url} timed out after {timeout:?}")]
    NavigationTimeout { url: String, timeout: Duration },

    /// Script evaluation threw or returned something unusable
    #[error("script evaluation failed: {0}")]
    Script(String),

    /// A page operation other than navigation ran out of time
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// The session was already closed
    #[error("browser session is closed")]
    SessionClosed,

    #[error(transparent)]
    WebDriver(#[from] fantoccini::error::CmdError),
}

impl DriverError {
    /// Whether a navigation that failed this way is worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            DriverError::NavigationTimeout { .. } | DriverError::Navigation { .. } => true,
            DriverError::WebDriver(e) => !e.to_string().contains("Unable to find session"),
            DriverError::Connect(_)
            | DriverError::Script(_)
            | DriverError::Timeout { .. }
            | DriverError::SessionClosed => false,
        }
    }
}

/// Problems loading or validating a crawl configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid CSS selector: {0}")]
    InvalidSelector(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Field extraction failures on an already rendered page.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid CSS selector: {0}")]
    InvalidSelector(String),

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

/// Failures writing crawl output.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("output I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),
}
