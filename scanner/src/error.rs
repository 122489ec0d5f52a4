use std::io;

/// Rejected configuration values. Raised by the validating setters on
/// [`Configuration`](crate::Configuration); the previous value is kept.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("{delay} is not a valid delay. Valid delay is between 1 and 120 (seconds)")]
    DelayOutOfRange { delay: u32 },

    #[error("Timeout of {timeout} is smaller than delay of {delay}")]
    TimeoutBelowDelay { timeout: u64, delay: u32 },

    #[error("Timeout of {timeout} exceeds the maximum of {max} seconds")]
    TimeoutTooLarge { timeout: u64, max: u64 },

    #[error("{search_type} is not a valid search type. Valid search types are: {valid}")]
    UnknownSearchType { search_type: String, valid: String },
}

/// Errors that abort a whole discovery call.
///
/// Per-device problems (unreachable hosts, malformed replies, malformed XML)
/// never show up here; they are logged and counted in
/// [`DiscoveryStats`](crate::DiscoveryStats) instead.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("SSDP transport failed while trying to {context}: {source}")]
    Transport {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Failed to start the fetch runtime: {0}")]
    Runtime(#[source] io::Error),
}

impl ScanError {
    pub(crate) fn transport(context: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| ScanError::Transport { context, source }
    }
}

/// Failure of a single description fetch. Recovered by the fetcher.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP request failed with status: {status}")]
    Status { status: reqwest::StatusCode },
}

/// Failure to turn a fetched body into a device description. Recovered by
/// the normalizer.
#[derive(Debug, thiserror::Error)]
pub enum DescriptionError {
    #[error("Failed to parse device XML: {0}")]
    Xml(#[from] xmltree::ParseError),

    #[error("Cannot derive a base URL from location {location}: {reason}")]
    InvalidLocation { location: String, reason: String },

    #[error("Failed to write device XML: {0}")]
    Write(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;
