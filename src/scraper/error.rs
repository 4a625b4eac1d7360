//! Discovery error type. Fatal to a discovery call and reported to the caller as-is.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Invalid URL: {input}: {reason}")]
    MalformedUrl { input: String, reason: String },

    #[error("No chapters found at {url}.")]
    NotFound { url: String },

    #[error("Network error: could not fetch {url}: {source}")]
    NetworkFailure {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl DiscoveryError {
    /// Stable machine-readable kind for error descriptors.
    pub fn kind(&self) -> &'static str {
        match self {
            DiscoveryError::MalformedUrl { .. } => "malformed_url",
            DiscoveryError::NotFound { .. } => "not_found",
            DiscoveryError::NetworkFailure { .. } => "network_failure",
        }
    }

    pub(crate) fn malformed(input: &str, reason: impl Into<String>) -> Self {
        DiscoveryError::MalformedUrl {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn network(url: &str, source: reqwest::Error) -> Self {
        DiscoveryError::NetworkFailure {
            url: url.to_string(),
            source,
        }
    }
}
