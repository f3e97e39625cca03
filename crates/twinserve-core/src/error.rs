//! Error types for twinserve. Missing credentials are not an error:
//! provider and vendor constructors return `None` and the affected
//! endpoint reports itself unconfigured.

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors from the completion provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("{0}")]
    Other(String),
}

/// Errors from the speech and video avatar vendors.
#[derive(Debug, thiserror::Error)]
pub enum VendorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Timed out after {0} poll attempts")]
    Timeout(u32),
}

/// Errors from the analytics document store. Read failures are not
/// represented here: a missing or unreadable document bootstraps empty.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to write analytics data: {0}")]
    Write(String),

    #[error("Failed to serialize analytics data: {0}")]
    Serialize(#[from] serde_json::Error),
}
