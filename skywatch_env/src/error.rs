//! Error types for the SkyWatch feed layer.

use thiserror::Error;

/// Errors that can occur while fetching or decoding an upstream feed.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Reading the feed source failed (missing file, permissions, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The feed document is not valid JSON for the expected shape
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The provider has nothing to serve (not configured, upstream down)
    #[error("Feed unavailable: {0}")]
    Unavailable(String),
}

impl FeedError {
    /// Creates an unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}
