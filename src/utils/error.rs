//! The `error` module defines the error type shared by the fallible parts of
//! `popfeed`: catalog loading, configuration, rendering and publishing.
//!
//! The subscription registry and the cursor service never return errors.
//! Their recoverable conditions are reported through return values and logs.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to read template catalog {path}: {source}")]
    CatalogIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template catalog {path} is malformed: {source}")]
    CatalogFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to publish to {channel}: {reason}")]
    Publish { channel: String, reason: String },

    #[error("render error: {0}")]
    Render(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, FeedError>;
