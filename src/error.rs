//! Error types for the collection pipeline.
//!
//! [`PipelineError`] covers the one precondition the normalization core
//! enforces (every bookmark carries a `resolved_id`) plus the failures the
//! surrounding collaborators can hit: file I/O, JSON and YAML decoding,
//! HTTP transport, and the Pocket authorization handshake.
//!
//! Records that merely fail a quality predicate are *not* errors; they are
//! dropped by the filter pipeline and only show up in its stage counts.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for pipeline and collaborator operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A bookmark record arrived without its `resolved_id` key.
    ///
    /// The bookmark service is assumed to always supply one, so this is a
    /// precondition violation and aborts the run rather than producing a
    /// record with a null key.
    #[error("bookmark is missing resolved_id (item_id: {})", item_id.as_deref().unwrap_or("unknown"))]
    MissingResolvedId { item_id: Option<String> },

    /// File system errors from the record store or table writers.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The YAML config file could not be parsed.
    #[error("Config error in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// HTTP request errors from reqwest.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A step of the Pocket OAuth handshake was rejected.
    #[error("Pocket authorization failed at {step}: HTTP {status}")]
    Auth { step: &'static str, status: u16 },

    /// A required credential was neither on the command line, in the
    /// environment, nor in the config file.
    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),
}

/// Result type alias for [`PipelineError`].
pub type Result<T> = std::result::Result<T, PipelineError>;
