//! Error types for the campaign engine.

use std::path::PathBuf;

/// Top-level error type for a campaign run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Contact list error: {0}")]
    Contacts(#[from] ContactsError),

    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Send error: {0}")]
    Send(#[from] SendError),

    #[error("Reply lookup error: {0}")]
    Reply(#[from] ReplyError),
}

/// Contact list import errors.
#[derive(Debug, thiserror::Error)]
pub enum ContactsError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Contact record store errors.
///
/// `Corrupt` is fatal for the whole run: a state file that exists but does
/// not parse must never be silently replaced with a fresh one.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("State file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error on state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Message template rendering errors.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Unresolved placeholder {{{placeholder}}}")]
    Unresolved { placeholder: String },
}

/// Outbound send errors.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("Send command failed: {reason}")]
    Failed { reason: String },

    #[error("Could not launch send command: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Inbound reply lookup errors.
#[derive(Debug, thiserror::Error)]
pub enum ReplyError {
    #[error("Reply lookup unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Reply lookup query failed: {reason}")]
    Query { reason: String },
}

/// Result type alias for the campaign engine.
pub type Result<T> = std::result::Result<T, Error>;
