//! Error types for the sync engine

use std::path::PathBuf;
use thiserror::Error;

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Sync engine errors
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("invalid NSID syntax: {0}")]
    InvalidNsid(String),

    #[error("not an NSID group pattern: {0}")]
    InvalidGroupPattern(String),

    #[error("invalid lexicon NSID pattern: {0}")]
    InvalidPattern(String),

    #[error("invalid DID syntax: {0}")]
    InvalidDid(String),

    #[error("NSID did not resolve: {0}")]
    NsidUnresolved(String),

    #[error("identity lookup failed for {did}: {message}")]
    IdentityLookup { did: String, message: String },

    #[error("invalid schema document ({context}): {message}")]
    InvalidSchema { context: String, message: String },

    #[error("failed reading path {path}: {message}")]
    CatalogLoad { path: PathBuf, message: String },

    #[error("no path arguments specified and default lexicon directory not found")]
    MissingLexiconDir,

    #[error("missing record value: {0}")]
    MissingRecordValue(String),

    #[error("requires account credentials")]
    MissingCredentials,

    #[error("no auth session found")]
    NoAuthSession,

    #[error("could not determine state directory for session file")]
    NoStateDir,

    #[error("output file already exists: {0}")]
    FileExists(PathBuf),

    #[error("unknown schema template: {0}")]
    UnknownTemplate(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("network request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    /// Sentinel for "some per-schema issues occurred"; the batch completed
    /// but the process should exit non-zero.
    #[error("issues detected")]
    IssuesFound,
}
