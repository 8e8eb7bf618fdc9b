//! Error types for the facturai-core library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the facturai library.
///
/// Only conditions that make a whole run impossible surface through this
/// type. Anything scoped to a single invoice file is reported as a
/// [`GatewayError`] and absorbed by the pipeline.
#[derive(Error, Debug)]
pub enum FacturaiError {
    /// The input directory cannot be used.
    #[error("input error: {0}")]
    Input(#[from] InputError),

    /// The mock response file cannot be used.
    #[error("mock response error: {0}")]
    Mock(#[from] MockError),

    /// Writing the export failed.
    #[error("export error: {0}")]
    Export(#[from] ExportError),

    /// Extraction gateway could not be constructed.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to input discovery.
#[derive(Error, Debug)]
pub enum InputError {
    /// The input path exists but is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The input directory could not be listed.
    #[error("cannot read {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },
}

/// Errors related to loading a mock response set.
#[derive(Error, Debug)]
pub enum MockError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON.
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The top-level value is not an array.
    #[error("expected a JSON array of responses in {0}")]
    NotAnArray(PathBuf),
}

/// Errors raised while obtaining one extraction.
///
/// These are per-file: the pipeline turns them into failed records.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The invoice file could not be read.
    #[error("failed to read invoice: {0}")]
    Read(#[from] std::io::Error),

    /// The invoice is larger than the service accepts inline.
    #[error("file is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    /// The HTTP request could not be completed.
    #[error("request failed: {0}")]
    Http(String),

    /// The service did not answer within the configured timeout.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// The service answered with a non-success status.
    #[error("service returned {status}: {body}")]
    Service { status: u16, body: String },

    /// The service answered without any usable content.
    #[error("service returned no content")]
    EmptyResponse,

    /// The content could not be parsed as JSON.
    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),

    /// The HTTP client could not be built.
    #[error("client setup failed: {0}")]
    Client(String),
}

/// Errors related to writing the export file.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The output directory could not be created.
    #[error("cannot create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV serialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Writing the file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for the facturai library.
pub type Result<T> = std::result::Result<T, FacturaiError>;
