//! Error types for `searchbridge-openapi-tools`.

use thiserror::Error;

/// Errors raised while compiling an API description into tools.
///
/// All of these are startup errors: they abort registration and are never
/// produced by a per-call code path.
#[derive(Error, Debug)]
pub enum SpecError {
    /// A `$ref` points outside the document or at a non-existent path.
    #[error("Malformed reference '{pointer}': {reason}")]
    MalformedReference { pointer: String, reason: String },

    /// A `$ref` expansion path revisited itself.
    #[error("Cyclic reference detected while expanding '{pointer}'")]
    CyclicReference { pointer: String },

    /// JSON (de)serialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for description compilation.
pub type Result<T> = std::result::Result<T, SpecError>;
