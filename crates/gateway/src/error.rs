//! Error types for `searchbridge-gateway`.

use searchbridge_openapi_tools::error::SpecError;
use searchbridge_openapi_tools::schema::Violation;
use thiserror::Error;

/// Errors raised while building the tool table at startup.
///
/// These are fatal to startup and never produced per-call.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// An operation id was registered twice across merged descriptions.
    #[error("Duplicate operationId '{0}': a tool with this id is already registered")]
    DuplicateOperationId(String),

    /// The description declares no server URL to dispatch against.
    #[error("Description declares no servers")]
    MissingServer,

    /// Description compilation failed.
    #[error(transparent)]
    Spec(#[from] SpecError),
}

/// Errors raised by a single tool invocation.
///
/// Each of these is isolated to its owning call; in-flight invocations are
/// never affected. Upstream HTTP error statuses are deliberately *not* here:
/// they pass through as result content.
#[derive(Error, Debug)]
pub enum InvokeError {
    /// Caller arguments failed the compiled input schema. Carries every
    /// violated field path, not just the first.
    #[error("Invalid arguments: {}", render_violations(.0))]
    Validation(Vec<Violation>),

    /// No usable credential could be resolved for the call.
    #[error("Credential resolution failed: {0}")]
    Credential(String),

    /// Structurally invalid call, rejected before any network access.
    #[error("Invalid call: {0}")]
    Usage(String),

    /// Network-level failure reaching the upstream or a middleware side call.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The named tool is not registered.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

fn render_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for invocation paths.
pub type Result<T> = std::result::Result<T, InvokeError>;
