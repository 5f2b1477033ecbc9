//! Generation guard error types.

use thiserror::Error;

/// Errors from the sidecar runtime and the parse/validate pipeline.
///
/// Schema failures never escape the orchestrator: after the single
/// repair round they become the fallback result. These errors surface
/// only from the runtime layer itself.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The sidecar exceeded its per-call timeout. The child process is
    /// killed; expiry is an error, never a partial result.
    #[error("sidecar timeout after {seconds}s")]
    Timeout { seconds: u64 },

    /// The sidecar exited nonzero or could not be spawned.
    #[error("sidecar failed: {0}")]
    Runtime(String),

    /// The model output was not parseable as a JSON object.
    #[error("output is not a JSON object: {0}")]
    Parse(String),

    /// The parsed output did not match the response schema.
    #[error("output does not match schema: {0}")]
    Schema(String),

    /// I/O error while launching or reading the sidecar.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for generation guard operations.
pub type LlmResult<T> = Result<T, LlmError>;
