//! Error types for the callback system.

/// Errors raised by callback handlers
///
/// The engine logs these and carries on; a failing handler never changes the reply.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("Callback execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Callback export failed: {0}")]
    ExportFailed(String),
}
