use thiserror::Error;

/// Error taxonomy for the supervisor's drivers and ensure pipeline. Variant
/// names map directly onto the error kinds of the control plane's design:
/// transient readiness, early exit, missing dependency, and protocol errors.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("required binary not found: {0}")]
    MissingDependency(String),

    #[error("process exited early (rc={code})\n{log}")]
    EarlyExit { code: i32, log: String },

    #[error("timed out waiting for readiness: {0}")]
    Timeout(String),

    #[error("unexpected response from external service: {0}")]
    Protocol(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SupervisorError {
    /// A short, user-facing stage-agnostic message suitable for `last_error`.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
