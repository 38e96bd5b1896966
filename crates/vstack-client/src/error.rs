//! Errors raised by the client shim (§4.8, §7 "User-visible failure of the
//! client shim's `ensure_stack` is a single exception carrying stage and
//! the log excerpt").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("daemon did not become reachable at {0} within the auto-spawn window")]
    DaemonUnreachable(String),

    #[error("failed to spawn daemon process: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("http request to daemon failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ensure failed at stage '{stage}': {last_error}")]
    EnsureFailed { stage: String, last_error: String },

    #[error("ensure did not reach ready within {0}s")]
    EnsureTimeout(u64),
}

pub type Result<T> = std::result::Result<T, ClientError>;
