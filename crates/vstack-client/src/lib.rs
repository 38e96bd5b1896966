//! Embeddable client for processes that want to share the managed STT/TTS/
//! LLM stack without speaking the control-plane HTTP API directly (§4.8).

pub mod error;
pub mod shim;
pub mod spawn;

pub use error::{ClientError, Result};
pub use shim::{Client, LeaseHandle};
pub use spawn::spawn_detached_daemon;
