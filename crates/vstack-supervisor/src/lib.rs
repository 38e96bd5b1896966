//! The service supervisor: drivers for the STT/TTS/LLM backing processes,
//! the lease registry, the ensure pipeline, and the idle reaper that ties
//! them together into one `Supervisor` handle shared by the control plane.

pub mod backoff;
pub mod drivers;
pub mod ensure;
pub mod error;
pub mod leases;
pub mod probe;
pub mod process;
pub mod reaper;
pub mod state;
pub mod supervisor;

pub use error::{Result, SupervisorError};
pub use state::{Stage, WarmState};
pub use supervisor::{StatusDocument, Supervisor};
