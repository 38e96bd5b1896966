//! The control plane (§4.7): a loopback-only Axum router exposing
//! `/lease/*`, `/ensure`, and `/status` over the shared `Supervisor`.
//! No authentication — binding loopback only is the daemon's whole
//! security boundary (see spec Non-goals).

pub mod error;
pub mod router;
pub mod routes;

pub use error::ApiError;
pub use router::build_router;
