//! Core library for the service supervisor daemon — configuration loading
//! and the single-instance lockfile guard shared by the daemon binary and
//! the client shim.

pub mod config;
pub mod lockfile;
