//! Shutdown coordination shared by the daemon's background tasks (reaper,
//! ensure worker, control-plane listener).

pub mod shutdown;
