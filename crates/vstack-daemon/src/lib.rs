//! Process wiring for the supervisor daemon binary: the signal-to-shutdown
//! plumbing `main.rs` drives. Split out of `main.rs` so it can be
//! exercised by tests without going through a real `fn main`.

pub mod signals;

