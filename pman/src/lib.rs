//! pman: interactive background process manager
//!
//! Launches programs in the background, tracks their pids, sends them
//! kill/stop/continue signals, reports their status from the proc
//! filesystem, and reaps them when they exit.

pub mod config;
pub mod error;
pub mod launcher;
pub mod probe;
pub mod reaper;
pub mod registry;
pub mod shell;
pub mod signal;

pub use error::{Error, Result};
