//! Error taxonomy for command handlers
//!
//! Every variant is recoverable: the shell loop prints it and reads the
//! next command.

use std::path::PathBuf;

/// All errors produced by the process manager's command handlers.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Malformed command arguments. Carries the usage line to print.
    #[error("{0}")]
    Usage(&'static str),

    #[error("Process {pid} does not exist")]
    UnknownProcess { pid: i32 },

    #[error("Process {pid} is already tracked")]
    DuplicateKey { pid: i32 },

    #[error("Error. Failed to start {program}: {source}")]
    SpawnFailure {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to send {signal} to process {pid}: {source}")]
    DeliveryFailed {
        pid: i32,
        signal: &'static str,
        #[source]
        source: nix::errno::Errno,
    },

    #[error("Error opening file {}: {source}", path.display())]
    ProbeUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed record {}: {reason}", path.display())]
    MalformedRecord { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
