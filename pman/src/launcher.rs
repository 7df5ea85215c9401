//! Launch background processes and register them

use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::registry::ProcessRegistry;

pub const BG_USAGE: &str = "Usage: bg <program> [args]";

/// Start `program` with `args` in the background and track it.
///
/// The program is resolved through `PATH`. If exec fails in the child, the
/// child exits and the failure is returned here; nothing is registered.
/// The child gets its own process group so terminal job-control signals
/// aimed at the shell do not reach it.
pub fn launch(registry: &mut ProcessRegistry, program: &str, args: &[String]) -> Result<i32> {
    if program.is_empty() {
        return Err(Error::Usage(BG_USAGE));
    }

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .process_group(0)
        .spawn()
        .map_err(|source| Error::SpawnFailure {
            program: program.to_string(),
            source,
        })?;

    // The Child handle is dropped without waiting; the reaper collects it.
    let pid = child.id() as i32;
    info!("Launched {program} with PID {pid}");

    if let Err(e) = registry.insert(pid, program) {
        warn!("PID {pid} already tracked, new process left untracked");
        return Err(e);
    }
    Ok(pid)
}
