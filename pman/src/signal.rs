//! Send control signals to tracked processes
//!
//! Only pids present in the registry may be signaled. Delivery never touches
//! the registry; a killed process is removed once the reaper sees it exit.

use nix::sys::signal::Signal;
use nix::unistd::Pid;
use tracing::info;

use crate::error::{Error, Result};
use crate::registry::ProcessRegistry;

/// The control operations the shell exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Terminate,
    Pause,
    Resume,
}

impl SignalKind {
    pub fn signal(self) -> Signal {
        match self {
            SignalKind::Terminate => Signal::SIGKILL,
            SignalKind::Pause => Signal::SIGSTOP,
            SignalKind::Resume => Signal::SIGCONT,
        }
    }

    /// Usage line of the shell command mapped to this operation.
    pub fn usage(self) -> &'static str {
        match self {
            SignalKind::Terminate => "Usage: bgkill <pid>",
            SignalKind::Pause => "Usage: bgstop <pid>",
            SignalKind::Resume => "Usage: bgstart <pid>",
        }
    }
}

/// OS signal delivery.
pub trait SignalSender {
    fn send(&mut self, pid: Pid, signal: Signal) -> nix::Result<()>;
}

/// Delivers signals with `kill(2)`.
#[derive(Debug, Default)]
pub struct KillSender;

impl SignalSender for KillSender {
    fn send(&mut self, pid: Pid, signal: Signal) -> nix::Result<()> {
        nix::sys::signal::kill(pid, signal)
    }
}

/// Parse a command's argument list into exactly one positive pid.
pub fn parse_pid_arg(args: &[String], usage: &'static str) -> Result<i32> {
    match args {
        [arg] => match arg.parse::<i32>() {
            Ok(pid) if pid > 0 => Ok(pid),
            _ => Err(Error::Usage(usage)),
        },
        _ => Err(Error::Usage(usage)),
    }
}

/// Validate `args` against the registry and deliver `kind` to the target.
pub fn send_signal(
    registry: &ProcessRegistry,
    sender: &mut dyn SignalSender,
    args: &[String],
    kind: SignalKind,
) -> Result<i32> {
    let pid = parse_pid_arg(args, kind.usage())?;
    if !registry.contains(pid) {
        return Err(Error::UnknownProcess { pid });
    }

    let signal = kind.signal();
    sender
        .send(Pid::from_raw(pid), signal)
        .map_err(|source| Error::DeliveryFailed {
            pid,
            signal: signal.as_str(),
            source,
        })?;

    info!("Sent {} to PID {pid}", signal.as_str());
    Ok(pid)
}
