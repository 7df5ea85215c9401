//! Reclaim terminated children
//!
//! Polls with `WNOHANG` until no more children have exited, removing each
//! one from the registry. Runs before every prompt so zombies never pile up.

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tracing::{info, warn};

use crate::registry::{ProcessRegistry, TrackedProcess};

/// Non-blocking wait for any child.
pub trait ChildWaiter {
    fn try_wait_any(&mut self) -> nix::Result<WaitStatus>;
}

/// `waitpid(-1, WNOHANG)`.
#[derive(Debug, Default)]
pub struct WaitAny;

impl ChildWaiter for WaitAny {
    fn try_wait_any(&mut self) -> nix::Result<WaitStatus> {
        waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG))
    }
}

/// A tracked process that has been confirmed dead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaped {
    pub process: TrackedProcess,
    pub status: String,
}

/// Drain every terminated child. Returns the tracked ones, in reap order.
pub fn reap_all(registry: &mut ProcessRegistry, waiter: &mut dyn ChildWaiter) -> Vec<Reaped> {
    let mut reaped = Vec::new();
    loop {
        let status = match waiter.try_wait_any() {
            Ok(WaitStatus::StillAlive) | Err(Errno::ECHILD) => break,
            Ok(status) => status,
            Err(e) => {
                warn!("waitpid error: {e}");
                break;
            }
        };

        let (pid, description) = match status {
            WaitStatus::Exited(pid, code) => (pid, format!("exited with status {code}")),
            WaitStatus::Signaled(pid, signal, _) => {
                (pid, format!("killed by {}", signal.as_str()))
            }
            // Stop/continue reports only appear with WUNTRACED/WCONTINUED.
            other => {
                warn!("Ignoring unexpected wait status: {other:?}");
                continue;
            }
        };

        match registry.remove(pid.as_raw()) {
            Some(process) => {
                info!("Reaped {} (PID {pid}): {description}", process.path);
                reaped.push(Reaped {
                    process,
                    status: description,
                });
            }
            None => warn!("Reaped untracked child PID {pid}: {description}"),
        }
    }
    reaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::Signal;
    use std::collections::VecDeque;

    struct Scripted(VecDeque<nix::Result<WaitStatus>>);

    impl ChildWaiter for Scripted {
        fn try_wait_any(&mut self) -> nix::Result<WaitStatus> {
            self.0.pop_front().unwrap_or(Err(Errno::ECHILD))
        }
    }

    fn pid(n: i32) -> Pid {
        Pid::from_raw(n)
    }

    #[test]
    fn test_reaps_all_pending_children() {
        let mut reg = ProcessRegistry::new();
        reg.insert(10, "sleep").unwrap();
        reg.insert(11, "yes").unwrap();
        reg.insert(12, "top").unwrap();

        let mut waiter = Scripted(VecDeque::from(vec![
            Ok(WaitStatus::Exited(pid(10), 0)),
            Ok(WaitStatus::Signaled(pid(12), Signal::SIGKILL, false)),
            Ok(WaitStatus::StillAlive),
            Ok(WaitStatus::Exited(pid(11), 0)),
        ]));

        let reaped = reap_all(&mut reg, &mut waiter);
        let pids: Vec<i32> = reaped.iter().map(|r| r.process.pid).collect();
        assert_eq!(pids, vec![10, 12]);
        assert_eq!(reaped[1].status, "killed by SIGKILL");
        assert!(reg.find(10).is_none());
        assert!(reg.find(12).is_none());
        assert!(reg.contains(11));
    }

    #[test]
    fn test_untracked_children_drained_and_ignored() {
        let mut reg = ProcessRegistry::new();
        reg.insert(20, "sleep").unwrap();

        let mut waiter = Scripted(VecDeque::from(vec![
            Ok(WaitStatus::Exited(pid(99), 1)),
            Ok(WaitStatus::Exited(pid(20), 3)),
        ]));

        let reaped = reap_all(&mut reg, &mut waiter);
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].process.path, "sleep");
        assert_eq!(reaped[0].status, "exited with status 3");
        assert!(reg.is_empty());
        assert!(waiter.0.is_empty());
    }

    #[test]
    fn test_no_children_is_quiet() {
        let mut reg = ProcessRegistry::new();
        let mut waiter = Scripted(VecDeque::new());
        assert!(reap_all(&mut reg, &mut waiter).is_empty());
    }

    #[test]
    fn test_wait_error_ends_cycle() {
        let mut reg = ProcessRegistry::new();
        reg.insert(5, "sleep").unwrap();
        let mut waiter = Scripted(VecDeque::from(vec![
            Err(Errno::EINTR),
            Ok(WaitStatus::Exited(pid(5), 0)),
        ]));

        assert!(reap_all(&mut reg, &mut waiter).is_empty());
        assert!(reg.contains(5));

        // Next cycle picks it up.
        let reaped = reap_all(&mut reg, &mut waiter);
        assert_eq!(reaped.len(), 1);
        assert!(reg.is_empty());
    }
}
