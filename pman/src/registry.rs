//! Registry of background processes launched by the shell
//!
//! Entries are kept in launch order; listing walks them newest first.

use crate::error::{Error, Result};

/// A background process the shell launched and still believes to be alive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedProcess {
    pub pid: i32,
    pub path: String,
}

/// Insertion-ordered, pid-unique collection of tracked processes.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    entries: Vec<TrackedProcess>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new process. It becomes the first entry in listing order.
    pub fn insert(&mut self, pid: i32, path: &str) -> Result<()> {
        if self.find(pid).is_some() {
            return Err(Error::DuplicateKey { pid });
        }
        self.entries.push(TrackedProcess {
            pid,
            path: path.to_string(),
        });
        Ok(())
    }

    /// Forget a process. Absent pids are ignored.
    pub fn remove(&mut self, pid: i32) -> Option<TrackedProcess> {
        let idx = self.entries.iter().position(|p| p.pid == pid)?;
        Some(self.entries.remove(idx))
    }

    pub fn find(&self, pid: i32) -> Option<&TrackedProcess> {
        self.entries.iter().find(|p| p.pid == pid)
    }

    pub fn contains(&self, pid: i32) -> bool {
        self.find(pid).is_some()
    }

    /// Tracked processes, most recently launched first.
    pub fn list_all(&self) -> impl Iterator<Item = &TrackedProcess> + '_ {
        self.entries.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
