//! Read per-process status records from the proc filesystem
//!
//! Two records are consulted for a tracked pid:
//! - `<root>/<pid>/stat`: one line, space-delimited, with the command name in
//!   parentheses as the second field
//! - `<root>/<pid>/status`: `key: value` lines, scanned for the context
//!   switch counters
//!
//! Every call re-reads the live record; nothing is cached.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::registry::ProcessRegistry;

const VOLUNTARY_CTXT_SWITCHES: &str = "voluntary_ctxt_switches:";
const NONVOLUNTARY_CTXT_SWITCHES: &str = "nonvoluntary_ctxt_switches:";

// Field numbers (1-based, as in proc(5)) within the stat record.
const FIELD_STATE: usize = 3;
const FIELD_UTIME: usize = 14;
const FIELD_STIME: usize = 15;
const FIELD_RSS: usize = 24;

const FALLBACK_CLOCK_TICKS: u64 = 100;

/// CPU and memory figures from the stat record.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeStats {
    pub comm: String,
    pub state: char,
    pub utime_secs: f64,
    pub stime_secs: f64,
    pub rss_pages: i64,
}

/// Context switch counters from the status record. A counter the record does
/// not contain is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextSwitches {
    pub voluntary: Option<u64>,
    pub nonvoluntary: Option<u64>,
}

/// Reads status records for tracked processes.
#[derive(Debug, Clone)]
pub struct StatusProbe {
    proc_root: PathBuf,
    clock_ticks: u64,
}

impl StatusProbe {
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self::with_clock_ticks(proc_root, clock_ticks_per_second())
    }

    pub fn with_clock_ticks(proc_root: impl Into<PathBuf>, clock_ticks: u64) -> Self {
        Self {
            proc_root: proc_root.into(),
            clock_ticks: clock_ticks.max(1),
        }
    }

    pub fn runtime_stats(&self, registry: &ProcessRegistry, pid: i32) -> Result<RuntimeStats> {
        let path = self.record_path(registry, pid, "stat")?;
        let content = read_record(&path)?;
        parse_stat(&content, self.clock_ticks).map_err(|reason| Error::MalformedRecord {
            path,
            reason,
        })
    }

    pub fn context_switches(
        &self,
        registry: &ProcessRegistry,
        pid: i32,
    ) -> Result<ContextSwitches> {
        let path = self.record_path(registry, pid, "status")?;
        let content = read_record(&path)?;
        Ok(parse_status(&content))
    }

    fn record_path(&self, registry: &ProcessRegistry, pid: i32, record: &str) -> Result<PathBuf> {
        if !registry.contains(pid) {
            return Err(Error::UnknownProcess { pid });
        }
        Ok(self.proc_root.join(pid.to_string()).join(record))
    }
}

fn read_record(path: &Path) -> Result<String> {
    debug!("Reading {}", path.display());
    let bytes = fs::read(path).map_err(|source| Error::ProbeUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    // Command names are arbitrary bytes.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Kernel clock ticks per second, used to convert CPU times to seconds.
pub fn clock_ticks_per_second() -> u64 {
    use nix::unistd::{sysconf, SysconfVar};
    match sysconf(SysconfVar::CLK_TCK) {
        Ok(Some(ticks)) if ticks > 0 => ticks as u64,
        _ => FALLBACK_CLOCK_TICKS,
    }
}

/// Parse a stat record.
///
/// The command name may itself contain spaces or parentheses, so it runs
/// from the first `(` to the last `)`. Fields after it are split on
/// whitespace and numbered from 3.
pub fn parse_stat(content: &str, clock_ticks: u64) -> std::result::Result<RuntimeStats, String> {
    let open = content.find('(').ok_or("missing '(' before command name")?;
    let close = content.rfind(')').ok_or("missing ')' after command name")?;
    if close < open {
        return Err("unbalanced command name".into());
    }

    let comm = content[open..=close].to_string();
    let rest: Vec<&str> = content[close + 1..].split_whitespace().collect();
    let field = |n: usize| {
        rest.get(n - FIELD_STATE)
            .copied()
            .ok_or_else(|| format!("record has no field {n}"))
    };

    let state_field = field(FIELD_STATE)?;
    let mut chars = state_field.chars();
    let state = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => return Err(format!("invalid state '{state_field}'")),
    };

    let ticks = |n: usize| -> std::result::Result<u64, String> {
        let raw = field(n)?;
        raw.parse::<u64>()
            .map_err(|_| format!("field {n} is not a tick count: '{raw}'"))
    };
    let utime = ticks(FIELD_UTIME)?;
    let stime = ticks(FIELD_STIME)?;

    let rss_raw = field(FIELD_RSS)?;
    let rss_pages = rss_raw
        .parse::<i64>()
        .map_err(|_| format!("field {FIELD_RSS} is not a page count: '{rss_raw}'"))?;

    Ok(RuntimeStats {
        comm,
        state,
        utime_secs: utime as f64 / clock_ticks as f64,
        stime_secs: stime as f64 / clock_ticks as f64,
        rss_pages,
    })
}

/// Scan a status record for the context switch counters.
pub fn parse_status(content: &str) -> ContextSwitches {
    let mut switches = ContextSwitches::default();
    for line in content.lines() {
        // "nonvoluntary..." does not start with "voluntary...", so order is irrelevant.
        if let Some(value) = line.strip_prefix(VOLUNTARY_CTXT_SWITCHES) {
            switches.voluntary = value.trim().parse().ok();
        } else if let Some(value) = line.strip_prefix(NONVOLUNTARY_CTXT_SWITCHES) {
            switches.nonvoluntary = value.trim().parse().ok();
        }
    }
    switches
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT_SLEEP: &str = "4242 (sleep) S 4100 4242 4100 34816 4242 4194304 \
        91 0 0 0 250 130 0 0 20 0 1 0 5831234 5586944 212 18446744073709551615 \
        1 1 0 0 0 0 0 0 0 0 0 0 17 3 0 0 0 0 0\n";

    const STATUS_SLEEP: &str = "Name:\tsleep\n\
        State:\tS (sleeping)\n\
        Pid:\t4242\n\
        VmRSS:\t     848 kB\n\
        voluntary_ctxt_switches:\t7\n\
        nonvoluntary_ctxt_switches:\t2\n";

    #[test]
    fn test_parse_stat_fields() {
        let stats = parse_stat(STAT_SLEEP, 100).unwrap();
        assert_eq!(stats.comm, "(sleep)");
        assert_eq!(stats.state, 'S');
        assert!((stats.utime_secs - 2.5).abs() < 1e-9);
        assert!((stats.stime_secs - 1.3).abs() < 1e-9);
        assert_eq!(stats.rss_pages, 212);
    }

    #[test]
    fn test_parse_stat_comm_with_spaces_and_parens() {
        let record = STAT_SLEEP.replace("(sleep)", "(my (odd) prog)");
        let stats = parse_stat(&record, 100).unwrap();
        assert_eq!(stats.comm, "(my (odd) prog)");
        assert_eq!(stats.state, 'S');
        assert_eq!(stats.rss_pages, 212);
    }

    #[test]
    fn test_parse_stat_truncated() {
        let err = parse_stat("4242 (sleep) S 1 2 3", 100).unwrap_err();
        assert!(err.contains("field 14"), "{err}");
        assert!(parse_stat("garbage", 100).is_err());
    }

    #[test]
    fn test_parse_status_counters() {
        let switches = parse_status(STATUS_SLEEP);
        assert_eq!(switches.voluntary, Some(7));
        assert_eq!(switches.nonvoluntary, Some(2));
    }

    #[test]
    fn test_parse_status_missing_keys() {
        let switches = parse_status("Name:\tsleep\nState:\tZ (zombie)\n");
        assert_eq!(switches, ContextSwitches::default());
    }

    fn fixture(pid: i32) -> (tempfile::TempDir, ProcessRegistry) {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join(pid.to_string());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("stat"), STAT_SLEEP).unwrap();
        fs::write(dir.join("status"), STATUS_SLEEP).unwrap();
        let mut reg = ProcessRegistry::new();
        reg.insert(pid, "sleep").unwrap();
        (root, reg)
    }

    #[test]
    fn test_probe_reads_fixture_tree() {
        let (root, reg) = fixture(4242);
        let probe = StatusProbe::with_clock_ticks(root.path(), 50);
        let stats = probe.runtime_stats(&reg, 4242).unwrap();
        assert!((stats.utime_secs - 5.0).abs() < 1e-9);
        let switches = probe.context_switches(&reg, 4242).unwrap();
        assert_eq!(switches.voluntary, Some(7));
    }

    #[test]
    fn test_untracked_pid_opens_nothing() {
        // The root does not exist; an attempt to open would be ProbeUnavailable.
        let probe = StatusProbe::with_clock_ticks("/nonexistent/pman-proc", 100);
        let reg = ProcessRegistry::new();
        assert!(matches!(
            probe.runtime_stats(&reg, 1),
            Err(Error::UnknownProcess { pid: 1 })
        ));
        assert!(matches!(
            probe.context_switches(&reg, 1),
            Err(Error::UnknownProcess { pid: 1 })
        ));
    }

    #[test]
    fn test_vanished_process_is_unavailable() {
        let (root, mut reg) = fixture(4242);
        reg.insert(5000, "gone").unwrap();
        let probe = StatusProbe::with_clock_ticks(root.path(), 100);
        let err = probe.runtime_stats(&reg, 5000).unwrap_err();
        match err {
            Error::ProbeUnavailable { path, .. } => {
                assert_eq!(path, root.path().join("5000").join("stat"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_record_reported() {
        let (root, reg) = fixture(4242);
        fs::write(root.path().join("4242").join("stat"), "4242 (sleep)").unwrap();
        let probe = StatusProbe::with_clock_ticks(root.path(), 100);
        assert!(matches!(
            probe.runtime_stats(&reg, 4242),
            Err(Error::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_non_utf8_comm_is_readable() {
        let (root, reg) = fixture(77);
        let dir = root.path().join("77");
        let mut raw = STAT_SLEEP.replacen("(sleep)", "(w?rk)", 1).into_bytes();
        let at = raw.iter().position(|b| *b == b'?').unwrap();
        raw[at] = 0xff;
        fs::write(dir.join("stat"), &raw).unwrap();
        fs::write(dir.join("status"), b"Name:\tw\xffrk\nvoluntary_ctxt_switches:\t4\n").unwrap();

        let probe = StatusProbe::with_clock_ticks(root.path(), 100);
        let stats = probe.runtime_stats(&reg, 77).unwrap();
        assert_eq!(stats.comm, "(w\u{fffd}rk)");
        assert_eq!(stats.state, 'S');
        assert_eq!(stats.rss_pages, 212);

        let switches = probe.context_switches(&reg, 77).unwrap();
        assert_eq!(switches.voluntary, Some(4));
        assert_eq!(switches.nonvoluntary, None);
    }

    #[test]
    fn test_clock_ticks_positive() {
        assert!(clock_ticks_per_second() > 0);
    }
}
