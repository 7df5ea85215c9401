//! Interactive command loop
//!
//! Each iteration reaps finished children, prints the prompt, reads one line
//! and runs one command to completion. Command errors are printed and the
//! loop continues.

use std::io::{self, BufRead, Write};
use tracing::debug;

use crate::config::PmanConfig;
use crate::error::{Error, Result};
use crate::launcher::{self, BG_USAGE};
use crate::probe::StatusProbe;
use crate::reaper::{self, ChildWaiter, WaitAny};
use crate::registry::ProcessRegistry;
use crate::signal::{self, KillSender, SignalKind, SignalSender};

const PSTAT_USAGE: &str = "Usage: pstat <pid>";

/// Split an input line into words.
pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

pub struct Shell {
    prompt: String,
    registry: ProcessRegistry,
    probe: StatusProbe,
    sender: Box<dyn SignalSender>,
    waiter: Box<dyn ChildWaiter>,
}

impl Shell {
    pub fn new(config: &PmanConfig) -> Self {
        Self::with_parts(
            &config.shell.prompt,
            StatusProbe::new(&config.probe.proc_root),
            Box::new(KillSender),
            Box::new(WaitAny),
        )
    }

    pub fn with_parts(
        prompt: &str,
        probe: StatusProbe,
        sender: Box<dyn SignalSender>,
        waiter: Box<dyn ChildWaiter>,
    ) -> Self {
        Self {
            prompt: prompt.to_string(),
            registry: ProcessRegistry::new(),
            probe,
            sender,
            waiter,
        }
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    /// Read and run commands until `input` is exhausted.
    pub fn run(
        &mut self,
        mut input: impl BufRead,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> io::Result<()> {
        let mut buf = Vec::new();
        loop {
            self.reap(out)?;

            write!(out, "{}", self.prompt)?;
            out.flush()?;

            buf.clear();
            if input.read_until(b'\n', &mut buf)? == 0 {
                writeln!(out)?;
                return Ok(());
            }
            let line = String::from_utf8_lossy(&buf);

            if let Err(e) = self.execute(&line, out) {
                match e {
                    // Usage lines go to stdout, like the rest of the command output.
                    Error::Usage(usage) => writeln!(out, "{usage}")?,
                    other => writeln!(err, "{other}")?,
                }
            }
        }
    }

    /// Collect finished children and print a notice for each tracked one.
    pub fn reap(&mut self, out: &mut dyn Write) -> io::Result<()> {
        for reaped in reaper::reap_all(&mut self.registry, self.waiter.as_mut()) {
            writeln!(out, "Process {} has been terminated", reaped.process.pid)?;
        }
        Ok(())
    }

    /// Run a single command line.
    pub fn execute(&mut self, line: &str, out: &mut dyn Write) -> Result<()> {
        let tokens = tokenize(line);
        let Some((command, args)) = tokens.split_first() else {
            return Ok(());
        };
        debug!("Command {command} with {} args", args.len());

        match command.as_str() {
            "bg" => self.bg(args),
            "bglist" => self.bglist(out),
            "bgkill" => self.signal(args, SignalKind::Terminate),
            "bgstop" => self.signal(args, SignalKind::Pause),
            "bgstart" => self.signal(args, SignalKind::Resume),
            "pstat" => self.pstat(args, out),
            _ => {
                writeln!(out, "{} {command}: command not found", self.prompt)?;
                Ok(())
            }
        }
    }

    fn bg(&mut self, args: &[String]) -> Result<()> {
        let (program, rest) = args.split_first().ok_or(Error::Usage(BG_USAGE))?;
        launcher::launch(&mut self.registry, program, rest)?;
        Ok(())
    }

    fn bglist(&self, out: &mut dyn Write) -> Result<()> {
        for process in self.registry.list_all() {
            writeln!(out, "{}: {}", process.pid, process.path)?;
        }
        writeln!(out, "Total background jobs: {}", self.registry.len())?;
        Ok(())
    }

    fn signal(&mut self, args: &[String], kind: SignalKind) -> Result<()> {
        signal::send_signal(&self.registry, self.sender.as_mut(), args, kind)?;
        Ok(())
    }

    fn pstat(&self, args: &[String], out: &mut dyn Write) -> Result<()> {
        let pid = signal::parse_pid_arg(args, PSTAT_USAGE)?;

        // Read both records before printing so a failure leaves no partial output.
        let stats = self.probe.runtime_stats(&self.registry, pid)?;
        let switches = self.probe.context_switches(&self.registry, pid)?;

        writeln!(out, "comm: {}", stats.comm)?;
        writeln!(out, "state: {}", stats.state)?;
        writeln!(out, "utime: {:.6}", stats.utime_secs)?;
        writeln!(out, "stime: {:.6}", stats.stime_secs)?;
        writeln!(out, "rss: {}", stats.rss_pages)?;
        if let Some(n) = switches.voluntary {
            writeln!(out, "voluntary_ctxt_switches: {n}")?;
        }
        if let Some(n) = switches.nonvoluntary {
            writeln!(out, "nonvoluntary_ctxt_switches: {n}")?;
        }
        Ok(())
    }
}
