use chrono::Utc;
use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::{getpgid, Pid};
use scriptward_core::{ExitOutcome, Result, RunReport, SupervisorError};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::process::ProcessConfig;
use crate::relay::{OutputSink, Relays, TerminalSink};

/// Runs scripts as child processes and relays their output
#[derive(Clone)]
pub struct Supervisor {
    config: ProcessConfig,
    sink: Arc<dyn OutputSink>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            config: ProcessConfig::default(),
            sink: Arc::new(TerminalSink),
        }
    }

    pub fn with_config(mut self, config: ProcessConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// Run `script` with the configured timeout and describe the run
    pub fn execute(&self, script: &Path) -> Result<RunReport> {
        self.config.validate()?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start_instant = Instant::now();

        info!(
            run_id = %run_id,
            script = %script.display(),
            timeout_secs = ?self.config.timeout.map(|t| t.as_secs()),
            "Starting script run"
        );

        let outcome = self.run_with_timeout(script, self.config.timeout)?;

        let duration_ms = start_instant.elapsed().as_millis() as u64;
        info!(
            run_id = %run_id,
            outcome = ?outcome,
            duration_ms,
            "Script run completed"
        );

        Ok(RunReport {
            run_id,
            script: script.to_path_buf(),
            outcome,
            duration_ms,
            started_at,
            completed_at: Utc::now(),
        })
    }

    /// Run `script` and wait for it without a time limit
    pub fn run(&self, script: &Path) -> Result<ExitOutcome> {
        self.run_with_timeout(script, None)
    }

    /// Run `script`; with a timeout the wait is a bounded poll that ends in
    /// a forced kill. Both output channels are drained before the outcome is
    /// reported.
    pub fn run_with_timeout(&self, script: &Path, timeout: Option<Duration>) -> Result<ExitOutcome> {
        let start = Instant::now();
        let (child, relays) = self.spawn(script)?;
        let pid = child.id();

        let outcome = match timeout {
            None => {
                relays.join();
                wait_blocking(child)?
            }
            Some(timeout) => {
                let outcome = monitor(child, timeout, self.config.poll_interval)?;
                // Background processes left in the group can hold the pipes
                // open after the script exits; they get the rest of the timeout.
                let timed_out = matches!(outcome, ExitOutcome::TimedOut { .. });
                if !timed_out && !relays.wait_until(start + timeout, self.config.poll_interval) {
                    warn!(pid, "Output still open after timeout, killing process group");
                    kill_group(pid)?;
                    self.sink.error(&format!(
                        "Script {} left processes holding its output open past the timeout; killed them",
                        script.display()
                    ));
                }
                relays.join();
                outcome
            }
        };

        self.report(script, &outcome);
        Ok(outcome)
    }

    fn spawn(&self, script: &Path) -> Result<(Child, Relays)> {
        let mut command = Command::new(&self.config.shell);
        command
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .envs(self.config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            // Own process group, so a timeout kill also reaches grandchildren
            // that hold the output pipes open.
            .process_group(0);
        if let Some(dir) = &self.config.working_directory {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| {
            error!(script = %script.display(), error = %source, "Failed to spawn script");
            SupervisorError::Spawn {
                script: script.to_path_buf(),
                source,
            }
        })?;
        let pid = child.id();
        debug!(pid, shell = %self.config.shell.display(), "Script spawned");

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            abandon(&mut child);
            return Err(SupervisorError::Channel(
                "child output pipes were not created".to_string(),
            ));
        };

        match Relays::start(stdout, stderr, Arc::clone(&self.sink)) {
            Ok(relays) => Ok((child, relays)),
            Err(e) => {
                abandon(&mut child);
                Err(SupervisorError::Channel(format!(
                    "failed to start relay thread: {}",
                    e
                )))
            }
        }
    }

    fn report(&self, script: &Path, outcome: &ExitOutcome) {
        let message = format!("Script {} {}", script.display(), outcome);
        match outcome {
            ExitOutcome::Exited { .. } | ExitOutcome::Signaled { .. } => self.sink.info(&message),
            ExitOutcome::TimedOut { .. } => self.sink.error(&message),
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a raw wait status onto an [`ExitOutcome`]
pub fn classify(status: ExitStatus) -> ExitOutcome {
    match (status.code(), status.signal()) {
        (Some(code), _) => ExitOutcome::Exited { code },
        (None, Some(signal)) => ExitOutcome::Signaled { signal },
        (None, None) => ExitOutcome::Exited {
            code: status.into_raw(),
        },
    }
}

/// Wait for `child` to exit, however long it takes
pub fn wait_blocking(mut child: Child) -> Result<ExitOutcome> {
    let pid = child.id();
    let status = child
        .wait()
        .map_err(|source| SupervisorError::Wait { pid, source })?;
    Ok(classify(status))
}

/// Poll `child` once per `poll_interval` until it exits or `timeout` has
/// elapsed, then kill it and reap it. A child leading its own process group
/// is killed together with the group.
///
/// Taking the child by value means it is reaped exactly once, here.
pub fn monitor(mut child: Child, timeout: Duration, poll_interval: Duration) -> Result<ExitOutcome> {
    let pid = child.id();
    let attempts = poll_attempts(timeout, poll_interval);

    for attempt in 0..=attempts {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(classify(status)),
            Ok(None) if attempt < attempts => {
                debug!(pid, attempt, "Child still running");
                thread::sleep(poll_interval);
            }
            Ok(None) => {}
            Err(source) => return Err(SupervisorError::Wait { pid, source }),
        }
    }

    warn!(pid, timeout_secs = timeout.as_secs(), "Timeout elapsed, killing script");
    match force_kill(Pid::from_raw(pid as i32)) {
        Ok(()) => {}
        // The group vanished between the last poll and the kill.
        Err(Errno::ESRCH) => return wait_blocking(child),
        Err(errno) => {
            error!(pid, error = %errno, "Failed to kill timed-out script");
            return Err(SupervisorError::Kill {
                pid,
                source: errno.into(),
            });
        }
    }

    child
        .wait()
        .map_err(|source| SupervisorError::Wait { pid, source })?;
    Ok(ExitOutcome::TimedOut {
        timeout_secs: timeout.as_secs(),
        signal: Signal::SIGKILL as i32,
    })
}

/// SIGKILL the process group led by the (already reaped) script
fn kill_group(pid: u32) -> Result<()> {
    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(SupervisorError::Kill {
            pid,
            source: errno.into(),
        }),
    }
}

fn force_kill(pid: Pid) -> nix::Result<()> {
    match getpgid(Some(pid)) {
        Ok(pgid) if pgid == pid => killpg(pid, Signal::SIGKILL),
        _ => kill(pid, Signal::SIGKILL),
    }
}

fn poll_attempts(timeout: Duration, poll_interval: Duration) -> u64 {
    let interval = poll_interval.as_nanos().max(1);
    ((timeout.as_nanos() + interval - 1) / interval) as u64
}

/// Kill and reap a child we can no longer supervise
fn abandon(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
