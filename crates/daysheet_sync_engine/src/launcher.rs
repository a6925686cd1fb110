//! External reconciliation job launchers.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Result of one reconciliation job run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    /// Process exit code; `None` when the job was killed by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl JobOutcome {
    /// A clean run with exit code 0 and no output.
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// A failed run with the given exit code.
    pub fn failed(exit_code: i32) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

/// Runs the external reconciliation job to completion.
///
/// The scheduler holds no lock while `launch` runs, so implementations are
/// free to block for the job's full duration.
pub trait JobLauncher: Send + Sync {
    /// Runs the job and returns its captured outcome.
    fn launch(&self) -> SyncResult<JobOutcome>;
}

/// Launches a child process and captures its output.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<String>,
    workdir: Option<PathBuf>,
}

impl ProcessLauncher {
    /// Creates a launcher for the given program.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            workdir: None,
        }
    }

    /// Appends an argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Sets the working directory for the child.
    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }
}

impl JobLauncher for ProcessLauncher {
    fn launch(&self) -> SyncResult<JobOutcome> {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.workdir {
            command.current_dir(dir);
        }

        let output = command.output().map_err(|err| SyncError::Spawn {
            message: format!("{}: {err}", self.program.display()),
        })?;

        Ok(JobOutcome {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Scripted launcher for tests.
///
/// Pops pre-loaded outcomes in order; an empty queue yields a clean success.
/// An optional per-launch delay keeps the job "running" long enough for
/// concurrency tests to observe the in-flight state.
#[derive(Debug, Default)]
pub struct ScriptedLauncher {
    outcomes: Mutex<VecDeque<SyncResult<JobOutcome>>>,
    delay: Option<Duration>,
    launches: AtomicU64,
}

impl ScriptedLauncher {
    /// Creates a launcher that always succeeds cleanly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a launcher that sleeps for `delay` inside each launch.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Queues an outcome for a future launch.
    pub fn push_outcome(&self, outcome: SyncResult<JobOutcome>) {
        self.outcomes.lock().push_back(outcome);
    }

    /// How many launches have started.
    pub fn launch_count(&self) -> u64 {
        self.launches.load(Ordering::SeqCst)
    }
}

impl JobLauncher for ScriptedLauncher {
    fn launch(&self) -> SyncResult<JobOutcome> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(JobOutcome::success()))
    }
}
