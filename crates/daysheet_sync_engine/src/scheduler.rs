//! Debounced singleton scheduler for the external reconciliation job.
//!
//! Every edit signal re-arms a single deadline at `now + debounce`. When the
//! deadline expires the scheduler checks for a fresher edit: if one landed
//! within `debounce - edit_margin` of the fire time, the run is deferred and
//! the deadline re-armed. At most one job is ever in flight; edit signals
//! that arrive while a job runs are recorded but arm no timer, so the next
//! cycle starts from a fresh signal.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::launcher::JobLauncher;
use crate::state::{StateSink, SyncState};
use chrono::{DateTime, Utc};
use daysheet_core::Clock;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Receipt for a recorded edit signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TouchReceipt {
    /// When the edit was recorded.
    pub last_edit_at: DateTime<Utc>,
    /// The armed deadline; absent when a job was already running.
    pub scheduled_run_at: Option<DateTime<Utc>>,
}

/// What happened when a run was attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunDecision {
    /// A job was started.
    Started,
    /// A job was already in flight; nothing started.
    AlreadyRunning,
    /// A recent edit deferred the run; the deadline was re-armed.
    Deferred {
        /// The new deadline.
        scheduled_run_at: DateTime<Utc>,
    },
}

struct SchedShared {
    config: SyncConfig,
    clock: Arc<dyn Clock>,
    launcher: Arc<dyn JobLauncher>,
    sink: Arc<dyn StateSink>,
    inner: Mutex<SchedInner>,
    timer_cv: Condvar,
}

struct SchedInner {
    /// Monotonic timestamp of the last edit signal.
    last_edit_ms: Option<u64>,
    /// Armed fire deadline, monotonic.
    deadline_ms: Option<u64>,
    running: bool,
    shutdown: bool,
    state: SyncState,
    job: Option<JoinHandle<()>>,
}

/// The debounced singleton scheduler.
///
/// Owns a timer thread that fires armed deadlines; each accepted run executes
/// on its own worker thread so no lock is held for the job's duration.
pub struct Scheduler {
    shared: Arc<SchedShared>,
    timer: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Starts the scheduler, loading any persisted state.
    ///
    /// `running` and `scheduled_run_at` from a previous process are cleared:
    /// an in-flight job does not survive a restart and a stale deadline must
    /// not fire.
    pub fn start(
        config: SyncConfig,
        clock: Arc<dyn Clock>,
        launcher: Arc<dyn JobLauncher>,
        sink: Arc<dyn StateSink>,
    ) -> SyncResult<Self> {
        let mut state = sink.load()?.unwrap_or_default();
        state.reset_transient();

        let shared = Arc::new(SchedShared {
            config,
            clock,
            launcher,
            sink,
            inner: Mutex::new(SchedInner {
                last_edit_ms: None,
                deadline_ms: None,
                running: false,
                shutdown: false,
                state,
                job: None,
            }),
            timer_cv: Condvar::new(),
        });

        {
            let mut inner = shared.inner.lock();
            persist_locked(&shared, &mut inner);
        }

        let timer_shared = Arc::clone(&shared);
        let timer = std::thread::Builder::new()
            .name("daysheet-sync-timer".into())
            .spawn(move || timer_loop(timer_shared))
            .map_err(|err| SyncError::Spawn {
                message: format!("timer thread: {err}"),
            })?;

        Ok(Self {
            shared,
            timer: Some(timer),
        })
    }

    /// Records an edit signal and re-arms the deadline at `now + debounce`.
    ///
    /// While a job is running the edit is recorded but no deadline is armed;
    /// the cycle after the job needs a fresh signal.
    pub fn touch(&self) -> TouchReceipt {
        let shared = &self.shared;
        let mut inner = shared.inner.lock();

        let now_ms = shared.clock.monotonic_ms();
        let now = shared.clock.now();
        inner.last_edit_ms = Some(now_ms);
        inner.state.last_edit_at = Some(now);

        let scheduled_run_at = if inner.running {
            tracing::debug!("edit recorded while job running, no deadline armed");
            None
        } else {
            inner.deadline_ms = Some(now_ms + shared.config.debounce_ms());
            let at = now + chrono::Duration::milliseconds(shared.config.debounce_ms() as i64);
            inner.state.scheduled_run_at = Some(at);
            shared.timer_cv.notify_all();
            Some(at)
        };

        persist_locked(shared, &mut inner);
        TouchReceipt {
            last_edit_at: now,
            scheduled_run_at,
        }
    }

    /// Attempts a debounced run now, as the timer does on deadline expiry.
    ///
    /// Defers and re-arms when the last edit is younger than
    /// `debounce - edit_margin`.
    pub fn try_run(&self) -> SyncResult<RunDecision> {
        let mut inner = self.shared.inner.lock();
        inner.deadline_ms = None;
        try_run_locked(&self.shared, &mut inner, false)
    }

    /// Starts a run immediately, bypassing the debounce and the edit margin.
    ///
    /// Still refuses to overlap an in-flight job.
    pub fn run_now(&self) -> SyncResult<RunDecision> {
        let mut inner = self.shared.inner.lock();
        inner.deadline_ms = None;
        inner.state.scheduled_run_at = None;
        try_run_locked(&self.shared, &mut inner, true)
    }

    /// Current observable state.
    pub fn status(&self) -> SyncState {
        self.shared.inner.lock().state.clone()
    }

    /// Stops the timer and waits for any in-flight job to finish.
    pub fn stop(&mut self) {
        let job = {
            let mut inner = self.shared.inner.lock();
            inner.shutdown = true;
            self.shared.timer_cv.notify_all();
            inner.job.take()
        };
        if let Some(timer) = self.timer.take() {
            let _ = timer.join();
        }
        if let Some(job) = job {
            let _ = job.join();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn timer_loop(shared: Arc<SchedShared>) {
    let mut inner = shared.inner.lock();
    loop {
        if inner.shutdown {
            return;
        }
        match inner.deadline_ms {
            None => {
                shared.timer_cv.wait(&mut inner);
            }
            Some(deadline) => {
                let now = shared.clock.monotonic_ms();
                if now < deadline {
                    shared
                        .timer_cv
                        .wait_for(&mut inner, Duration::from_millis(deadline - now));
                } else {
                    inner.deadline_ms = None;
                    if let Err(err) = try_run_locked(&shared, &mut inner, false) {
                        tracing::error!(%err, "scheduled run failed to start");
                    }
                }
            }
        }
    }
}

fn try_run_locked(
    shared: &Arc<SchedShared>,
    inner: &mut SchedInner,
    forced: bool,
) -> SyncResult<RunDecision> {
    if inner.running {
        tracing::debug!(forced, "run skipped, job already in flight");
        return Ok(RunDecision::AlreadyRunning);
    }

    let now_ms = shared.clock.monotonic_ms();
    if !forced {
        if let Some(last_edit) = inner.last_edit_ms {
            let age = now_ms.saturating_sub(last_edit);
            if age < shared.config.recent_edit_ms() {
                let at = shared.clock.now()
                    + chrono::Duration::milliseconds(shared.config.debounce_ms() as i64);
                inner.deadline_ms = Some(now_ms + shared.config.debounce_ms());
                inner.state.scheduled_run_at = Some(at);
                shared.timer_cv.notify_all();
                persist_locked(shared, inner);
                tracing::info!(edit_age_ms = age, "recent edit, run deferred");
                return Ok(RunDecision::Deferred {
                    scheduled_run_at: at,
                });
            }
        }
    }

    inner.running = true;
    inner.deadline_ms = None;
    inner.state.running = true;
    inner.state.scheduled_run_at = None;
    inner.state.last_run_started_at = Some(shared.clock.now());
    persist_locked(shared, inner);

    // A previous worker that already cleared `running` is done with the lock.
    if let Some(finished) = inner.job.take() {
        let _ = finished.join();
    }

    let job_shared = Arc::clone(shared);
    let handle = std::thread::Builder::new()
        .name("daysheet-sync-job".into())
        .spawn(move || run_job(job_shared))
        .map_err(|err| {
            inner.running = false;
            inner.state.running = false;
            persist_locked(shared, inner);
            SyncError::Spawn {
                message: format!("job thread: {err}"),
            }
        })?;
    inner.job = Some(handle);

    tracing::info!(forced, "reconciliation job started");
    Ok(RunDecision::Started)
}

fn run_job(shared: Arc<SchedShared>) {
    let outcome = shared.launcher.launch();

    let mut inner = shared.inner.lock();
    inner.running = false;
    inner.state.running = false;
    inner.state.last_run_finished_at = Some(shared.clock.now());
    match outcome {
        Ok(outcome) => {
            let limit = shared.config.output_log_limit;
            tracing::info!(
                exit_code = ?outcome.exit_code,
                stdout = clip(&outcome.stdout, limit),
                stderr = clip(&outcome.stderr, limit),
                "reconciliation job finished"
            );
            inner.state.last_run_return_code = outcome.exit_code;
        }
        Err(err) => {
            tracing::error!(%err, "reconciliation job failed to launch");
            inner.state.last_run_return_code = None;
        }
    }
    persist_locked(&shared, &mut inner);
}

/// Persist failures are logged, not fatal; the in-memory state stays
/// authoritative.
fn persist_locked(shared: &Arc<SchedShared>, inner: &mut SchedInner) {
    if let Err(err) = shared.sink.save(&inner.state) {
        tracing::warn!(%err, "sync state persist failed");
    }
}

fn clip(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::{JobOutcome, ScriptedLauncher};
    use crate::state::MemoryStateSink;
    use daysheet_core::{ManualClock, SystemClock};

    /// A debounce long enough that the timer thread never fires on its own;
    /// the manual-clock tests drive `try_run` directly.
    fn inert_config() -> SyncConfig {
        SyncConfig::new()
            .with_debounce(Duration::from_secs(3600))
            .with_edit_margin(Duration::from_millis(500))
    }

    fn manual_setup(
        config: SyncConfig,
    ) -> (
        Scheduler,
        Arc<ManualClock>,
        Arc<ScriptedLauncher>,
        Arc<MemoryStateSink>,
    ) {
        let clock = Arc::new(ManualClock::default());
        let launcher = Arc::new(ScriptedLauncher::new());
        let sink = Arc::new(MemoryStateSink::new());
        let scheduler = Scheduler::start(
            config,
            clock.clone() as Arc<dyn Clock>,
            launcher.clone() as Arc<dyn JobLauncher>,
            sink.clone() as Arc<dyn StateSink>,
        )
        .unwrap();
        (scheduler, clock, launcher, sink)
    }

    #[test]
    fn touch_arms_deadline_and_persists() {
        let (scheduler, _clock, _launcher, sink) = manual_setup(inert_config());

        let receipt = scheduler.touch();
        let scheduled = receipt.scheduled_run_at.unwrap();
        assert_eq!(
            scheduled - receipt.last_edit_at,
            chrono::Duration::milliseconds(3_600_000)
        );

        let saved = sink.saved().unwrap();
        assert_eq!(saved.scheduled_run_at, Some(scheduled));
        assert_eq!(saved.last_edit_at, Some(receipt.last_edit_at));
    }

    #[test]
    fn recent_edit_defers_and_rearms() {
        let config = SyncConfig::new()
            .with_debounce(Duration::from_secs(3600))
            .with_edit_margin(Duration::from_secs(600));
        let (scheduler, clock, launcher, _sink) = manual_setup(config);

        scheduler.touch();
        // Edit age 1s, well inside debounce - margin.
        clock.advance_ms(1_000);
        match scheduler.try_run().unwrap() {
            RunDecision::Deferred { scheduled_run_at } => {
                assert_eq!(
                    scheduled_run_at,
                    clock.now() + chrono::Duration::milliseconds(3_600_000)
                );
            }
            other => panic!("expected deferral, got {other:?}"),
        }
        assert_eq!(launcher.launch_count(), 0);

        // Once the edit is old enough the run starts.
        clock.advance_ms(3_600_000);
        assert_eq!(scheduler.try_run().unwrap(), RunDecision::Started);
    }

    #[test]
    fn edit_inside_margin_still_runs() {
        // debounce 10s, margin 500ms: an edit aged 9.7s is past the
        // 9.5s threshold even though the full window has not elapsed.
        let config = SyncConfig::new()
            .with_debounce(Duration::from_secs(10))
            .with_edit_margin(Duration::from_millis(500));
        let (scheduler, clock, _launcher, _sink) = manual_setup(config);

        scheduler.touch();
        clock.advance_ms(9_700);
        assert_eq!(scheduler.try_run().unwrap(), RunDecision::Started);
    }

    #[test]
    fn run_now_bypasses_margin() {
        let (mut scheduler, _clock, launcher, _sink) = manual_setup(inert_config());

        scheduler.touch();
        // Edit is brand new; a debounced attempt would defer.
        assert_eq!(scheduler.run_now().unwrap(), RunDecision::Started);
        scheduler.stop();
        assert_eq!(launcher.launch_count(), 1);
    }

    #[test]
    fn touch_while_running_arms_no_deadline() {
        let clock = Arc::new(ManualClock::default());
        let launcher = Arc::new(ScriptedLauncher::with_delay(Duration::from_millis(200)));
        let sink = Arc::new(MemoryStateSink::new());
        let mut scheduler = Scheduler::start(
            inert_config(),
            clock as Arc<dyn Clock>,
            launcher.clone() as Arc<dyn JobLauncher>,
            sink as Arc<dyn StateSink>,
        )
        .unwrap();

        assert_eq!(scheduler.run_now().unwrap(), RunDecision::Started);

        let receipt = scheduler.touch();
        assert!(receipt.scheduled_run_at.is_none());
        assert_eq!(scheduler.try_run().unwrap(), RunDecision::AlreadyRunning);

        scheduler.stop();
        assert_eq!(launcher.launch_count(), 1);
        // The edit survived even though no deadline was armed.
        assert_eq!(
            scheduler.status().last_edit_at,
            Some(receipt.last_edit_at)
        );
    }

    #[test]
    fn restart_clears_transient_state() {
        let sink = Arc::new(MemoryStateSink::with_state(SyncState {
            running: true,
            scheduled_run_at: Some(Utc::now()),
            last_run_return_code: Some(0),
            ..SyncState::default()
        }));

        let scheduler = Scheduler::start(
            inert_config(),
            Arc::new(ManualClock::default()) as Arc<dyn Clock>,
            Arc::new(ScriptedLauncher::new()) as Arc<dyn JobLauncher>,
            sink.clone() as Arc<dyn StateSink>,
        )
        .unwrap();

        let status = scheduler.status();
        assert!(!status.running);
        assert!(status.scheduled_run_at.is_none());
        assert_eq!(status.last_run_return_code, Some(0));
        // The reset was persisted immediately.
        assert!(!sink.saved().unwrap().running);
    }

    #[test]
    fn worker_records_outcome() {
        let (mut scheduler, _clock, launcher, sink) = manual_setup(inert_config());
        launcher.push_outcome(Ok(JobOutcome::failed(3)));

        assert_eq!(scheduler.run_now().unwrap(), RunDecision::Started);
        scheduler.stop();

        let status = scheduler.status();
        assert!(!status.running);
        assert_eq!(status.last_run_return_code, Some(3));
        assert!(status.last_run_started_at.is_some());
        assert!(status.last_run_finished_at.is_some());
        assert_eq!(sink.saved().unwrap().last_run_return_code, Some(3));
    }

    #[test]
    fn launch_error_clears_running() {
        let (mut scheduler, _clock, launcher, _sink) = manual_setup(inert_config());
        launcher.push_outcome(Err(SyncError::Spawn {
            message: "no such file".into(),
        }));

        assert_eq!(scheduler.run_now().unwrap(), RunDecision::Started);
        scheduler.stop();

        let status = scheduler.status();
        assert!(!status.running);
        assert_eq!(status.last_run_return_code, None);
    }

    #[test]
    fn persist_failure_is_tolerated() {
        let (scheduler, _clock, _launcher, sink) = manual_setup(inert_config());
        sink.fail_saves();

        let receipt = scheduler.touch();
        assert!(receipt.scheduled_run_at.is_some());
        assert_eq!(scheduler.status().last_edit_at, Some(receipt.last_edit_at));
    }

    #[test]
    fn burst_of_touches_coalesces_to_one_run() {
        let config = SyncConfig::new()
            .with_debounce(Duration::from_millis(60))
            .with_edit_margin(Duration::from_millis(20));
        let launcher = Arc::new(ScriptedLauncher::new());
        let sink = Arc::new(MemoryStateSink::new());
        let mut scheduler = Scheduler::start(
            config,
            Arc::new(SystemClock::new()) as Arc<dyn Clock>,
            launcher.clone() as Arc<dyn JobLauncher>,
            sink as Arc<dyn StateSink>,
        )
        .unwrap();

        scheduler.touch();
        std::thread::sleep(Duration::from_millis(10));
        scheduler.touch();
        std::thread::sleep(Duration::from_millis(10));
        scheduler.touch();

        // Well past the final deadline.
        std::thread::sleep(Duration::from_millis(300));
        scheduler.stop();
        assert_eq!(launcher.launch_count(), 1);
    }

    #[test]
    fn spaced_edits_fire_separately() {
        let config = SyncConfig::new()
            .with_debounce(Duration::from_millis(40))
            .with_edit_margin(Duration::from_millis(10));
        let launcher = Arc::new(ScriptedLauncher::new());
        let sink = Arc::new(MemoryStateSink::new());
        let mut scheduler = Scheduler::start(
            config,
            Arc::new(SystemClock::new()) as Arc<dyn Clock>,
            launcher.clone() as Arc<dyn JobLauncher>,
            sink as Arc<dyn StateSink>,
        )
        .unwrap();

        scheduler.touch();
        std::thread::sleep(Duration::from_millis(200));
        scheduler.touch();
        std::thread::sleep(Duration::from_millis(200));

        scheduler.stop();
        assert_eq!(launcher.launch_count(), 2);
    }

    #[test]
    fn clip_respects_char_boundaries() {
        assert_eq!(clip("abcdef", 4), "abcd");
        assert_eq!(clip("abc", 10), "abc");
        // Multi-byte character straddling the limit is dropped whole.
        assert_eq!(clip("aé", 2), "a");
    }
}
