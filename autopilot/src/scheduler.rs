//! The unattended loop: scan, decide, dispatch, record, wait, repeat.
//!
//! One [`Scheduler::tick`] is one iteration. It re-reads the roadmap, computes
//! the actionable set and then does exactly one of:
//!
//! - **cooling**: the consecutive-failure breaker is open; wait out
//!   [`COOLING_PERIOD`] and reset the counter.
//! - **idle**: nothing to do; maybe send a heartbeat and a day summary.
//! - **active**: take the top item and either subdivide it or dispatch it.
//!
//! [`Scheduler::run`] repeats ticks with the configured delays until the
//! [`StopSignal`] fires. Errors from the store, telemetry or git inside an
//! iteration are logged and never end the loop.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};

use crate::commit::{CommitOutcome, CommitPolicy, Committer};
use crate::core::mode::{COOLING_PERIOD, decide, heartbeat_due, summary_due};
use crate::core::router::RoutingRules;
use crate::core::selector::actionable;
use crate::core::subdivider::{is_vague, subdivide};
use crate::core::types::{Category, Mode, SessionStats, WorkItem};
use crate::handlers::{HandlerSet, dispatch};
use crate::io::activity_log::ActivityLog;
use crate::io::clock::Clock;
use crate::io::config::{AutopilotConfig, SchedulerConfig};
use crate::io::init::AutopilotPaths;
use crate::io::notifier::Notifier;
use crate::io::roadmap_store::RoadmapStore;
use crate::io::session::write_session;

/// Longest uninterrupted sleep; the stop signal is polled between slices.
const STOP_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Handler output kept in activity log lines.
const LOGGED_OUTPUT_CHARS: usize = 400;

/// Cooperative stop request: an in-process flag plus an optional sentinel file.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
    sentinel: Option<PathBuf>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also stop when `path` exists.
    pub fn with_sentinel(path: impl Into<PathBuf>) -> Self {
        Self {
            flag: Arc::default(),
            sentinel: Some(path.into()),
        }
    }

    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self.sentinel.as_ref().is_some_and(|path| path.exists())
    }

    /// Remove a consumed sentinel so the next start is not stopped by it.
    fn clear_sentinel(&self) {
        if let Some(path) = &self.sentinel
            && path.exists()
            && let Err(err) = fs::remove_file(path)
        {
            warn!(err = %err, path = %path.display(), "failed to remove stop sentinel");
        }
    }
}

/// Mutable loop state owned by one scheduler instance.
#[derive(Debug, Clone)]
pub struct SchedulerState {
    /// Item texts that failed in this process; never retried until restart.
    pub failed: HashSet<String>,
    pub commit: CommitPolicy,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub last_summary_day: NaiveDate,
    pub iterations: u64,
}

impl SchedulerState {
    pub fn new(started_at: DateTime<Utc>, auto_commit: bool) -> Self {
        Self {
            failed: HashSet::new(),
            commit: CommitPolicy::new(auto_commit),
            last_heartbeat: None,
            last_summary_day: started_at.date_naive(),
            iterations: 0,
        }
    }
}

/// What one iteration did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    Cooling,
    Idle {
        heartbeat: bool,
        summary: bool,
    },
    Subdivided {
        text: String,
        added: usize,
    },
    Dispatched {
        text: String,
        category: Option<Category>,
        success: bool,
    },
}

impl Tick {
    pub fn mode(&self) -> Mode {
        match self {
            Self::Cooling => Mode::Cooling,
            Self::Idle { .. } => Mode::Idle,
            Self::Subdivided { .. } | Self::Dispatched { .. } => Mode::Active,
        }
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cooling => write!(f, "cooling"),
            Self::Idle { heartbeat, summary } => {
                write!(f, "idle (heartbeat: {heartbeat}, summary: {summary})")
            }
            Self::Subdivided { text, added } => {
                write!(f, "subdivided: {text} (+{added} items)")
            }
            Self::Dispatched {
                text,
                category,
                success,
            } => {
                let label = category.map_or("unhandled", Category::label);
                let outcome = if *success { "done" } else { "failed" };
                write!(f, "{outcome} [{label}] {text}")
            }
        }
    }
}

pub struct Scheduler<C, H, N, K> {
    config: SchedulerConfig,
    rules: RoutingRules,
    store: RoadmapStore,
    activity: ActivityLog,
    session_path: PathBuf,
    handlers: H,
    notifier: N,
    committer: K,
    clock: C,
    stop: StopSignal,
    stats: SessionStats,
    state: SchedulerState,
}

impl<C, H, N, K> Scheduler<C, H, N, K>
where
    C: Clock,
    H: HandlerSet,
    N: Notifier,
    K: Committer,
{
    /// Build a scheduler for a fresh session. Prior telemetry is not loaded.
    pub fn new(
        cfg: &AutopilotConfig,
        paths: &AutopilotPaths,
        handlers: H,
        notifier: N,
        committer: K,
        clock: C,
        stop: StopSignal,
    ) -> Self {
        let started_at = clock.now();
        Self {
            config: cfg.scheduler.clone(),
            rules: cfg.routing.clone(),
            store: RoadmapStore::new(paths.roadmap_path(cfg)),
            activity: ActivityLog::new(&paths.activity_log_path),
            session_path: paths.session_path.clone(),
            handlers,
            notifier,
            committer,
            clock,
            stop,
            stats: SessionStats::new(started_at),
            state: SchedulerState::new(started_at, cfg.scheduler.auto_commit),
        }
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn handlers(&self) -> &H {
        &self.handlers
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn committer(&self) -> &K {
        &self.committer
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Loop until stopped. Returns the number of iterations run.
    pub fn run(&mut self) -> u64 {
        let pending = self.current_actionable().len();
        info!(actionable = pending, "autopilot started");
        self.persist();
        self.record(&format!("started: {pending} actionable"));
        self.notify(&format!("autopilot started: {pending} actionable items"));

        let mut ticks = 0u64;
        while !self.stop.is_stopped() {
            let tick = self.tick();
            ticks += 1;
            let delay = self.delay_after(&tick);
            self.pause(delay);
        }

        info!(ticks, "stop requested");
        self.record("stopped");
        self.persist();
        self.stop.clear_sentinel();
        ticks
    }

    /// Run exactly one iteration without any trailing delay.
    #[instrument(skip_all, fields(iteration = self.state.iterations + 1))]
    pub fn tick(&mut self) -> Tick {
        self.state.iterations += 1;
        let candidates = self.current_actionable();
        self.record(&format!("scan: {} actionable", candidates.len()));

        let mode = decide(
            self.stats.consecutive_failures,
            self.config.max_consecutive_failures,
            candidates.len(),
        );
        debug!(?mode, actionable = candidates.len(), "mode decided");
        match (mode, candidates.into_iter().next()) {
            (Mode::Cooling, _) => self.cool_down(),
            (Mode::Active, Some(item)) => self.work(item),
            _ => self.idle(),
        }
    }

    /// Pause applied after `tick` before the next iteration.
    pub fn delay_after(&self, tick: &Tick) -> Duration {
        match tick {
            // The cooling window is waited out inside the tick.
            Tick::Cooling => Duration::ZERO,
            Tick::Idle { .. } => Duration::from_secs(self.config.idle_scan_interval_secs),
            Tick::Subdivided { .. } | Tick::Dispatched { .. } => {
                Duration::from_secs(self.config.cooldown_secs)
            }
        }
    }

    fn current_actionable(&self) -> Vec<WorkItem> {
        actionable(
            self.store.list_items(),
            self.config.skip_future_phases,
            &self.state.failed,
        )
    }

    fn cool_down(&mut self) -> Tick {
        let failures = self.stats.consecutive_failures;
        warn!(failures, "circuit breaker open, cooling");
        self.record(&format!(
            "cooling: {failures} consecutive failures, pausing {}s",
            COOLING_PERIOD.as_secs()
        ));
        self.notify(&format!(
            "autopilot cooling down after {failures} consecutive failures"
        ));
        self.pause(COOLING_PERIOD);

        self.stats.consecutive_failures = 0;
        self.persist();
        self.record("cooling finished, failure counter reset");
        Tick::Cooling
    }

    fn idle(&mut self) -> Tick {
        let now = self.clock.now();
        let heartbeat = heartbeat_due(
            self.state.last_heartbeat,
            now,
            Duration::from_secs(self.config.heartbeat_interval_secs),
        );
        if heartbeat {
            let message = format!(
                "heartbeat: idle, {} completed, {} failed, {} skipped this session",
                self.stats.completed_count, self.stats.failed_count, self.stats.skipped_count
            );
            self.notify(&message);
            self.record(&message);
            self.state.last_heartbeat = Some(now);
        }

        let summary = summary_due(self.state.last_summary_day, now, self.config.nightly_summary);
        if summary {
            let message = format!(
                "summary for {}: {} completed, {} failed, {} skipped, {} ms busy",
                self.state.last_summary_day,
                self.stats.completed_count,
                self.stats.failed_count,
                self.stats.skipped_count,
                self.stats.total_duration_ms
            );
            self.notify(&message);
            self.record(&message);
            self.state.last_summary_day = now.date_naive();
        }
        Tick::Idle { heartbeat, summary }
    }

    fn work(&mut self, item: WorkItem) -> Tick {
        if is_vague(&item.text)
            && let Some(subtasks) = subdivide(&item.text)
        {
            return self.split(item, &subtasks);
        }

        info!(item = %item.text, "dispatching");
        let (category, result) = dispatch(&self.handlers, &item, &self.rules);
        let label = category.map_or("unhandled", Category::label);
        let now = self.clock.now();

        if result.success {
            match self.store.mark_done(&item.text) {
                Ok(true) => {}
                Ok(false) => {
                    self.record(&format!("roadmap entry changed before mark-done: {}", item.text));
                }
                Err(err) => {
                    // Keep a stuck todo entry from being dispatched again and again.
                    self.state.failed.insert(item.text.clone());
                    self.record(&format!("mark-done failed for {}: {err:#}", item.text));
                }
            }
            self.stats.record_success(&item.text, result.duration_ms, now);
            self.persist();
            self.record(&format!(
                "done [{label}] {} ({} ms): {}",
                item.text,
                result.duration_ms,
                excerpt(&result.output)
            ));
            self.notify(&format!("done: {}", item.text));
            self.commit_after_success(&item.text);
        } else {
            self.stats.record_failure(now);
            self.state.failed.insert(item.text.clone());
            self.persist();
            self.record(&format!(
                "failed [{label}] {} (exit {}): {}",
                item.text,
                result.exit_code,
                excerpt(&result.output)
            ));
            self.notify(&format!("failed: {} (exit {})", item.text, result.exit_code));
        }

        Tick::Dispatched {
            text: item.text,
            category,
            success: result.success,
        }
    }

    fn split(&mut self, item: WorkItem, subtasks: &[String]) -> Tick {
        let added = match self.store.append_items(&item.phase_id, subtasks) {
            Ok(added) => added,
            Err(err) => {
                self.record(&format!("append failed for {}: {err:#}", item.text));
                0
            }
        };
        if let Err(err) = self.store.mark_done(&item.text) {
            self.state.failed.insert(item.text.clone());
            self.record(&format!("mark-done failed for {}: {err:#}", item.text));
        }
        self.stats.record_skip(self.clock.now());
        self.persist();
        info!(item = %item.text, added, "subdivided vague item");
        self.record(&format!("subdivided: {} -> {added} subtasks", item.text));
        Tick::Subdivided {
            text: item.text,
            added,
        }
    }

    fn commit_after_success(&mut self, text: &str) {
        match self.state.commit.record_success(&self.committer, text) {
            Ok(CommitOutcome::Committed { message }) => {
                let subject = message.lines().next().unwrap_or_default().to_string();
                self.record(&format!("commit: {subject}"));
            }
            Ok(CommitOutcome::NothingToCommit) => self.record("commit skipped: no changes"),
            Ok(CommitOutcome::Disabled) => self.record("commit skipped: auto-commit disabled"),
            Ok(CommitOutcome::Pending(_)) => {}
            Err(err) => {
                warn!(err = %format!("{err:#}"), "commit failed");
                self.record(&format!("commit failed: {err:#}"));
            }
        }
    }

    /// Sleep in slices so a stop request is honored promptly.
    fn pause(&self, duration: Duration) {
        let mut remaining = duration;
        while !remaining.is_zero() && !self.stop.is_stopped() {
            let slice = remaining.min(STOP_POLL_INTERVAL);
            self.clock.sleep(slice);
            remaining -= slice;
        }
    }

    fn persist(&self) {
        if let Err(err) = write_session(&self.session_path, &self.stats) {
            warn!(err = %format!("{err:#}"), "failed to write session snapshot");
        }
    }

    fn record(&self, message: &str) {
        if let Err(err) = self.activity.append(self.clock.now(), message) {
            warn!(err = %format!("{err:#}"), "failed to append activity log");
        }
    }

    fn notify(&self, text: &str) {
        if self.notifier.post(text).is_none() {
            debug!("notification not acknowledged");
        }
    }
}

fn excerpt(output: &str) -> String {
    let trimmed = output.trim();
    if trimmed.chars().count() <= LOGGED_OUTPUT_CHARS {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(LOGGED_OUTPUT_CHARS).collect();
    cut.push_str("...");
    cut
}
