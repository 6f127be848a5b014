//! Test doubles and fixtures shared by unit and integration tests.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::{DateTime, TimeZone, Utc};

use crate::commit::Committer;
use crate::core::types::{Category, HandlerResult, ItemStatus, WorkItem};
use crate::handlers::HandlerSet;
use crate::io::clock::Clock;
use crate::io::config::AutopilotConfig;
use crate::io::init::AutopilotPaths;
use crate::io::notifier::Notifier;
use crate::scheduler::StopSignal;

/// `1970-01-01T00:00:00Z + secs`.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// A `todo` item in phase `core`.
pub fn work_item(text: &str, phase_index: usize) -> WorkItem {
    WorkItem {
        phase_id: "core".to_string(),
        phase_name: "Core".to_string(),
        phase_index,
        index_in_phase: 0,
        text: text.to_string(),
        future: false,
        status: ItemStatus::Todo,
    }
}

/// Simulated clock: `sleep` advances time instantly.
///
/// Optionally requests a stop once simulated time reaches a deadline, which
/// lets tests drive [`crate::scheduler::Scheduler::run`] to completion.
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<DateTime<Utc>>,
    slept: Cell<Duration>,
    stop_at: RefCell<Option<(DateTime<Utc>, StopSignal)>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Cell::new(start),
            slept: Cell::new(Duration::ZERO),
            stop_at: RefCell::new(None),
        }
    }

    pub fn stop_at(self, deadline: DateTime<Utc>, stop: StopSignal) -> Self {
        *self.stop_at.borrow_mut() = Some((deadline, stop));
        self
    }

    pub fn advance(&self, by: Duration) {
        let step = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
        self.now.set(self.now.get() + step);
    }

    /// Total simulated time spent in `sleep`.
    pub fn slept(&self) -> Duration {
        self.slept.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
        self.slept.set(self.slept.get() + duration);
        if let Some((deadline, stop)) = self.stop_at.borrow().as_ref()
            && self.now.get() >= *deadline
        {
            stop.request_stop();
        }
    }
}

/// Notifier that records every message.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: RefCell<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }

    pub fn count_starting_with(&self, prefix: &str) -> usize {
        self.messages
            .borrow()
            .iter()
            .filter(|message| message.starts_with(prefix))
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn post(&self, text: &str) -> Option<String> {
        let mut messages = self.messages.borrow_mut();
        messages.push(text.to_string());
        Some(format!("msg-{}", messages.len()))
    }
}

/// Handler set with per-text scripted results; unscripted items succeed.
#[derive(Debug, Default)]
pub struct ScriptedHandlers {
    results: HashMap<String, HandlerResult>,
    calls: RefCell<Vec<(Category, String)>>,
}

impl ScriptedHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, text: &str, result: HandlerResult) -> Self {
        self.results.insert(text.to_string(), result);
        self
    }

    pub fn calls(&self) -> Vec<(Category, String)> {
        self.calls.borrow().clone()
    }
}

impl HandlerSet for ScriptedHandlers {
    fn handle(&self, category: Category, item: &WorkItem) -> HandlerResult {
        self.calls
            .borrow_mut()
            .push((category, item.text.clone()));
        self.results
            .get(&item.text)
            .cloned()
            .unwrap_or_else(|| HandlerResult::ok(format!("handled {}", item.text)).with_duration_ms(10))
    }
}

/// Committer that records stage/commit calls instead of touching git.
#[derive(Debug, Default)]
pub struct RecordingCommitter {
    dirty: Cell<bool>,
    fail: Cell<bool>,
    stages: Cell<u32>,
    commits: RefCell<Vec<String>>,
}

impl RecordingCommitter {
    /// Pretend the working tree always has changes to commit.
    pub fn dirty() -> Self {
        let committer = Self::default();
        committer.dirty.set(true);
        committer
    }

    pub fn failing() -> Self {
        let committer = Self::default();
        committer.fail.set(true);
        committer
    }

    pub fn stages(&self) -> u32 {
        self.stages.get()
    }

    pub fn commits(&self) -> Vec<String> {
        self.commits.borrow().clone()
    }
}

impl Committer for RecordingCommitter {
    fn stage_all(&self) -> Result<()> {
        self.stages.set(self.stages.get() + 1);
        if self.fail.get() {
            return Err(anyhow!("staging failed"));
        }
        Ok(())
    }

    fn commit_staged(&self, message: &str) -> Result<bool> {
        if !self.dirty.get() {
            return Ok(false);
        }
        self.commits.borrow_mut().push(message.to_string());
        Ok(true)
    }
}

/// A temporary project with a roadmap and a zero-delay config.
pub struct TestProject {
    _temp: tempfile::TempDir,
    pub paths: AutopilotPaths,
    pub config: AutopilotConfig,
}

impl TestProject {
    pub fn new(roadmap: &str) -> Result<Self> {
        let temp = tempfile::tempdir()?;
        let paths = AutopilotPaths::new(temp.path());
        let mut config = AutopilotConfig::default();
        config.scheduler.cooldown_secs = 0;
        config.scheduler.idle_scan_interval_secs = 60;
        config.scheduler.heartbeat_interval_secs = 600;
        fs::write(paths.roadmap_path(&config), roadmap)?;
        Ok(Self {
            _temp: temp,
            paths,
            config,
        })
    }

    pub fn root(&self) -> &Path {
        &self.paths.root
    }

    pub fn roadmap_path(&self) -> PathBuf {
        self.paths.roadmap_path(&self.config)
    }

    pub fn read_roadmap(&self) -> Result<String> {
        Ok(fs::read_to_string(self.roadmap_path())?)
    }

    pub fn write_roadmap(&self, contents: &str) -> Result<()> {
        Ok(fs::write(self.roadmap_path(), contents)?)
    }

    pub fn read_activity_log(&self) -> Result<String> {
        Ok(fs::read_to_string(&self.paths.activity_log_path)?)
    }
}
