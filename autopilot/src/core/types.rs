//! Shared deterministic types for autopilot core logic.
//!
//! These types define stable contracts between core components. They should not
//! depend on external state or I/O and must remain deterministic across runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Checklist status as stored in the roadmap document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Todo,
    Wip,
    Done,
}

impl ItemStatus {
    /// Parse the single character between the checklist brackets.
    pub fn from_marker(marker: char) -> Option<Self> {
        match marker {
            ' ' => Some(Self::Todo),
            '~' => Some(Self::Wip),
            'x' | 'X' => Some(Self::Done),
            _ => None,
        }
    }

    pub fn marker(self) -> char {
        match self {
            Self::Todo => ' ',
            Self::Wip => '~',
            Self::Done => 'x',
        }
    }
}

/// A single unit of prospective work extracted from the roadmap.
///
/// Identity is the exact `text`; it is the key used for every document mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkItem {
    pub phase_id: String,
    pub phase_name: String,
    /// Ordinal of the owning phase (0-based, lower = earlier).
    pub phase_index: usize,
    pub index_in_phase: usize,
    pub text: String,
    /// Belongs to a roadmap phase that is not active yet.
    pub future: bool,
    pub status: ItemStatus,
}

/// Uniform value returned by every handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerResult {
    pub success: bool,
    pub output: String,
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl HandlerResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            exit_code: 0,
            duration_ms: 0,
        }
    }

    pub fn failed(output: impl Into<String>, exit_code: i32) -> Self {
        Self {
            success: false,
            output: output.into(),
            exit_code,
            duration_ms: 0,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

/// Handler category selected by the dispatch router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Scaffold,
    Command,
    Wiring,
    Shell,
    Build,
    Channel,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Self::Scaffold => "scaffold",
            Self::Command => "command",
            Self::Wiring => "wiring",
            Self::Shell => "shell",
            Self::Build => "build",
            Self::Channel => "channel",
        }
    }
}

/// Scheduler mode for one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Actionable set non-empty.
    Active,
    /// Actionable set empty.
    Idle,
    /// Consecutive failures reached the configured threshold.
    Cooling,
}

/// Number of completed item texts kept in the session history.
pub const COMPLETED_HISTORY_LIMIT: usize = 50;

/// Counters and history describing the current process's run.
///
/// Persisted as a whole snapshot after every mutation; never reloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub started_at: DateTime<Utc>,
    pub completed_count: u64,
    pub failed_count: u64,
    pub skipped_count: u64,
    pub consecutive_failures: u32,
    pub total_duration_ms: u64,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub completed_texts: Vec<String>,
}

impl SessionStats {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            completed_count: 0,
            failed_count: 0,
            skipped_count: 0,
            consecutive_failures: 0,
            total_duration_ms: 0,
            last_activity_at: None,
            completed_texts: Vec::new(),
        }
    }

    pub fn record_success(&mut self, text: &str, duration_ms: u64, at: DateTime<Utc>) {
        self.completed_count += 1;
        self.consecutive_failures = 0;
        self.total_duration_ms = self.total_duration_ms.saturating_add(duration_ms);
        self.completed_texts.push(text.to_string());
        if self.completed_texts.len() > COMPLETED_HISTORY_LIMIT {
            let excess = self.completed_texts.len() - COMPLETED_HISTORY_LIMIT;
            self.completed_texts.drain(..excess);
        }
        self.last_activity_at = Some(at);
    }

    pub fn record_failure(&mut self, at: DateTime<Utc>) {
        self.failed_count += 1;
        self.consecutive_failures += 1;
        self.last_activity_at = Some(at);
    }

    pub fn record_skip(&mut self, at: DateTime<Utc>) {
        self.skipped_count += 1;
        self.last_activity_at = Some(at);
    }
}
