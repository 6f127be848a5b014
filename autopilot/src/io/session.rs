//! Session telemetry snapshot (`.autopilot/session.json`).
//!
//! The snapshot is overwritten wholesale after every state change. It is an
//! export for humans and dashboards; the scheduler never reads it back.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::types::SessionStats;

/// Atomically write the snapshot (temp file + rename).
pub fn write_session(path: &Path, stats: &SessionStats) -> Result<()> {
    debug!(
        path = %path.display(),
        completed = stats.completed_count,
        failed = stats.failed_count,
        skipped = stats.skipped_count,
        "writing session snapshot"
    );
    let mut buf = serde_json::to_string_pretty(stats).context("serialize session stats")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Read a snapshot written by [`write_session`].
pub fn load_session(path: &Path) -> Result<SessionStats> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read session {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse session {}", path.display()))
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("session path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp session {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace session {}", path.display()))?;
    Ok(())
}
