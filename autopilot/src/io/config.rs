//! Autopilot configuration stored under `.autopilot/config.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::router::RoutingRules;

/// Autopilot configuration (TOML).
///
/// This file is intended to be edited by humans. Missing fields default to
/// the values below; CLI flags override whatever the file says.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AutopilotConfig {
    /// Roadmap document, relative to the project root.
    pub roadmap: PathBuf,
    pub scheduler: SchedulerConfig,
    pub shell: ShellConfig,
    pub handlers: HandlerConfig,
    pub routing: RoutingRules,
    pub notify: NotifyConfig,
}

/// Loop timing and policy knobs. Immutable for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Pause after each active iteration.
    pub cooldown_secs: u64,
    /// Pause between scans while idle.
    pub idle_scan_interval_secs: u64,
    /// Minimum spacing between idle heartbeats.
    pub heartbeat_interval_secs: u64,
    /// Accepted for compatibility; dispatch is strictly sequential.
    pub max_concurrent: u32,
    pub skip_future_phases: bool,
    /// Consecutive failures that trip the circuit breaker.
    pub max_consecutive_failures: u32,
    pub auto_commit: bool,
    pub nightly_summary: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 30,
            idle_scan_interval_secs: 300,
            heartbeat_interval_secs: 3600,
            max_concurrent: 1,
            skip_future_phases: true,
            max_consecutive_failures: 3,
            auto_commit: true,
            nightly_summary: true,
        }
    }
}

/// Shell handler settings: keyword to fixed command mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShellConfig {
    /// Hard wall-clock limit per command.
    pub timeout_secs: u64,
    /// Truncate captured stdout/stderr beyond this many bytes (per stream).
    pub output_limit_bytes: usize,
    /// Keyword (matched as a word stem) to argv. Checked in key order.
    pub commands: BTreeMap<String, Vec<String>>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        let mut commands = BTreeMap::new();
        commands.insert(
            "bench".to_string(),
            vec!["cargo".to_string(), "bench".to_string()],
        );
        commands.insert(
            "lint".to_string(),
            vec![
                "cargo".to_string(),
                "clippy".to_string(),
                "--all-targets".to_string(),
            ],
        );
        commands.insert(
            "test".to_string(),
            vec!["cargo".to_string(), "test".to_string()],
        );
        Self {
            timeout_secs: 5 * 60,
            output_limit_bytes: 100_000,
            commands,
        }
    }
}

/// File locations used by the built-in handlers, relative to the project root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HandlerConfig {
    /// Registry of commands added by command-registration items.
    pub commands_file: PathBuf,
    /// Registry of channels / integration points.
    pub channels_file: PathBuf,
    /// Directory for generated source stubs.
    pub stub_dir: PathBuf,
    /// Directory for generated data-definition schemas.
    pub schema_dir: PathBuf,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            commands_file: PathBuf::from("commands.toml"),
            channels_file: PathBuf::from("channels.toml"),
            stub_dir: PathBuf::from("src/generated"),
            schema_dir: PathBuf::from("schemas"),
        }
    }
}

/// Outbound status reporting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct NotifyConfig {
    /// Command that receives each message on stdin. When empty, messages are
    /// only written to the log.
    pub command: Vec<String>,
}

impl Default for AutopilotConfig {
    fn default() -> Self {
        Self {
            roadmap: PathBuf::from("ROADMAP.md"),
            scheduler: SchedulerConfig::default(),
            shell: ShellConfig::default(),
            handlers: HandlerConfig::default(),
            routing: RoutingRules::default(),
            notify: NotifyConfig::default(),
        }
    }
}

impl AutopilotConfig {
    pub fn validate(&self) -> Result<()> {
        if self.roadmap.as_os_str().is_empty() {
            return Err(anyhow!("roadmap must be a non-empty path"));
        }
        if self.scheduler.idle_scan_interval_secs == 0 {
            return Err(anyhow!("scheduler.idle_scan_interval_secs must be > 0"));
        }
        if self.scheduler.max_consecutive_failures == 0 {
            return Err(anyhow!("scheduler.max_consecutive_failures must be > 0"));
        }
        if self.scheduler.max_concurrent == 0 {
            return Err(anyhow!("scheduler.max_concurrent must be > 0"));
        }
        if self.shell.timeout_secs == 0 {
            return Err(anyhow!("shell.timeout_secs must be > 0"));
        }
        if self.shell.output_limit_bytes == 0 {
            return Err(anyhow!("shell.output_limit_bytes must be > 0"));
        }
        for (keyword, argv) in &self.shell.commands {
            if argv.is_empty() || argv[0].trim().is_empty() {
                return Err(anyhow!("shell.commands.{keyword} must be a non-empty array"));
            }
        }
        if !self.notify.command.is_empty() && self.notify.command[0].trim().is_empty() {
            return Err(anyhow!("notify.command must start with a program name"));
        }
        if self.scheduler.max_concurrent > 1 {
            warn!(
                max_concurrent = self.scheduler.max_concurrent,
                "max_concurrent > 1 is accepted but dispatch stays sequential"
            );
        }
        Ok(())
    }
}

/// Overrides collected from command-line flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub roadmap: Option<PathBuf>,
    pub cooldown_secs: Option<u64>,
    pub idle_scan_interval_secs: Option<u64>,
    pub heartbeat_interval_secs: Option<u64>,
    pub no_commit: bool,
    pub include_future: bool,
    pub no_nightly: bool,
}

impl ConfigOverrides {
    pub fn apply(&self, cfg: &mut AutopilotConfig) {
        if let Some(roadmap) = &self.roadmap {
            cfg.roadmap = roadmap.clone();
        }
        if let Some(secs) = self.cooldown_secs {
            cfg.scheduler.cooldown_secs = secs;
        }
        if let Some(secs) = self.idle_scan_interval_secs {
            cfg.scheduler.idle_scan_interval_secs = secs;
        }
        if let Some(secs) = self.heartbeat_interval_secs {
            cfg.scheduler.heartbeat_interval_secs = secs;
        }
        if self.no_commit {
            cfg.scheduler.auto_commit = false;
        }
        if self.include_future {
            cfg.scheduler.skip_future_phases = false;
        }
        if self.no_nightly {
            cfg.scheduler.nightly_summary = false;
        }
    }
}

/// Load config from a TOML file, then apply CLI overrides and validate.
///
/// If the file is missing, starts from `AutopilotConfig::default()`.
pub fn load_config(path: &Path, overrides: &ConfigOverrides) -> Result<AutopilotConfig> {
    let mut cfg = if path.exists() {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?
    } else {
        AutopilotConfig::default()
    };
    overrides.apply(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AutopilotConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
