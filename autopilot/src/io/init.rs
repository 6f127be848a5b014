//! Canonical `.autopilot/` layout and `autopilot init` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::info;

use super::config::{AutopilotConfig, write_config};

/// All canonical paths within `.autopilot/` for a project root.
#[derive(Debug, Clone)]
pub struct AutopilotPaths {
    pub root: PathBuf,
    pub state_dir: PathBuf,
    pub gitignore_path: PathBuf,
    pub config_path: PathBuf,
    pub session_path: PathBuf,
    pub activity_log_path: PathBuf,
    /// Creating this file asks a running loop to stop.
    pub stop_path: PathBuf,
}

impl AutopilotPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let state_dir = root.join(".autopilot");
        Self {
            root: root.clone(),
            state_dir: state_dir.clone(),
            gitignore_path: state_dir.join(".gitignore"),
            config_path: state_dir.join("config.toml"),
            session_path: state_dir.join("session.json"),
            activity_log_path: state_dir.join("activity.log"),
            stop_path: state_dir.join("STOP"),
        }
    }

    /// Roadmap location from config, resolved against the project root.
    pub fn roadmap_path(&self, cfg: &AutopilotConfig) -> PathBuf {
        self.root.join(&cfg.roadmap)
    }
}

/// Options for `init_autopilot`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Overwrite an existing config. The roadmap is never overwritten.
    pub force: bool,
}

/// Create `.autopilot/` with a default config, plus an example roadmap when
/// the project has none.
pub fn init_autopilot(root: &Path, options: &InitOptions) -> Result<AutopilotPaths> {
    let paths = AutopilotPaths::new(root);
    if paths.config_path.exists() && !options.force {
        return Err(anyhow!(
            "autopilot init: {} already exists (use --force to overwrite)",
            paths.config_path.display()
        ));
    }
    if paths.state_dir.exists() && !paths.state_dir.is_dir() {
        return Err(anyhow!(
            "autopilot init: .autopilot exists but is not a directory"
        ));
    }

    fs::create_dir_all(&paths.state_dir)
        .with_context(|| format!("create directory {}", paths.state_dir.display()))?;
    write_file(&paths.gitignore_path, STATE_GITIGNORE)?;
    let cfg = AutopilotConfig::default();
    write_config(&paths.config_path, &cfg)?;

    let roadmap = paths.roadmap_path(&cfg);
    if !roadmap.exists() {
        write_file(&roadmap, EXAMPLE_ROADMAP)?;
        info!(path = %roadmap.display(), "wrote example roadmap");
    }
    Ok(paths)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write file {}", path.display()))
}

/// Telemetry and control files stay out of the batch commits.
const STATE_GITIGNORE: &str = "session.json\nactivity.log\nSTOP\n*.tmp\n";

const EXAMPLE_ROADMAP: &str = "# Roadmap

Items are picked up by `autopilot run`. Mark an item `[~]` to keep the loop away from it.

<!-- phase id=\"foundation\" name=\"Foundation\" -->
- [ ] Create src/engine.rs skeleton
- [ ] Register a status command
- [ ] Test the roadmap parser
<!-- /phase -->

<!-- phase id=\"later\" name=\"Later\" future=\"true\" -->
- [ ] Wire retries into the scheduler
- [ ] Define schema for audit events <!-- now -->
<!-- /phase -->
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::{ConfigOverrides, load_config};
    use crate::io::roadmap_store::RoadmapStore;

    #[test]
    fn init_creates_layout_and_example_roadmap() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_autopilot(temp.path(), &InitOptions { force: false }).expect("init");

        assert!(paths.state_dir.is_dir());
        assert_eq!(
            fs::read_to_string(&paths.gitignore_path).expect("read"),
            STATE_GITIGNORE
        );
        let cfg = load_config(&paths.config_path, &ConfigOverrides::default()).expect("load");
        assert_eq!(cfg, AutopilotConfig::default());

        let items = RoadmapStore::new(paths.roadmap_path(&cfg)).list_items();
        assert_eq!(items.len(), 5);
        assert!(items[3].future);
        assert!(!items[4].future);
    }

    #[test]
    fn init_refuses_existing_config_without_force() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_autopilot(temp.path(), &InitOptions { force: false }).expect("init");
        let err = init_autopilot(temp.path(), &InitOptions { force: false }).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn force_keeps_a_human_roadmap() {
        let temp = tempfile::tempdir().expect("tempdir");
        let roadmap = temp.path().join("ROADMAP.md");
        fs::write(&roadmap, "# Mine\n").expect("write");
        init_autopilot(temp.path(), &InitOptions { force: false }).expect("init");
        init_autopilot(temp.path(), &InitOptions { force: true }).expect("re-init");
        assert_eq!(fs::read_to_string(&roadmap).expect("read"), "# Mine\n");
    }
}
