//! Create missing files or directories named by scaffold items.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info};

use super::templates::render_scaffold;
use super::{Handler, confined_join, settle};
use crate::core::router::{RoutingRules, find_source_path};
use crate::core::types::{HandlerResult, WorkItem};

#[derive(Debug, Clone)]
pub struct ScaffoldHandler {
    root: PathBuf,
    rules: RoutingRules,
}

impl ScaffoldHandler {
    pub fn new(root: &Path, rules: RoutingRules) -> Self {
        Self {
            root: root.to_path_buf(),
            rules,
        }
    }

    fn scaffold(&self, item: &WorkItem) -> Result<HandlerResult> {
        let relative = find_source_path(&item.text, &self.rules)
            .ok_or_else(|| anyhow!("no source path in item: {}", item.text))?;
        let target = confined_join(&self.root, relative)?;

        if relative.ends_with('/') {
            if target.is_dir() {
                return Ok(HandlerResult::ok(format!("exists: {relative}")));
            }
            fs::create_dir_all(&target)
                .with_context(|| format!("create directory {}", target.display()))?;
            info!(path = relative, "scaffolded directory");
            return Ok(HandlerResult::ok(format!("created directory {relative}")));
        }

        if target.exists() {
            debug!(path = relative, "scaffold target exists, skipping");
            return Ok(HandlerResult::ok(format!("exists: {relative}")));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let contents = render_scaffold(&target, item)?;
        fs::write(&target, contents).with_context(|| format!("write {}", target.display()))?;
        info!(path = relative, "scaffolded file");
        Ok(HandlerResult::ok(format!("created {relative}")))
    }
}

impl Handler for ScaffoldHandler {
    fn execute(&self, item: &WorkItem) -> HandlerResult {
        settle(self.scaffold(item))
    }
}
