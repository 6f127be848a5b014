//! Dry-run view of the actionable set for `autopilot plan`.

use std::collections::HashSet;
use std::fmt::Write as _;

use anyhow::{Context, Result};

use crate::core::router::{RoutingRules, route};
use crate::core::scorer::score;
use crate::core::selector::actionable;
use crate::core::subdivider::{is_vague, subdivide};
use crate::core::types::{Category, WorkItem};
use crate::io::config::AutopilotConfig;
use crate::io::init::AutopilotPaths;
use crate::io::roadmap_store::RoadmapStore;

/// One actionable item with the decisions the loop would make for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedItem {
    pub score: i64,
    /// `None` when the item would fail as unhandled.
    pub category: Option<Category>,
    /// The item would be split instead of dispatched.
    pub subdivides: bool,
    pub item: WorkItem,
}

/// Score and route an in-memory item list, in dispatch order.
pub fn plan_items(items: Vec<WorkItem>, skip_future: bool, rules: &RoutingRules) -> Vec<PlannedItem> {
    actionable(items, skip_future, &HashSet::new())
        .into_iter()
        .map(|item| PlannedItem {
            score: score(&item),
            category: route(&item.text, rules),
            subdivides: is_vague(&item.text) && subdivide(&item.text).is_some(),
            item,
        })
        .collect()
}

/// Load the configured roadmap and plan it. A missing roadmap is an error here,
/// unlike in the loop, so `plan` can tell the user about it.
pub fn plan_from_root(paths: &AutopilotPaths, cfg: &AutopilotConfig) -> Result<Vec<PlannedItem>> {
    let store = RoadmapStore::new(paths.roadmap_path(cfg));
    let doc = store.load().context("load roadmap for planning")?;
    Ok(plan_items(
        doc.items(),
        cfg.scheduler.skip_future_phases,
        &cfg.routing,
    ))
}

/// One line per item: score, category, phase, text.
pub fn render_plan(planned: &[PlannedItem]) -> String {
    let mut out = String::new();
    for entry in planned {
        let category = if entry.subdivides {
            "subdivide"
        } else {
            entry.category.map_or("unhandled", Category::label)
        };
        let _ = writeln!(
            out,
            "{:>4}  {:<9}  [{}] {}",
            entry.score, category, entry.item.phase_id, entry.item.text
        );
    }
    out
}
