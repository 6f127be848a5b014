//! Deterministic selection of the actionable set.

use std::collections::HashSet;

use crate::core::scorer::sort_by_priority;
use crate::core::types::{ItemStatus, WorkItem};

/// True if the item may be selected this iteration.
pub fn is_actionable(item: &WorkItem, skip_future: bool, failed: &HashSet<String>) -> bool {
    item.status == ItemStatus::Todo && !(skip_future && item.future) && !failed.contains(&item.text)
}

/// Filter `items` down to the actionable set, ordered by descending score.
///
/// `items` must be in document order (phase, then in-phase) so that ties
/// resolve to the earlier entry.
pub fn actionable(
    items: Vec<WorkItem>,
    skip_future: bool,
    failed: &HashSet<String>,
) -> Vec<WorkItem> {
    let mut selected: Vec<WorkItem> = items
        .into_iter()
        .filter(|item| is_actionable(item, skip_future, failed))
        .collect();
    sort_by_priority(&mut selected);
    selected
}
