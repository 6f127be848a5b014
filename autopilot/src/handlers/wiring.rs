//! Acknowledge cross-module wiring requests without touching code.
//!
//! The integration point named by the item may not exist yet, so the handler
//! only records which one was referenced.

use tracing::info;

use super::Handler;
use crate::core::router::RoutingRules;
use crate::core::types::{HandlerResult, WorkItem};

#[derive(Debug, Clone)]
pub struct WiringHandler {
    rules: RoutingRules,
}

impl WiringHandler {
    pub fn new(rules: RoutingRules) -> Self {
        Self { rules }
    }
}

impl Handler for WiringHandler {
    fn execute(&self, item: &WorkItem) -> HandlerResult {
        let lower = item.text.to_lowercase();
        let points: Vec<&str> = self
            .rules
            .integration_points
            .iter()
            .filter(|point| lower.contains(&point.to_lowercase()))
            .map(String::as_str)
            .collect();
        info!(points = ?points, "wiring intent noted");
        if points.is_empty() {
            HandlerResult::ok(format!("noted wiring intent: {}", item.text))
        } else {
            HandlerResult::ok(format!(
                "noted wiring intent ({}): {}",
                points.join(", "),
                item.text
            ))
        }
    }
}
