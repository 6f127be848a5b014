//! Execution handlers, one per routing category.
//!
//! Handlers never return `Err` to the scheduler: internal failures are folded
//! into a failed [`HandlerResult`] so a single bad item cannot stop the loop.

use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use anyhow::{Result, bail};
use tracing::{debug, instrument, warn};

use crate::core::router::{RoutingRules, route};
use crate::core::types::{Category, HandlerResult, WorkItem};
use crate::io::config::{AutopilotConfig, HandlerConfig, ShellConfig};

pub mod build;
pub mod channel;
pub mod command;
mod naming;
pub mod scaffold;
pub mod shell;
mod templates;
pub mod wiring;

/// Exit code reported for handler-internal errors and unhandled items.
pub const HANDLER_ERROR_EXIT_CODE: i32 = 1;

/// A single category's action.
pub trait Handler {
    fn execute(&self, item: &WorkItem) -> HandlerResult;
}

/// The full set of category handlers the router dispatches into.
pub trait HandlerSet {
    fn handle(&self, category: Category, item: &WorkItem) -> HandlerResult;
}

/// Route `item` and run the selected handler.
///
/// Returns the category (if any matched) together with the result. Items that
/// match no route produce a failed result naming the item text.
#[instrument(skip_all, fields(item = %item.text))]
pub fn dispatch<H: HandlerSet + ?Sized>(
    handlers: &H,
    item: &WorkItem,
    rules: &RoutingRules,
) -> (Option<Category>, HandlerResult) {
    let Some(category) = route(&item.text, rules) else {
        warn!("no handler matches item");
        return (
            None,
            HandlerResult::failed(
                format!("no handler matches item: {}", item.text),
                HANDLER_ERROR_EXIT_CODE,
            ),
        );
    };
    debug!(category = category.label(), "dispatching");
    let started = Instant::now();
    let mut result = handlers.handle(category, item);
    if result.duration_ms == 0 {
        result.duration_ms = started.elapsed().as_millis() as u64;
    }
    (Some(category), result)
}

/// Filesystem-backed handlers rooted at the project directory.
#[derive(Debug, Clone)]
pub struct FsHandlers {
    pub scaffold: scaffold::ScaffoldHandler,
    pub command: command::CommandHandler,
    pub wiring: wiring::WiringHandler,
    pub shell: shell::ShellHandler,
    pub build: build::BuildHandler,
    pub channel: channel::ChannelHandler,
}

impl FsHandlers {
    pub fn new(root: &Path, config: &AutopilotConfig) -> Self {
        Self::from_parts(root, &config.handlers, &config.shell, &config.routing)
    }

    pub fn from_parts(
        root: &Path,
        handlers: &HandlerConfig,
        shell: &ShellConfig,
        rules: &RoutingRules,
    ) -> Self {
        Self {
            scaffold: scaffold::ScaffoldHandler::new(root, rules.clone()),
            command: command::CommandHandler::new(root.join(&handlers.commands_file)),
            wiring: wiring::WiringHandler::new(rules.clone()),
            shell: shell::ShellHandler::new(root, shell.clone()),
            build: build::BuildHandler::new(
                root.join(&handlers.stub_dir),
                root.join(&handlers.schema_dir),
            ),
            channel: channel::ChannelHandler::new(root.join(&handlers.channels_file)),
        }
    }
}

impl HandlerSet for FsHandlers {
    fn handle(&self, category: Category, item: &WorkItem) -> HandlerResult {
        match category {
            Category::Scaffold => self.scaffold.execute(item),
            Category::Command => self.command.execute(item),
            Category::Wiring => self.wiring.execute(item),
            Category::Shell => self.shell.execute(item),
            Category::Build => self.build.execute(item),
            Category::Channel => self.channel.execute(item),
        }
    }
}

/// Fold a fallible handler body into a result.
pub(crate) fn settle(outcome: Result<HandlerResult>) -> HandlerResult {
    outcome.unwrap_or_else(|err| {
        warn!(err = %format!("{err:#}"), "handler failed");
        HandlerResult::failed(format!("{err:#}"), HANDLER_ERROR_EXIT_CODE)
    })
}

/// Join a roadmap-supplied relative path onto `root`, refusing anything that
/// could escape it.
pub(crate) fn confined_join(root: &Path, relative: &str) -> Result<PathBuf> {
    let rel = Path::new(relative);
    if rel.as_os_str().is_empty() {
        bail!("empty path");
    }
    for component in rel.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => bail!("path escapes the project root: {relative}"),
        }
    }
    Ok(root.join(rel))
}
