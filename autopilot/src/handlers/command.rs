//! Register commands in the project's command registry (TOML).
//!
//! ```toml
//! [[command]]
//! name = "status"
//! source = "Register a status command"
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::naming::{near_anchor, quoted, slash_token};
use super::{Handler, settle};
use crate::core::types::{HandlerResult, WorkItem};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRegistry {
    #[serde(default, rename = "command")]
    pub commands: Vec<CommandEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEntry {
    pub name: String,
    /// Roadmap item that requested the command.
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct CommandHandler {
    registry_path: PathBuf,
}

impl CommandHandler {
    pub fn new(registry_path: PathBuf) -> Self {
        Self { registry_path }
    }

    fn register(&self, item: &WorkItem) -> Result<HandlerResult> {
        let name = command_name(&item.text)
            .ok_or_else(|| anyhow!("cannot determine command name from: {}", item.text))?;
        let mut registry = self.load()?;
        if registry.commands.iter().any(|entry| entry.name == name) {
            return Ok(HandlerResult::ok(format!("command {name} already registered")));
        }
        registry.commands.push(CommandEntry {
            name: name.clone(),
            source: item.text.clone(),
        });
        self.save(&registry)?;
        info!(command = %name, "registered command");
        Ok(HandlerResult::ok(format!("registered command {name}")))
    }

    pub fn load(&self) -> Result<CommandRegistry> {
        let raw = match fs::read_to_string(&self.registry_path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(CommandRegistry::default()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("read {}", self.registry_path.display()));
            }
        };
        toml::from_str(&raw).with_context(|| format!("parse {}", self.registry_path.display()))
    }

    fn save(&self, registry: &CommandRegistry) -> Result<()> {
        if let Some(parent) = self.registry_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let buf = toml::to_string_pretty(registry).context("serialize command registry")?;
        fs::write(&self.registry_path, buf)
            .with_context(|| format!("write {}", self.registry_path.display()))
    }
}

impl Handler for CommandHandler {
    fn execute(&self, item: &WorkItem) -> HandlerResult {
        settle(self.register(item))
    }
}

fn command_name(text: &str) -> Option<String> {
    slash_token(text)
        .or_else(|| quoted(text))
        .or_else(|| near_anchor(text, &["command", "subcommand"]))
        .map(|name| name.trim_start_matches('/').to_lowercase())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ItemStatus;

    fn item(text: &str) -> WorkItem {
        WorkItem {
            phase_id: "cli".to_string(),
            phase_name: "CLI".to_string(),
            phase_index: 0,
            index_in_phase: 0,
            text: text.to_string(),
            future: false,
            status: ItemStatus::Todo,
        }
    }

    #[test]
    fn extracts_command_names() {
        assert_eq!(command_name("Add /pause to the bot").as_deref(), Some("pause"));
        assert_eq!(command_name("Register a Status command").as_deref(), Some("status"));
        assert_eq!(command_name("Expose `plan` subcommand").as_deref(), Some("plan"));
        assert_eq!(command_name("Register command"), None);
    }

    #[test]
    fn registration_is_idempotent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let handler = CommandHandler::new(temp.path().join("commands.toml"));

        let first = handler.execute(&item("Register a status command"));
        assert!(first.success, "{}", first.output);
        let after_first = fs::read_to_string(temp.path().join("commands.toml")).expect("read");

        let second = handler.execute(&item("Add status command to the CLI"));
        assert!(second.success);
        assert_eq!(second.output, "command status already registered");
        let after_second = fs::read_to_string(temp.path().join("commands.toml")).expect("read");
        assert_eq!(after_first, after_second);

        let registry = handler.load().expect("load");
        assert_eq!(
            registry.commands,
            vec![CommandEntry {
                name: "status".to_string(),
                source: "Register a status command".to_string(),
            }]
        );
    }

    #[test]
    fn unnamed_command_fails() {
        let temp = tempfile::tempdir().expect("tempdir");
        let handler = CommandHandler::new(temp.path().join("commands.toml"));
        let result = handler.execute(&item("Register command"));
        assert!(!result.success);
        assert!(result.output.contains("cannot determine command name"));
    }
}
