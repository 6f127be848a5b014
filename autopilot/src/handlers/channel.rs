//! Maintain the list of registered channels / integration points.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::naming::{near_anchor, quoted};
use super::{Handler, settle};
use crate::core::types::{HandlerResult, WorkItem};

/// `channels = ["ops-alerts", ...]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelList {
    #[serde(default)]
    pub channels: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ChannelHandler {
    list_path: PathBuf,
}

impl ChannelHandler {
    pub fn new(list_path: PathBuf) -> Self {
        Self { list_path }
    }

    fn register(&self, item: &WorkItem) -> Result<HandlerResult> {
        let name = channel_name(&item.text)
            .ok_or_else(|| anyhow!("cannot determine channel name from: {}", item.text))?;
        let mut list = self.load()?;
        if list.channels.contains(&name) {
            return Ok(HandlerResult::ok(format!("channel {name} already registered")));
        }
        list.channels.push(name.clone());
        self.save(&list)?;
        info!(channel = %name, "registered channel");
        Ok(HandlerResult::ok(format!("registered channel {name}")))
    }

    pub fn load(&self) -> Result<ChannelList> {
        match fs::read_to_string(&self.list_path) {
            Ok(raw) => toml::from_str(&raw)
                .with_context(|| format!("parse {}", self.list_path.display())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(ChannelList::default()),
            Err(err) => Err(err).with_context(|| format!("read {}", self.list_path.display())),
        }
    }

    fn save(&self, list: &ChannelList) -> Result<()> {
        if let Some(parent) = self.list_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let buf = toml::to_string_pretty(list).context("serialize channel list")?;
        fs::write(&self.list_path, buf)
            .with_context(|| format!("write {}", self.list_path.display()))
    }
}

impl Handler for ChannelHandler {
    fn execute(&self, item: &WorkItem) -> HandlerResult {
        settle(self.register(item))
    }
}

fn channel_name(text: &str) -> Option<String> {
    quoted(text)
        .or_else(|| near_anchor(text, &["channel", "point"]))
        .map(|name| {
            name.to_lowercase()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("-")
        })
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ItemStatus;

    fn item(text: &str) -> WorkItem {
        WorkItem {
            phase_id: "ops".to_string(),
            phase_name: "Ops".to_string(),
            phase_index: 0,
            index_in_phase: 0,
            text: text.to_string(),
            future: false,
            status: ItemStatus::Todo,
        }
    }

    #[test]
    fn names_channels() {
        assert_eq!(
            channel_name("Register channel ci-status for status reports").as_deref(),
            Some("ci-status")
        );
        assert_eq!(
            channel_name("Add \"Ops Alerts\" channel").as_deref(),
            Some("ops-alerts")
        );
        assert_eq!(
            channel_name("Register integration point webhooks").as_deref(),
            Some("webhooks")
        );
    }

    #[test]
    fn existing_channel_is_left_alone() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("channels.toml");
        fs::write(&path, "channels = [\"ci-status\"]\n").expect("seed");
        let handler = ChannelHandler::new(path.clone());

        let result = handler.execute(&item("Register channel ci-status for status reports"));
        assert!(result.success);
        assert_eq!(result.output, "channel ci-status already registered");
        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            "channels = [\"ci-status\"]\n"
        );

        let added = handler.execute(&item("Enable channel deploys"));
        assert!(added.success, "{}", added.output);
        assert_eq!(
            handler.load().expect("load").channels,
            vec!["ci-status".to_string(), "deploys".to_string()]
        );
    }
}
