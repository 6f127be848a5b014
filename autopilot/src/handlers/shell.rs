//! Run fixed verification commands selected by keyword.
//!
//! Item text never reaches a shell: it only picks one of the argv lists from
//! `[shell.commands]`. Items with no matching keyword succeed as "noted".

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, instrument};

use super::{Handler, settle};
use crate::core::scorer::{has_stem, words};
use crate::core::types::{HandlerResult, WorkItem};
use crate::io::config::ShellConfig;
use crate::io::process::run_command_with_timeout;

#[derive(Debug, Clone)]
pub struct ShellHandler {
    workdir: PathBuf,
    config: ShellConfig,
}

impl ShellHandler {
    pub fn new(workdir: &Path, config: ShellConfig) -> Self {
        Self {
            workdir: workdir.to_path_buf(),
            config,
        }
    }

    /// The configured command for the first keyword found in `text`.
    pub fn resolve(&self, text: &str) -> Option<(&str, &[String])> {
        let lower = text.to_lowercase();
        let words = words(&lower);
        self.config
            .commands
            .iter()
            .find(|(keyword, _)| has_stem(&words, &[keyword.to_lowercase().as_str()]))
            .map(|(keyword, argv)| (keyword.as_str(), argv.as_slice()))
    }

    #[instrument(skip_all, fields(item = %item.text))]
    fn run(&self, item: &WorkItem) -> Result<HandlerResult> {
        let Some((keyword, argv)) = self.resolve(&item.text) else {
            return Ok(HandlerResult::ok(format!("noted: {}", item.text)));
        };
        let Some((program, args)) = argv.split_first() else {
            return Ok(HandlerResult::ok(format!("noted: {}", item.text)));
        };

        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(&self.workdir);
        let timeout = Duration::from_secs(self.config.timeout_secs);
        info!(keyword, command = %argv.join(" "), "running shell command");
        let output =
            run_command_with_timeout(cmd, None, timeout, self.config.output_limit_bytes)?;

        let mut transcript = output.transcript();
        if output.timed_out {
            if !transcript.is_empty() && !transcript.ends_with('\n') {
                transcript.push('\n');
            }
            transcript.push_str(&format!("[timed out after {}s]", timeout.as_secs()));
        }
        let duration_ms = output.elapsed.as_millis() as u64;
        let result = if output.success() {
            HandlerResult::ok(transcript)
        } else {
            HandlerResult::failed(transcript, output.exit_code())
        };
        Ok(result.with_duration_ms(duration_ms))
    }
}

impl Handler for ShellHandler {
    fn execute(&self, item: &WorkItem) -> HandlerResult {
        settle(self.run(item))
    }
}
