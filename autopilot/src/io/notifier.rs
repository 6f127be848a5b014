//! Best-effort outbound status messages.
//!
//! A notifier never fails from the caller's point of view: delivery problems
//! are logged and reported as `None`.

use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{info, warn};

use crate::io::process::run_command_with_timeout;

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(30);
const NOTIFY_OUTPUT_LIMIT_BYTES: usize = 4_096;

pub trait Notifier {
    /// Post a human-readable message. Returns a message id when the channel
    /// provides one.
    fn post(&self, text: &str) -> Option<String>;
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn post(&self, text: &str) -> Option<String> {
        (**self).post(text)
    }
}

/// Writes messages to the tracing log only.
#[derive(Debug, Default)]
pub struct LogNotifier {
    sent: AtomicU64,
}

impl Notifier for LogNotifier {
    fn post(&self, text: &str) -> Option<String> {
        let id = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        info!(target: "autopilot::notify", message_id = id, "{text}");
        Some(format!("log-{id}"))
    }
}

/// Pipes each message to an external command's stdin.
///
/// The first line of the command's stdout, if any, is taken as the message id.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    argv: Vec<String>,
}

impl CommandNotifier {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl Notifier for CommandNotifier {
    fn post(&self, text: &str) -> Option<String> {
        let (program, args) = self.argv.split_first()?;
        let mut cmd = Command::new(program);
        cmd.args(args);

        let output = match run_command_with_timeout(
            cmd,
            Some(text.as_bytes()),
            NOTIFY_TIMEOUT,
            NOTIFY_OUTPUT_LIMIT_BYTES,
        ) {
            Ok(output) => output,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "notifier command failed to run");
                return None;
            }
        };
        if !output.success() {
            warn!(exit_code = output.exit_code(), "notifier command failed");
            return None;
        }
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    }
}

/// Build the notifier described by `notify.command` (empty = log only).
pub fn notifier_from_command(argv: &[String]) -> Box<dyn Notifier> {
    if argv.is_empty() {
        Box::new(LogNotifier::default())
    } else {
        Box::new(CommandNotifier::new(argv.to_vec()))
    }
}
