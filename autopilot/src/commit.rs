//! Commit policy: batch successful items into local commits.
//!
//! Every [`BATCH_SIZE`] successes the working tree is staged and, if anything
//! changed, committed once. Nothing here publishes: [`Committer`] has no
//! operation that reaches a remote.

use anyhow::Result;
use tracing::{debug, info, instrument};

use crate::io::git::Git;

/// Successful dispatches per commit attempt.
pub const BATCH_SIZE: usize = 3;

/// Local version-control primitive.
pub trait Committer {
    fn stage_all(&self) -> Result<()>;
    /// Commit what is staged. `Ok(false)` when nothing was staged.
    fn commit_staged(&self, message: &str) -> Result<bool>;
}

impl Committer for Git {
    fn stage_all(&self) -> Result<()> {
        self.add_all()
    }

    fn commit_staged(&self, message: &str) -> Result<bool> {
        Git::commit_staged(self, message)
    }
}

/// What happened when a success was recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Batch not full yet; holds the current batch length.
    Pending(usize),
    /// Batch full but auto-commit is off.
    Disabled,
    /// Batch full, tree clean after staging.
    NothingToCommit,
    Committed { message: String },
}

#[derive(Debug, Clone)]
pub struct CommitPolicy {
    auto_commit: bool,
    batch: Vec<String>,
}

impl CommitPolicy {
    pub fn new(auto_commit: bool) -> Self {
        Self {
            auto_commit,
            batch: Vec::new(),
        }
    }

    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    /// Count one success and attempt a commit when the batch is full.
    ///
    /// The batch is cleared before the attempt, so a failing commit does not
    /// retry on the next success.
    #[instrument(skip_all, fields(pending = self.batch.len() + 1))]
    pub fn record_success<C: Committer + ?Sized>(
        &mut self,
        committer: &C,
        text: &str,
    ) -> Result<CommitOutcome> {
        self.batch.push(text.to_string());
        if self.batch.len() < BATCH_SIZE {
            return Ok(CommitOutcome::Pending(self.batch.len()));
        }
        let batch = std::mem::take(&mut self.batch);
        if !self.auto_commit {
            debug!("auto-commit disabled, dropping batch");
            return Ok(CommitOutcome::Disabled);
        }

        committer.stage_all()?;
        let message = commit_message(&batch);
        if committer.commit_staged(&message)? {
            info!(items = batch.len(), "committed batch");
            Ok(CommitOutcome::Committed { message })
        } else {
            debug!("nothing staged, no commit");
            Ok(CommitOutcome::NothingToCommit)
        }
    }
}

fn commit_message(batch: &[String]) -> String {
    let mut message = format!("autopilot: complete {} roadmap items\n\n", batch.len());
    for text in batch {
        message.push_str("- ");
        message.push_str(text);
        message.push('\n');
    }
    message
}
