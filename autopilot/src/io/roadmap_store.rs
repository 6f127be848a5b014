//! Roadmap load/save on top of the typed [`Document`] model.
//!
//! Every call re-reads the file; nothing is cached between iterations. There is
//! no locking: a concurrent human edit between read and write is lost to the
//! later writer.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use crate::core::document::Document;
use crate::core::types::WorkItem;

#[derive(Debug, Clone)]
pub struct RoadmapStore {
    path: PathBuf,
}

impl RoadmapStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All items in document order. A missing or unreadable roadmap yields an
    /// empty list so the loop idles instead of crashing.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn list_items(&self) -> Vec<WorkItem> {
        match self.load() {
            Ok(doc) => doc.items(),
            Err(err) => {
                warn!(err = %format!("{err:#}"), "roadmap unavailable, treating as empty");
                Vec::new()
            }
        }
    }

    /// Mark the `todo` entry with exactly this text as done.
    ///
    /// Returns `Ok(false)` without touching the file when no such entry exists.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn mark_done(&self, text: &str) -> Result<bool> {
        let mut doc = match self.load_existing()? {
            Some(doc) => doc,
            None => return Ok(false),
        };
        if !doc.mark_done(text) {
            debug!(text, "no todo entry to mark done");
            return Ok(false);
        }
        self.save(&doc)?;
        Ok(true)
    }

    /// Append `todo` entries to a phase. Unknown phases are a silent no-op.
    #[instrument(skip_all, fields(path = %self.path.display(), phase_id))]
    pub fn append_items(&self, phase_id: &str, texts: &[String]) -> Result<usize> {
        let mut doc = match self.load_existing()? {
            Some(doc) => doc,
            None => return Ok(0),
        };
        let appended = doc.append_items(phase_id, texts);
        if appended == 0 {
            debug!("nothing appended");
            return Ok(0);
        }
        self.save(&doc)?;
        Ok(appended)
    }

    pub fn load(&self) -> Result<Document> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("read roadmap {}", self.path.display()))?;
        Ok(Document::parse(&raw))
    }

    fn load_existing(&self) -> Result<Option<Document>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(Document::parse(&raw))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("read roadmap {}", self.path.display()))
            }
        }
    }

    /// Atomically replace the roadmap (temp file + rename).
    fn save(&self, doc: &Document) -> Result<()> {
        let tmp_path = self.path.with_extension("md.tmp");
        fs::write(&tmp_path, doc.render())
            .with_context(|| format!("write temp roadmap {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("replace roadmap {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ItemStatus;

    const ROADMAP: &str = "# Plan\n\n<!-- phase id=\"core\" name=\"Core\" -->\n- [ ] Create src/a.rs skeleton\n- [x] Verify parser\n<!-- /phase -->\n";

    fn store_with(contents: &str) -> (tempfile::TempDir, RoadmapStore) {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("ROADMAP.md");
        fs::write(&path, contents).expect("write roadmap");
        (temp, RoadmapStore::new(path))
    }

    #[test]
    fn missing_roadmap_lists_nothing_and_mutations_are_noops() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = RoadmapStore::new(temp.path().join("absent.md"));
        assert!(store.list_items().is_empty());
        assert!(!store.mark_done("anything").expect("mark"));
        assert_eq!(
            store.append_items("core", &["x".to_string()]).expect("append"),
            0
        );
        assert!(!store.path().exists());
    }

    #[test]
    fn mark_done_twice_returns_true_then_false() {
        let (_temp, store) = store_with(ROADMAP);
        assert!(store.mark_done("Create src/a.rs skeleton").expect("first"));
        let after_first = fs::read_to_string(store.path()).expect("read");
        assert!(!store.mark_done("Create src/a.rs skeleton").expect("second"));
        let after_second = fs::read_to_string(store.path()).expect("read");
        assert_eq!(after_first, after_second);
        assert_eq!(
            after_first,
            ROADMAP.replace("- [ ] Create src/a.rs skeleton", "- [x] Create src/a.rs skeleton")
        );
    }

    #[test]
    fn append_items_is_visible_on_next_list() {
        let (_temp, store) = store_with(ROADMAP);
        let added = store
            .append_items("core", &["Benchmark parser on large input".to_string()])
            .expect("append");
        assert_eq!(added, 1);

        let items = store.list_items();
        let last = items.last().expect("items");
        assert_eq!(last.text, "Benchmark parser on large input");
        assert_eq!(last.status, ItemStatus::Todo);
        assert_eq!(last.index_in_phase, 2);
    }

    #[test]
    fn append_to_unknown_phase_leaves_file_untouched() {
        let (_temp, store) = store_with(ROADMAP);
        assert_eq!(
            store
                .append_items("nope", &["x".to_string()])
                .expect("append"),
            0
        );
        assert_eq!(fs::read_to_string(store.path()).expect("read"), ROADMAP);
    }
}
