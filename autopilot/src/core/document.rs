//! Typed model of the roadmap document.
//!
//! The document is parsed into a sequence of blocks: free text that is carried
//! through untouched, and phase blocks delimited by HTML comment anchors:
//!
//! ```text
//! <!-- phase id="core" name="Core Engine" -->
//! - [ ] todo item
//! - [~] work in progress
//! - [x] done item
//! - [ ] deferred item <!-- future -->
//! <!-- /phase -->
//! ```
//!
//! Rendering an unmodified document reproduces the input byte-for-byte. Only
//! checklist entries that were mutated, and entries that were appended, are
//! re-rendered from their parts.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::{ItemStatus, WorkItem};

static PHASE_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*<!--\s*phase(?P<attrs>(?:\s.*?)?)-->\s*$").unwrap());
static PHASE_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*<!--\s*/phase\s*-->\s*$").unwrap());
static ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?P<key>[A-Za-z_][\w-]*)\s*=\s*"(?P<value>[^"]*)""#).unwrap());
static ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<prefix>\s*[-*]\s+\[)(?P<marker>[ xX~])(?P<gap>\]\s+)(?P<body>.*?)(?P<trailer>\s*<!--\s*(?:future|now)\s*-->)?(?P<ws>\s*)$",
    )
    .unwrap()
});

/// Parsed roadmap document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Block {
    /// Content outside any well-formed phase block, kept verbatim.
    Text(String),
    Phase(PhaseBlock),
}

/// A named, ordered group of checklist entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseBlock {
    pub id: String,
    pub name: String,
    pub future: bool,
    open: String,
    lines: Vec<PhaseLine>,
    close: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PhaseLine {
    Entry(Entry),
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    prefix: String,
    marker: char,
    gap: String,
    text: String,
    trailer: String,
    eol: String,
    status: ItemStatus,
    future_override: Option<bool>,
}

impl Entry {
    fn render(&self, out: &mut String) {
        out.push_str(&self.prefix);
        out.push(self.marker);
        out.push_str(&self.gap);
        out.push_str(&self.text);
        out.push_str(&self.trailer);
        out.push_str(&self.eol);
    }

    fn set_status(&mut self, status: ItemStatus) {
        self.status = status;
        self.marker = status.marker();
    }
}

impl PhaseBlock {
    fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.lines.iter().filter_map(|line| match line {
            PhaseLine::Entry(entry) => Some(entry),
            PhaseLine::Other(_) => None,
        })
    }

    fn render(&self, out: &mut String) {
        out.push_str(&self.open);
        for line in &self.lines {
            match line {
                PhaseLine::Entry(entry) => entry.render(out),
                PhaseLine::Other(raw) => out.push_str(raw),
            }
        }
        out.push_str(&self.close);
    }

    /// Template for appended entries: copy the last entry's bullet and indentation.
    fn new_entry(&self, text: &str) -> Entry {
        let (prefix, gap, eol) = match self.entries().last() {
            Some(last) => (
                last.prefix.clone(),
                last.gap.clone(),
                if last.eol.is_empty() {
                    "\n".to_string()
                } else {
                    last.eol.clone()
                },
            ),
            None => ("- [".to_string(), "] ".to_string(), line_ending(&self.open)),
        };
        Entry {
            prefix,
            marker: ItemStatus::Todo.marker(),
            gap,
            text: text.to_string(),
            trailer: String::new(),
            eol,
            status: ItemStatus::Todo,
            future_override: None,
        }
    }
}

impl Document {
    /// Parse a roadmap. Never fails: malformed phase blocks degrade to plain text.
    pub fn parse(input: &str) -> Self {
        let mut blocks = Vec::new();
        let mut text = String::new();
        let mut pending: Option<PendingPhase> = None;
        let mut ordinal = 0usize;

        for raw in input.split_inclusive('\n') {
            let (content, _) = split_eol(raw);

            if PHASE_OPEN_RE.is_match(content) {
                // A new anchor inside an open block means the previous block was
                // never terminated: keep its lines as text and start over.
                if let Some(abandoned) = pending.take() {
                    text.push_str(&abandoned.raw);
                }
                ordinal += 1;
                pending = Some(PendingPhase::open(raw, ordinal));
                continue;
            }

            match pending.take() {
                Some(open) if PHASE_CLOSE_RE.is_match(content) => {
                    flush_text(&mut blocks, &mut text);
                    blocks.push(Block::Phase(open.finish(raw)));
                }
                Some(mut open) => {
                    open.push_line(raw);
                    pending = Some(open);
                }
                None => text.push_str(raw),
            }
        }

        if let Some(abandoned) = pending.take() {
            text.push_str(&abandoned.raw);
        }
        flush_text(&mut blocks, &mut text);
        Self { blocks }
    }

    /// Serialize back to text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            match block {
                Block::Text(raw) => out.push_str(raw),
                Block::Phase(phase) => phase.render(&mut out),
            }
        }
        out
    }

    pub fn phases(&self) -> impl Iterator<Item = &PhaseBlock> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Phase(phase) => Some(phase),
            Block::Text(_) => None,
        })
    }

    fn phases_mut(&mut self) -> impl Iterator<Item = &mut PhaseBlock> {
        self.blocks.iter_mut().filter_map(|block| match block {
            Block::Phase(phase) => Some(phase),
            Block::Text(_) => None,
        })
    }

    /// All checklist entries in phase order, then in-phase order.
    pub fn items(&self) -> Vec<WorkItem> {
        let mut items = Vec::new();
        for (phase_index, phase) in self.phases().enumerate() {
            for (index_in_phase, entry) in phase.entries().enumerate() {
                items.push(WorkItem {
                    phase_id: phase.id.clone(),
                    phase_name: phase.name.clone(),
                    phase_index,
                    index_in_phase,
                    text: entry.text.clone(),
                    future: entry.future_override.unwrap_or(phase.future),
                    status: entry.status,
                });
            }
        }
        items
    }

    /// Flip the first `todo` entry whose text equals `text` to `done`.
    ///
    /// Returns `false` if no such entry exists (already done, wip, or unknown).
    pub fn mark_done(&mut self, text: &str) -> bool {
        for phase in self.phases_mut() {
            for line in &mut phase.lines {
                if let PhaseLine::Entry(entry) = line
                    && entry.status == ItemStatus::Todo
                    && entry.text == text
                {
                    entry.set_status(ItemStatus::Done);
                    return true;
                }
            }
        }
        false
    }

    /// Insert `todo` entries right before the closing delimiter of `phase_id`.
    ///
    /// Unknown phases are a no-op. Blank texts and texts already present in the
    /// phase are skipped. Returns the number of entries inserted.
    pub fn append_items(&mut self, phase_id: &str, texts: &[String]) -> usize {
        let Some(phase) = self.phases_mut().find(|phase| phase.id == phase_id) else {
            return 0;
        };

        let mut appended = 0;
        for text in texts {
            let text = normalize_text(text);
            if text.is_empty() || phase.entries().any(|entry| entry.text == text) {
                continue;
            }
            let entry = phase.new_entry(&text);
            phase.lines.push(PhaseLine::Entry(entry));
            appended += 1;
        }
        appended
    }
}

struct PendingPhase {
    raw: String,
    phase: PhaseBlock,
}

impl PendingPhase {
    fn open(raw: &str, ordinal: usize) -> Self {
        let (content, _) = split_eol(raw);
        let attrs = PHASE_OPEN_RE
            .captures(content)
            .and_then(|caps| caps.name("attrs"))
            .map(|m| m.as_str())
            .unwrap_or_default();

        let mut id = None;
        let mut name = None;
        let mut future = false;
        for caps in ATTR_RE.captures_iter(attrs) {
            let value = caps["value"].trim().to_string();
            match &caps["key"] {
                "id" if !value.is_empty() => id = Some(value),
                "name" if !value.is_empty() => name = Some(value),
                "future" => future = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }
        let id = id.unwrap_or_else(|| format!("phase-{ordinal}"));
        let name = name.unwrap_or_else(|| id.clone());

        Self {
            raw: raw.to_string(),
            phase: PhaseBlock {
                id,
                name,
                future,
                open: raw.to_string(),
                lines: Vec::new(),
                close: String::new(),
            },
        }
    }

    fn push_line(&mut self, raw: &str) {
        self.raw.push_str(raw);
        let line = match parse_entry(raw) {
            Some(entry) => PhaseLine::Entry(entry),
            None => PhaseLine::Other(raw.to_string()),
        };
        self.phase.lines.push(line);
    }

    fn finish(mut self, close: &str) -> PhaseBlock {
        self.phase.close = close.to_string();
        self.phase
    }
}

fn parse_entry(raw: &str) -> Option<Entry> {
    let (content, eol) = split_eol(raw);
    let caps = ENTRY_RE.captures(content)?;
    let body = caps.name("body")?.as_str();
    if body.trim().is_empty() {
        return None;
    }
    let marker = caps["marker"].chars().next()?;
    let status = ItemStatus::from_marker(marker)?;
    let trailer_tag = caps.name("trailer").map(|m| m.as_str()).unwrap_or_default();
    let future_override = if trailer_tag.contains("future") {
        Some(true)
    } else if trailer_tag.contains("now") {
        Some(false)
    } else {
        None
    };
    let ws = caps.name("ws").map(|m| m.as_str()).unwrap_or_default();
    Some(Entry {
        prefix: caps["prefix"].to_string(),
        marker,
        gap: caps["gap"].to_string(),
        text: body.to_string(),
        trailer: format!("{trailer_tag}{ws}"),
        eol: eol.to_string(),
        status,
        future_override,
    })
}

fn flush_text(blocks: &mut Vec<Block>, text: &mut String) {
    if !text.is_empty() {
        blocks.push(Block::Text(std::mem::take(text)));
    }
}

/// Split a raw line into content and its line terminator (`\n`, `\r\n`, or none).
fn split_eol(raw: &str) -> (&str, &str) {
    if let Some(stripped) = raw.strip_suffix("\r\n") {
        (stripped, "\r\n")
    } else if let Some(stripped) = raw.strip_suffix('\n') {
        (stripped, "\n")
    } else {
        (raw, "")
    }
}

fn line_ending(raw: &str) -> String {
    match split_eol(raw).1 {
        "" => "\n".to_string(),
        eol => eol.to_string(),
    }
}

fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
