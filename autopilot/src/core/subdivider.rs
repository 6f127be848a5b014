//! Vague-item detection and fixed decomposition into concrete subtasks.

use std::sync::LazyLock;

use regex::Regex;

/// Verb plus two words, nothing else.
static SHORT_PHRASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]+\s+\S+\s+\S+$").unwrap());

const SHORT_PHRASE_MAX_CHARS: usize = 32;
const VAGUE_SUFFIXES: &[&str] = &["etc", "etc.", "...", "\u{2026}"];
const PLACEHOLDERS: &[&str] = &["tbd", "???", "<placeholder>"];

/// Hand-authored expansions, keyed by a normalized substring of the item text.
/// The first matching key wins.
const EXPANSIONS: &[(&str, &[&str])] = &[
    (
        "add tests",
        &[
            "Test roadmap parsing of phase blocks",
            "Test priority ordering of actionable items",
            "Verify idle heartbeat cadence",
        ],
    ),
    (
        "improve performance",
        &[
            "Benchmark roadmap parsing on a large document",
            "Benchmark priority scoring across all phases",
            "Verify scan latency stays flat as the roadmap grows",
        ],
    ),
    (
        "error handling",
        &[
            "Define schema for handler failure records",
            "Test failure paths in the dispatch router",
            "Verify circuit breaker cooldown resets the failure counter",
        ],
    ),
    (
        "write docs",
        &[
            "Create skeleton for docs/overview.md",
            "Create skeleton for docs/configuration.md",
            "Create skeleton for docs/roadmap-format.md",
        ],
    ),
    (
        "documentation",
        &[
            "Create skeleton for docs/overview.md",
            "Create skeleton for docs/configuration.md",
            "Create skeleton for docs/roadmap-format.md",
        ],
    ),
    (
        "set up ci",
        &[
            "Create skeleton for docs/ci.md",
            "Verify the test suite passes in CI",
            "Register channel ci-status for status reports",
        ],
    ),
];

/// True if the text reads as a placeholder rather than a concrete task.
pub fn is_vague(text: &str) -> bool {
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();

    if trimmed.chars().count() < SHORT_PHRASE_MAX_CHARS && SHORT_PHRASE_RE.is_match(trimmed) {
        return true;
    }
    if VAGUE_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix)) {
        return true;
    }
    PLACEHOLDERS.iter().any(|marker| {
        if marker.chars().all(|c| c.is_ascii_alphabetic()) {
            lower
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| word == *marker)
        } else {
            lower.contains(marker)
        }
    })
}

/// Expand a vague item into concrete subtasks.
///
/// Returns `None` when no expansion is known; the item is then treated as concrete.
pub fn subdivide(text: &str) -> Option<Vec<String>> {
    let normalized = normalize(text);
    EXPANSIONS
        .iter()
        .find(|(key, _)| normalized.contains(key))
        .map(|(_, subtasks)| subtasks.iter().map(|s| s.to_string()).collect())
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
