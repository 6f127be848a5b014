//! Deterministic priority scoring for work items.

use crate::core::types::WorkItem;

const BASE_SCORE: i64 = 100;
const PHASE_PENALTY: i64 = 5;
const SHORT_TEXT_THRESHOLD: usize = 60;
const SHORT_TEXT_BONUS: i64 = 5;

/// Inflections of "add". Matched as whole words so `address` and `additional`
/// do not count.
pub(crate) const ADD_FORMS: &[&str] = &["add", "adds", "added", "adding"];

/// A lexical signal: any word starting with one of `stems`, or equal to one of
/// `words`, earns `bonus` once.
///
/// Stems match the start of a word, so `test` also matches `tests` and `testing`.
struct Signal {
    stems: &'static [&'static str],
    words: &'static [&'static str],
    bonus: i64,
}

impl Signal {
    fn matches(&self, words: &[&str]) -> bool {
        has_stem(words, self.stems) || has_word(words, self.words)
    }
}

const COMMAND_SIGNAL: Signal = Signal {
    stems: &["command", "subcommand"],
    words: &["cli"],
    bonus: 8,
};

const SIGNALS: &[Signal] = &[
    Signal {
        stems: &["creat", "scaffold", "skeleton", "build"],
        words: &[],
        bonus: 20,
    },
    Signal {
        stems: &["test", "verif", "validat", "benchmark"],
        words: &[],
        bonus: 10,
    },
    Signal {
        stems: &["wire", "wiring", "connect", "integrat", "hook"],
        words: &[],
        bonus: 15,
    },
    Signal {
        stems: &["implement"],
        words: ADD_FORMS,
        bonus: 12,
    },
    COMMAND_SIGNAL,
];

/// Score a work item. Higher scores are dispatched first.
pub fn score(item: &WorkItem) -> i64 {
    let lower = item.text.to_lowercase();
    let words = words(&lower);

    let mut score = BASE_SCORE - PHASE_PENALTY * item.phase_index as i64;
    for signal in SIGNALS {
        if signal.matches(&words) {
            score += signal.bonus;
        }
    }
    // Slash-prefixed tokens (`/deploy`) read as commands too.
    if !COMMAND_SIGNAL.matches(&words) && has_slash_command(&lower) {
        score += COMMAND_SIGNAL.bonus;
    }
    if item.text.chars().count() < SHORT_TEXT_THRESHOLD {
        score += SHORT_TEXT_BONUS;
    }
    score
}

/// Stable sort by descending score; ties keep their document order.
pub fn sort_by_priority(items: &mut [WorkItem]) {
    items.sort_by_key(|item| std::cmp::Reverse(score(item)));
}

pub(crate) fn words(lower: &str) -> Vec<&str> {
    lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect()
}

pub(crate) fn has_stem(words: &[&str], stems: &[&str]) -> bool {
    words
        .iter()
        .any(|word| stems.iter().any(|stem| word.starts_with(stem)))
}

pub(crate) fn has_word(words: &[&str], candidates: &[&str]) -> bool {
    words.iter().any(|word| candidates.contains(word))
}

fn has_slash_command(lower: &str) -> bool {
    lower.split_whitespace().any(|token| {
        token.len() > 1
            && token.starts_with('/')
            && token[1..].chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}
