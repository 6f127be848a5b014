//! Deterministic routing of work items to handler categories.
//!
//! Routing is an ordered table of `(Category, predicate)` pairs evaluated over
//! the lower-cased item text. The first matching predicate wins; an item that
//! matches nothing is left to the caller's unhandled fallback.

use serde::{Deserialize, Serialize};

use crate::core::scorer::{ADD_FORMS, has_stem, has_word, words};
use crate::core::types::Category;

/// Project-specific vocabulary consulted by the predicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingRules {
    /// Path prefixes that count as "a known source path" for scaffold requests.
    pub source_roots: Vec<String>,
    /// Names of integration points that wiring requests may reference.
    pub integration_points: Vec<String>,
}

impl Default for RoutingRules {
    fn default() -> Self {
        Self {
            source_roots: vec!["src/".to_string(), "docs/".to_string(), "tests/".to_string()],
            integration_points: vec![
                "scheduler".to_string(),
                "notifier".to_string(),
                "session store".to_string(),
                "roadmap store".to_string(),
                "commit policy".to_string(),
            ],
        }
    }
}

/// Tokenized view of an item text shared by all predicates.
pub struct RouteInput<'a> {
    pub lower: &'a str,
    pub words: Vec<&'a str>,
}

type Predicate = fn(&RouteInput<'_>, &RoutingRules) -> bool;

/// Category predicates in precedence order.
pub const ROUTES: &[(Category, Predicate)] = &[
    (Category::Scaffold, is_scaffold),
    (Category::Command, is_command),
    (Category::Wiring, is_wiring),
    (Category::Shell, is_shell),
    (Category::Build, is_build),
    (Category::Channel, is_channel),
];

/// Select the handler category for `text`, or `None` if nothing matches.
pub fn route(text: &str, rules: &RoutingRules) -> Option<Category> {
    let lower = text.to_lowercase();
    let input = RouteInput {
        lower: &lower,
        words: words(&lower),
    };
    ROUTES
        .iter()
        .find(|(_, predicate)| predicate(&input, rules))
        .map(|(category, _)| *category)
}

/// First whitespace token that starts with one of the configured source roots.
pub fn find_source_path<'a>(text: &'a str, rules: &RoutingRules) -> Option<&'a str> {
    text.split_whitespace()
        .map(|token| {
            token
                .trim_start_matches(|c: char| "`'\"(".contains(c))
                .trim_end_matches(|c: char| "`'\"),;:.".contains(c))
        })
        .find(|token| {
            let lower = token.to_lowercase();
            rules
                .source_roots
                .iter()
                .any(|root| lower.starts_with(&root.to_lowercase()) && lower.len() > root.len())
        })
}

fn is_scaffold(input: &RouteInput<'_>, rules: &RoutingRules) -> bool {
    has_stem(&input.words, &["creat", "scaffold", "skeleton"])
        && find_source_path(input.lower, rules).is_some()
}

fn is_command(input: &RouteInput<'_>, _rules: &RoutingRules) -> bool {
    let mentions_command = has_stem(&input.words, &["command", "subcommand"])
        || input
            .lower
            .split_whitespace()
            .any(|token| token.len() > 1 && token.starts_with('/') && !token[1..].contains('/'));
    mentions_command
        && (has_stem(&input.words, &["register", "expose"]) || has_word(&input.words, ADD_FORMS))
}

fn is_wiring(input: &RouteInput<'_>, rules: &RoutingRules) -> bool {
    has_stem(
        &input.words,
        &["wire", "wiring", "connect", "integrat", "hook"],
    ) && rules
        .integration_points
        .iter()
        .any(|point| input.lower.contains(&point.to_lowercase()))
}

fn is_shell(input: &RouteInput<'_>, _rules: &RoutingRules) -> bool {
    has_stem(
        &input.words,
        &["test", "verif", "validat", "benchmark", "bench", "lint"],
    )
}

fn is_build(input: &RouteInput<'_>, _rules: &RoutingRules) -> bool {
    has_stem(&input.words, &["build", "defin", "schema", "stub"])
}

fn is_channel(input: &RouteInput<'_>, _rules: &RoutingRules) -> bool {
    let mentions_channel =
        has_stem(&input.words, &["channel"]) || input.lower.contains("integration point");
    mentions_channel
        && (has_stem(&input.words, &["register", "enable"]) || has_word(&input.words, ADD_FORMS))
}
