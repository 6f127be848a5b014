//! Name extraction from free-form item text.

/// Words that never name anything on their own.
const FILLER: &[&str] = &[
    "a", "an", "the", "new", "for", "to", "in", "into", "of", "on", "and", "with", "register",
    "add", "expose", "enable", "create", "build", "define", "definition", "schema", "stub",
    "command", "subcommand", "channel", "integration", "point", "data",
];

/// First token wrapped in backticks or double quotes.
pub(crate) fn quoted(text: &str) -> Option<String> {
    for delim in ['`', '"'] {
        let mut parts = text.split(delim);
        parts.next();
        if let (Some(inner), Some(_)) = (parts.next(), parts.next()) {
            let inner = inner.trim();
            if !inner.is_empty() {
                return Some(inner.to_string());
            }
        }
    }
    None
}

/// First `/name` token, without the slash.
pub(crate) fn slash_token(text: &str) -> Option<String> {
    text.split_whitespace()
        .map(clean)
        .find(|token| token.len() > 1 && token.starts_with('/') && !token[1..].contains('/'))
        .map(|token| token[1..].to_string())
}

/// The meaningful token adjacent to an anchor word such as `command`.
///
/// Prefers the word right before the anchor ("a status command"), then the
/// word right after it ("command status"). Filler words are skipped over.
pub(crate) fn near_anchor(text: &str, anchors: &[&str]) -> Option<String> {
    let tokens: Vec<String> = text
        .split_whitespace()
        .map(|token| clean(token).to_lowercase())
        .filter(|token| !token.is_empty())
        .collect();
    let anchor_at = tokens
        .iter()
        .position(|token| anchors.iter().any(|anchor| token.starts_with(anchor)))?;

    let before = tokens[..anchor_at]
        .last()
        .filter(|token| !is_filler(token))
        .cloned();
    before.or_else(|| {
        tokens[anchor_at + 1..]
            .iter()
            .find(|token| !is_filler(token))
            .cloned()
    })
}

/// Lower-case identifier made of the non-filler words, joined by `sep`.
///
/// At most `max_words` words are kept. Returns `None` if nothing is left.
pub(crate) fn slug(text: &str, sep: &str, max_words: usize) -> Option<String> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty() && !is_filler(word))
        .take(max_words)
        .collect();
    (!words.is_empty()).then(|| words.join(sep))
}

/// Make `slug` usable as a Rust module name by prefixing it when it starts
/// with a digit: `3d_renderer` -> `stub_3d_renderer`.
pub(crate) fn rust_ident(slug: &str, prefix: &str) -> String {
    if slug.starts_with(|c: char| c.is_ascii_digit()) {
        format!("{prefix}_{slug}")
    } else {
        slug.to_string()
    }
}

/// `audit_events` -> `AuditEvents`.
pub(crate) fn camel_case(slug: &str) -> String {
    slug.split(['_', '-'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

fn is_filler(word: &str) -> bool {
    FILLER.contains(&word)
}

fn clean(token: &str) -> &str {
    token.trim_matches(|c: char| "`'\"(),;:.!?".contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_names_near_anchor_words() {
        assert_eq!(
            near_anchor("Register a status command", &["command"]).as_deref(),
            Some("status")
        );
        assert_eq!(
            near_anchor("Expose subcommand plan in the CLI", &["subcommand"]).as_deref(),
            Some("plan")
        );
        assert_eq!(
            near_anchor("Register channel ci-status for status reports", &["channel"]).as_deref(),
            Some("ci-status")
        );
        assert_eq!(near_anchor("Register the thing", &["channel"]), None);
    }

    #[test]
    fn quoted_and_slash_tokens() {
        assert_eq!(quoted("Add `deploy` command").as_deref(), Some("deploy"));
        assert_eq!(quoted("Add \"ops alerts\" channel").as_deref(), Some("ops alerts"));
        assert_eq!(quoted("no quotes here"), None);
        assert_eq!(slash_token("Add /pause to the bot.").as_deref(), Some("pause"));
        assert_eq!(slash_token("Touch src/a.rs"), None);
    }

    #[test]
    fn slugs_skip_filler_words() {
        assert_eq!(
            slug("Define schema for audit events", "_", 4).as_deref(),
            Some("audit_events")
        );
        assert_eq!(slug("Build the stub", "-", 4), None);
        assert_eq!(camel_case("config_loader"), "ConfigLoader");
    }

    #[test]
    fn identifiers_never_start_with_a_digit() {
        assert_eq!(rust_ident("3d_renderer", "stub"), "stub_3d_renderer");
        assert_eq!(camel_case(&rust_ident("3d_renderer", "stub")), "Stub3dRenderer");
        assert_eq!(rust_ident("config_loader", "stub"), "config_loader");
    }
}
