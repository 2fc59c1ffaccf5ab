//! Rewrites plain usernames in summary text into `<@id>` mention tokens.

use std::collections::BTreeMap;

use regex::{Captures, Regex};
use tracing::warn;

/// Replace every whole-token occurrence of a known username (bare or
/// `@`-prefixed, any case) with its mention token.
///
/// `user_map` maps lowercase usernames to platform user ids. Longer names are
/// resolved first, and text already inside a mention token is never touched,
/// so resolving `ann` cannot corrupt an earlier `annabel` rewrite and running
/// the function twice changes nothing.
pub fn resolve_mentions(text: &str, user_map: &BTreeMap<String, String>) -> String {
    let mut names: Vec<(&str, &str)> = user_map
        .iter()
        .filter(|(name, id)| !name.trim().is_empty() && !id.is_empty())
        .map(|(name, id)| (name.as_str(), id.as_str()))
        .collect();
    names.sort_by(|a, b| {
        b.0.chars()
            .count()
            .cmp(&a.0.chars().count())
            .then_with(|| a.0.cmp(b.0))
    });

    let mut out = text.to_string();
    for (name, id) in names {
        let re = match name_pattern(name) {
            Ok(re) => re,
            Err(e) => {
                warn!(name, error = %e, "skipping unmatchable username");
                continue;
            }
        };
        let token = format!("<@{id}>");
        out = re
            .replace_all(&out, |caps: &Captures| match caps.name("existing") {
                Some(existing) => existing.as_str().to_string(),
                None => token.clone(),
            })
            .into_owned();
    }
    out
}

/// Matches, in priority order: an existing mention token (kept verbatim),
/// the `@name` form, then the bare `name` form.
fn name_pattern(name: &str) -> Result<Regex, regex::Error> {
    let escaped = regex::escape(name);
    let lead = word_boundary(name.chars().next());
    let trail = word_boundary(name.chars().last());
    Regex::new(&format!(
        r"(?i)(?P<existing><@[!&]?\d+>)|!?@{escaped}{trail}|{lead}{escaped}{trail}"
    ))
}

fn word_boundary(edge: Option<char>) -> &'static str {
    match edge {
        Some(c) if c.is_alphanumeric() || c == '_' => r"\b",
        _ => "",
    }
}
