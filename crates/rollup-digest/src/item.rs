use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use rollup_core::config::{MAX_CARD_BODY_CHARS, MAX_CARD_FIELD_CHARS};
use rollup_core::text::truncate_chars;

use crate::gateway::{CardField, DigestCard};
use crate::mention::resolve_mentions;

pub const CARD_COLOUR: u32 = 0x0099FF;

/// One thread's summarised delta, staged for publication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollupItem {
    pub thread_id: String,
    pub thread_name: String,
    pub url: String,
    pub summary: String,
    pub author_mention: Option<String>,
    /// Mention tokens of everyone who posted in the window.
    pub mentions: Vec<String>,
    /// Lowercase username to user id, for mention rewriting only.
    pub user_map: BTreeMap<String, String>,
    pub key_points: Vec<String>,
    pub contributors: Vec<String>,
}

/// Render an item as a digest card stamped with `now`.
pub fn build_card(item: &RollupItem, now: DateTime<Utc>) -> DigestCard {
    let title = if item.thread_name.trim().is_empty() {
        "Project Update".to_string()
    } else {
        item.thread_name.clone()
    };

    let description = truncate_chars(
        &resolve_mentions(&item.summary, &item.user_map),
        MAX_CARD_BODY_CHARS,
    );

    let mut fields = vec![CardField {
        name: "Project".into(),
        value: format!("<#{}>", item.thread_id),
        inline: true,
    }];

    if let Some(author) = &item.author_mention {
        fields.push(CardField {
            name: "Author".into(),
            value: author.clone(),
            inline: true,
        });
    }

    if !item.key_points.is_empty() {
        let bullets: Vec<String> = item.key_points.iter().map(|p| format!("• {p}")).collect();
        fields.push(CardField {
            name: "Key Points".into(),
            value: truncate_chars(&bullets.join("\n"), MAX_CARD_FIELD_CHARS),
            inline: false,
        });
    }

    if !item.contributors.is_empty() {
        fields.push(CardField {
            name: "Contributors".into(),
            value: truncate_chars(&item.contributors.join(", "), MAX_CARD_FIELD_CHARS),
            inline: false,
        });
    }

    DigestCard {
        title,
        description,
        url: (!item.url.is_empty()).then(|| item.url.clone()),
        colour: CARD_COLOUR,
        fields,
        timestamp: now,
    }
}
