//! Message identifier ordering.
//!
//! Platform ids are decimal snowflakes carried as strings. They grow with
//! creation time, so comparing them numerically gives chronological order.
//! Strings that are not plain integers fall back to a length-then-lexical
//! comparison, which agrees with numeric order for unpadded digits.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

/// Discord epoch (2015-01-01T00:00:00Z) in Unix milliseconds.
pub const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;

/// Total order over message ids consistent with creation order.
pub fn cmp_message_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
    }
}

/// `true` when `candidate` was created strictly after `cursor`.
pub fn is_after(candidate: &str, cursor: &str) -> bool {
    cmp_message_ids(candidate, cursor) == Ordering::Greater
}

/// Return whichever id is newer.
pub fn newest<'a>(a: &'a str, b: &'a str) -> &'a str {
    if cmp_message_ids(a, b) == Ordering::Less {
        b
    } else {
        a
    }
}

/// Creation instant encoded in a Discord snowflake.
pub fn snowflake_created_at(id: u64) -> Option<DateTime<Utc>> {
    let ms = (id >> 22) as i64 + DISCORD_EPOCH_MS;
    DateTime::from_timestamp_millis(ms)
}
