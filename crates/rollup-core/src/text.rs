/// Ellipsis appended when text is cut.
pub const ELLIPSIS: char = '\u{2026}';

/// Cap `s` at `max_chars` characters, replacing the last kept character with
/// an ellipsis when anything was dropped.
///
/// Counts characters, not bytes, so multi-byte sequences are never split.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_owned();
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut out: String = s.chars().take(max_chars - 1).collect();
    out.push(ELLIPSIS);
    out
}

/// Cut to `max_chars` characters without a marker.
pub fn clip_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Collapse all whitespace runs (newlines included) into single spaces.
pub fn one_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_untouched() {
        assert_eq!(truncate_chars("hello", 5), "hello");
    }

    #[test]
    fn long_text_gets_ellipsis_within_cap() {
        let out = truncate_chars(&"x".repeat(5000), 4096);
        assert_eq!(out.chars().count(), 4096);
        assert!(out.ends_with(ELLIPSIS));
    }

    #[test]
    fn multibyte_is_counted_by_char() {
        let out = truncate_chars("ééééé", 3);
        assert_eq!(out, "éé\u{2026}");
    }

    #[test]
    fn one_line_collapses_newlines() {
        assert_eq!(one_line("a\n\n b\tc "), "a b c");
    }
}
