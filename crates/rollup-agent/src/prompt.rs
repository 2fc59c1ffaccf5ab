//! Prompt assembly for thread summaries.

use std::collections::BTreeSet;

use rollup_core::text::{clip_chars, one_line, truncate_chars};
use rollup_core::{ChatMessage, ThreadMemory};

/// System turn sent ahead of every summary prompt.
pub const SYSTEM_MESSAGE: &str = "You are a helpful assistant.";

/// Cap on the carried-forward prior summary (characters).
const PRIOR_EXCERPT_CHARS: usize = 500;

/// One `(author, content)` pair of the summarised window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptLine {
    pub author: String,
    pub content: String,
}

/// Keep human-authored, non-blank messages and clip each to `char_budget`.
///
/// Order is preserved; callers pass the window already sorted ascending.
pub fn prepare_window(messages: &[ChatMessage], char_budget: usize) -> Vec<PromptLine> {
    messages
        .iter()
        .filter(|m| !m.author_is_bot && !m.content.trim().is_empty())
        .map(|m| PromptLine {
            author: m.author_name.clone(),
            content: clip_chars(&m.content, char_budget),
        })
        .collect()
}

/// Build the user prompt for one thread.
pub fn build_prompt(thread_name: &str, prior: Option<&ThreadMemory>, lines: &[PromptLine]) -> String {
    let mut out = String::from(
        "You summarize progress updates for software projects concisely.\n",
    );
    out.push_str(&format!("Thread: {thread_name}\n"));

    if let Some(summary) = prior.and_then(|m| m.summary()) {
        let excerpt = truncate_chars(&one_line(summary), PRIOR_EXCERPT_CHARS);
        out.push_str(&format!("Prior memory summary: {excerpt}\n"));
    }

    out.push_str("\nNew messages (chronological):\n");
    for line in lines {
        out.push_str(&format!("- {}: {}\n", line.author, line.content));
    }

    let authors: BTreeSet<&str> = lines.iter().map(|l| l.author.as_str()).collect();
    out.push_str("\nRequirements:\n");
    out.push_str("- 1-3 sentences, crisp and specific about what progressed, decisions, blockers, and next steps.\n");
    if authors.len() > 1 {
        out.push_str("- Several people took part; include names of key contributors where clear.\n");
    } else {
        out.push_str("- A single person posted these updates; describe the work as theirs, do not invent a team.\n");
    }
    out.push_str("- Avoid pleasantries, meta-chatter and generic filler.\n");
    out
}
