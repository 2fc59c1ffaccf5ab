//! Run orchestrator: discover, process each thread in isolation, publish.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use rollup_agent::prompt::{build_prompt, prepare_window};
use rollup_agent::Summarizer;
use rollup_core::config::DigestConfig;
use rollup_core::{ChatMessage, ThreadHandle, ThreadMemory, ThreadState};
use rollup_store::{CheckpointCommit, CheckpointStore};

use crate::discovery::{discover_threads, is_opted_out};
use crate::error::RollupError;
use crate::fetch::{fetch_window, FetchLimits, FetchStrategy};
use crate::gateway::ChatGateway;
use crate::item::RollupItem;
use crate::publish::publish;

/// Per-run knobs. The default is the scheduled run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Switches the fetcher to a bounded backward scan down to this instant.
    pub cutoff: Option<DateTime<Utc>>,
    /// Publish target; falls back to the configured default channel.
    pub target_channel: Option<String>,
    /// Overrides cursor advancement. Unset means "advance unless `cutoff` is set".
    pub advance_cursor: Option<bool>,
}

impl RunOptions {
    pub fn scheduled() -> Self {
        Self::default()
    }

    /// A manual look-back run over the last `window`, posted to `channel_id`.
    /// Never moves cursors.
    pub fn manual(window: ChronoDuration, channel_id: impl Into<String>) -> Self {
        Self {
            cutoff: Some(Utc::now() - window),
            target_channel: Some(channel_id.into()),
            advance_cursor: Some(false),
        }
    }

    pub fn advances_cursor(&self) -> bool {
        self.advance_cursor.unwrap_or(self.cutoff.is_none())
    }
}

/// What a run did, for logs, the CLI and the slash-command reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub discovered: usize,
    pub eligible: usize,
    pub opted_out: usize,
    pub failed: usize,
    pub items: usize,
    pub batches_sent: usize,
    pub batches_failed: usize,
    /// Set when configuration was missing and no thread was processed.
    pub aborted: bool,
}

impl RunReport {
    fn aborted() -> Self {
        Self {
            aborted: true,
            ..Default::default()
        }
    }
}

/// Drives rollup runs.
///
/// Runs are serialised: a scheduled run and a `/rollup` invocation that
/// arrive together execute one after the other.
pub struct RollupRunner {
    store: Arc<CheckpointStore>,
    summarizer: Summarizer,
    config: DigestConfig,
    limits: FetchLimits,
    run_lock: Mutex<()>,
}

impl RollupRunner {
    pub fn new(store: Arc<CheckpointStore>, summarizer: Summarizer, config: DigestConfig) -> Self {
        let limits = FetchLimits::from(&config);
        Self {
            store,
            summarizer,
            config,
            limits,
            run_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &DigestConfig {
        &self.config
    }

    pub async fn run(&self, gateway: &dyn ChatGateway, options: RunOptions) -> RunReport {
        let _guard = self.run_lock.lock().await;
        let run_id = Uuid::new_v4();
        let span = info_span!("rollup_run", %run_id);
        self.run_locked(gateway, &options).instrument(span).await
    }

    async fn run_locked(&self, gateway: &dyn ChatGateway, options: &RunOptions) -> RunReport {
        let Some(forum_id) = non_empty(self.config.forum_channel_id.as_deref()) else {
            error!("forum channel id is not configured; skipping rollup");
            return RunReport::aborted();
        };
        let target = options
            .target_channel
            .as_deref()
            .or(self.config.default_channel_id.as_deref());
        let Some(target) = non_empty(target) else {
            error!("no target channel for the digest; skipping rollup");
            return RunReport::aborted();
        };
        if !self.summarizer.is_configured() {
            error!("text-generation credential missing; skipping rollup");
            return RunReport::aborted();
        }

        let advance = options.advances_cursor();
        info!(
            forum_id,
            target,
            cutoff = ?options.cutoff,
            advance,
            "rollup run started"
        );

        let threads = discover_threads(gateway, forum_id, self.limits.timeout).await;
        let mut report = RunReport {
            discovered: threads.len(),
            ..Default::default()
        };
        let mut items = Vec::new();

        for thread in &threads {
            if !thread.kind.is_discussion() {
                debug!(thread_id = %thread.id, kind = ?thread.kind, "not a discussion thread");
                continue;
            }
            report.eligible += 1;

            if is_opted_out(
                gateway,
                thread,
                &self.config.opt_out_reactions,
                self.limits.timeout,
            )
            .await
            {
                info!(thread_id = %thread.id, "thread owner opted out");
                report.opted_out += 1;
                continue;
            }

            match self.process_thread(gateway, thread, options, advance).await {
                Ok(Some(item)) => items.push(item),
                Ok(None) => {}
                Err(e) => {
                    report.failed += 1;
                    warn!(thread_id = %thread.id, error = %e, "thread skipped");
                }
            }
        }

        report.items = items.len();
        let published = publish(gateway, target, &items, self.limits.timeout).await;
        report.batches_sent = published.batches_sent;
        report.batches_failed = published.batches_failed;

        info!(
            discovered = report.discovered,
            eligible = report.eligible,
            opted_out = report.opted_out,
            failed = report.failed,
            items = report.items,
            "rollup run finished"
        );
        report
    }

    /// Fetch, summarise and commit one thread. `Ok(None)` means nothing new.
    async fn process_thread(
        &self,
        gateway: &dyn ChatGateway,
        thread: &ThreadHandle,
        options: &RunOptions,
        advance: bool,
    ) -> Result<Option<RollupItem>, RollupError> {
        let name = thread.display_name();
        let state = match self.store.get_or_create(&thread.id, name) {
            Ok(state) => state,
            Err(e) => {
                warn!(thread_id = %thread.id, error = %e, "checkpoint unavailable, continuing without it");
                ThreadState::transient(&thread.id, name)
            }
        };

        let strategy = match options.cutoff {
            Some(cutoff) => FetchStrategy::BoundedScan { cutoff },
            None => FetchStrategy::Cursor {
                after: state.last_seen_message_id.as_deref(),
            },
        };
        let window = fetch_window(gateway, &thread.id, strategy, &self.limits).await;

        let Some(newest) = window.last() else {
            return Ok(None);
        };
        let lines = prepare_window(&window, self.config.content_char_budget);
        if lines.is_empty() {
            debug!(thread_id = %thread.id, fetched = window.len(), "no new human messages");
            if advance && state.persisted {
                self.store.advance_cursor(
                    &thread.id,
                    state.last_seen_message_id.as_deref(),
                    &newest.id,
                )?;
            }
            return Ok(None);
        }

        let prompt = build_prompt(name, state.memory.as_ref(), &lines);
        let summary = self
            .summarizer
            .summarize(&prompt)
            .await
            .ok_or(RollupError::NoSummary)?;

        let participants = Participants::from_window(&window);
        let contributors = if participants.mentions.len() > 1 {
            participants.mentions.clone()
        } else {
            Vec::new()
        };

        if state.persisted {
            self.store.commit(&CheckpointCommit {
                thread_id: thread.id.clone(),
                thread_name: name.to_string(),
                newest_message_id: newest.id.clone(),
                memory: ThreadMemory::V1 {
                    summary: summary.clone(),
                    key_points: Vec::new(),
                    contributors: contributors.clone(),
                },
                advance_cursor: advance,
                expected_cursor: state.last_seen_message_id.clone(),
            })?;
        }

        debug!(thread_id = %thread.id, messages = lines.len(), "thread summarised");
        Ok(Some(RollupItem {
            thread_id: thread.id.clone(),
            thread_name: name.to_string(),
            url: thread.url(),
            summary,
            author_mention: thread.owner_mention(),
            mentions: participants.mentions,
            user_map: participants.user_map,
            key_points: Vec::new(),
            contributors,
        }))
    }
}

/// Human authors with something to say, in order of first appearance.
struct Participants {
    mentions: Vec<String>,
    user_map: BTreeMap<String, String>,
}

impl Participants {
    fn from_window(window: &[ChatMessage]) -> Self {
        let mut mentions = Vec::new();
        let mut user_map = BTreeMap::new();
        let spoke = |m: &&ChatMessage| !m.author_is_bot && !m.content.trim().is_empty();
        for m in window.iter().filter(spoke) {
            let mention = format!("<@{}>", m.author_id);
            if !mentions.contains(&mention) {
                mentions.push(mention);
            }
            if !m.author_name.trim().is_empty() {
                user_map
                    .entry(m.author_name.to_lowercase())
                    .or_insert_with(|| m.author_id.clone());
            }
        }
        Self { mentions, user_map }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduled_runs_advance_and_manual_runs_do_not() {
        assert!(RunOptions::scheduled().advances_cursor());

        let manual = RunOptions::manual(ChronoDuration::hours(24), "99");
        assert!(!manual.advances_cursor());
        assert_eq!(manual.target_channel.as_deref(), Some("99"));

        let forced = RunOptions {
            cutoff: Some(Utc::now()),
            advance_cursor: Some(true),
            ..Default::default()
        };
        assert!(forced.advances_cursor());

        let windowed = RunOptions {
            cutoff: Some(Utc::now()),
            ..Default::default()
        };
        assert!(!windowed.advances_cursor());
    }

    #[test]
    fn participants_skip_bots_and_dedupe() {
        let at = Utc::now();
        let msg = |id: &str, author: &str, name: &str, bot: bool| ChatMessage {
            id: id.into(),
            author_id: author.into(),
            author_name: name.into(),
            author_is_bot: bot,
            content: "x".into(),
            created_at: at,
        };
        let p = Participants::from_window(&[
            msg("1", "10", "Alice", false),
            msg("2", "20", "helper", true),
            msg("3", "30", "bob", false),
            msg("4", "10", "Alice", false),
        ]);
        assert_eq!(p.mentions, ["<@10>", "<@30>"]);
        assert_eq!(p.user_map.get("alice").map(String::as_str), Some("10"));
        assert!(!p.user_map.contains_key("helper"));
    }

    #[test]
    fn participants_ignore_blank_posts() {
        let at = Utc::now();
        let msg = |id: &str, author: &str, name: &str, content: &str| ChatMessage {
            id: id.into(),
            author_id: author.into(),
            author_name: name.into(),
            author_is_bot: false,
            content: content.into(),
            created_at: at,
        };
        let p = Participants::from_window(&[
            msg("1", "10", "alice", "shipped the lexer"),
            msg("2", "20", "bob", "   "),
            msg("3", "30", "carol", ""),
        ]);
        assert_eq!(p.mentions, ["<@10>"]);
        assert!(!p.user_map.contains_key("bob"));
        assert!(!p.user_map.contains_key("carol"));
    }
}
