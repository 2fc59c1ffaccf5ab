//! Message window fetcher.
//!
//! Two strategies, never mixed within one call:
//!
//! - **Cursor**: everything after the persisted cursor (one batch), or the
//!   latest bootstrap batch for a thread never seen before.
//! - **Bounded scan**: page backwards from the newest message until the
//!   cutoff is crossed, a page comes back empty, or the page guardrail hits.
//!
//! Both return messages sorted ascending and swallow fetch errors: a thread
//! that cannot be read yields an empty (or partial) window for this run.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use rollup_core::config::DigestConfig;
use rollup_core::ids::{cmp_message_ids, is_after};
use rollup_core::ChatMessage;

use crate::gateway::{bounded, ChatGateway, MessageQuery};

#[derive(Debug, Clone, Copy)]
pub enum FetchStrategy<'a> {
    Cursor { after: Option<&'a str> },
    BoundedScan { cutoff: DateTime<Utc> },
}

/// Batch sizes and guardrails.
#[derive(Debug, Clone)]
pub struct FetchLimits {
    pub cursor_batch: u8,
    pub bootstrap_batch: u8,
    pub page_size: u8,
    pub max_pages: u32,
    pub timeout: Duration,
}

impl From<&DigestConfig> for FetchLimits {
    fn from(cfg: &DigestConfig) -> Self {
        Self {
            cursor_batch: cfg.cursor_batch,
            bootstrap_batch: cfg.bootstrap_batch,
            page_size: cfg.scan_page_size,
            max_pages: cfg.scan_max_pages,
            timeout: cfg.call_timeout(),
        }
    }
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self::from(&DigestConfig::default())
    }
}

pub async fn fetch_window(
    gateway: &dyn ChatGateway,
    thread_id: &str,
    strategy: FetchStrategy<'_>,
    limits: &FetchLimits,
) -> Vec<ChatMessage> {
    match strategy {
        FetchStrategy::Cursor { after } => fetch_after_cursor(gateway, thread_id, after, limits).await,
        FetchStrategy::BoundedScan { cutoff } => {
            fetch_since(gateway, thread_id, cutoff, limits).await
        }
    }
}

async fn fetch_after_cursor(
    gateway: &dyn ChatGateway,
    thread_id: &str,
    after: Option<&str>,
    limits: &FetchLimits,
) -> Vec<ChatMessage> {
    let query = match after {
        Some(id) => MessageQuery::After {
            id: id.to_string(),
            limit: limits.cursor_batch,
        },
        None => MessageQuery::Latest {
            limit: limits.bootstrap_batch,
        },
    };

    let mut messages = match bounded(limits.timeout, gateway.messages(thread_id, query)).await {
        Ok(m) => m,
        Err(e) => {
            warn!(thread_id, error = %e, "failed to fetch messages");
            return Vec::new();
        }
    };

    if let Some(cursor) = after {
        messages.retain(|m| is_after(&m.id, cursor));
    }
    sort_ascending(&mut messages);
    debug!(thread_id, count = messages.len(), bootstrap = after.is_none(), "cursor window fetched");
    messages
}

async fn fetch_since(
    gateway: &dyn ChatGateway,
    thread_id: &str,
    cutoff: DateTime<Utc>,
    limits: &FetchLimits,
) -> Vec<ChatMessage> {
    let mut collected = Vec::new();
    let mut seen = HashSet::new();
    let mut before: Option<String> = None;

    for page in 0..limits.max_pages {
        let query = match before.take() {
            Some(id) => MessageQuery::Before {
                id,
                limit: limits.page_size,
            },
            None => MessageQuery::Latest {
                limit: limits.page_size,
            },
        };

        let batch = match bounded(limits.timeout, gateway.messages(thread_id, query)).await {
            Ok(b) => b,
            Err(e) => {
                warn!(thread_id, page, error = %e, "failed to fetch page, keeping partial window");
                break;
            }
        };

        // Platform order is not relied on: find the oldest explicitly.
        let Some(oldest) = batch.iter().min_by(|a, b| chronological(a, b)) else {
            break;
        };
        let oldest_id = oldest.id.clone();
        let crossed_cutoff = oldest.created_at < cutoff;

        for m in batch {
            if m.created_at >= cutoff && seen.insert(m.id.clone()) {
                collected.push(m);
            }
        }

        if crossed_cutoff {
            break;
        }
        before = Some(oldest_id);
    }

    sort_ascending(&mut collected);
    debug!(thread_id, count = collected.len(), %cutoff, "bounded scan fetched");
    collected
}

fn chronological(a: &ChatMessage, b: &ChatMessage) -> Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then_with(|| cmp_message_ids(&a.id, &b.id))
}

fn sort_ascending(messages: &mut [ChatMessage]) {
    messages.sort_by(chronological);
}
