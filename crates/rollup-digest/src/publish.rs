use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use rollup_core::config::MAX_CARDS_PER_MESSAGE;

use crate::gateway::{bounded, ChatGateway, DigestCard};
use crate::item::{build_card, RollupItem};

/// Outcome of one publish call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub batches_sent: usize,
    pub batches_failed: usize,
}

/// Post `items` to `channel_id` as cards, at most ten per message.
///
/// Never fails: an unusable target is logged and nothing is sent; a failed
/// batch is logged and the remaining batches are still attempted.
pub async fn publish(
    gateway: &dyn ChatGateway,
    channel_id: &str,
    items: &[RollupItem],
    timeout: Duration,
) -> PublishReport {
    let mut report = PublishReport::default();
    if items.is_empty() {
        debug!(channel_id, "nothing to publish");
        return report;
    }

    match bounded(timeout, gateway.channel_kind(channel_id)).await {
        Ok(kind) if kind.accepts_digest() => {}
        Ok(kind) => {
            error!(channel_id, ?kind, "publish target is not a text or announcement channel");
            return report;
        }
        Err(e) => {
            error!(channel_id, error = %e, "failed to resolve publish target");
            return report;
        }
    }

    let now = Utc::now();
    let cards: Vec<DigestCard> = items.iter().map(|item| build_card(item, now)).collect();

    for (batch, chunk) in cards.chunks(MAX_CARDS_PER_MESSAGE).enumerate() {
        match bounded(timeout, gateway.send_cards(channel_id, chunk)).await {
            Ok(()) => report.batches_sent += 1,
            Err(e) => {
                warn!(channel_id, batch, cards = chunk.len(), error = %e, "failed to send digest batch");
                report.batches_failed += 1;
            }
        }
    }

    info!(
        channel_id,
        items = items.len(),
        sent = report.batches_sent,
        failed = report.batches_failed,
        "digest published"
    );
    report
}
