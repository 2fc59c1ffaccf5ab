//! Thread discovery and the per-thread opt-out policy.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, warn};

use rollup_core::ThreadHandle;

use crate::error::GatewayError;
use crate::gateway::{bounded, ChatGateway};

/// List the forum's active and archived threads.
///
/// The two listings are independent: a failure in one is logged and the
/// other's threads are still returned. Threads seen in both are kept once.
pub async fn discover_threads(
    gateway: &dyn ChatGateway,
    forum_id: &str,
    timeout: Duration,
) -> Vec<ThreadHandle> {
    let mut threads = Vec::new();

    match bounded(timeout, gateway.active_threads(forum_id)).await {
        Ok(active) => threads.extend(active),
        Err(e) => warn!(forum_id, error = %e, "failed to list active threads"),
    }
    match bounded(timeout, gateway.archived_threads(forum_id)).await {
        Ok(archived) => threads.extend(archived),
        Err(e) => warn!(forum_id, error = %e, "failed to list archived threads"),
    }

    let mut seen = HashSet::new();
    threads.retain(|t| seen.insert(t.id.clone()));
    debug!(forum_id, count = threads.len(), "threads discovered");
    threads
}

/// `true` when the thread owner reacted to the opening post with one of
/// `opt_out_reactions`.
///
/// Fails open: if the starter message or its reactors cannot be read, the
/// thread stays in the rollup.
pub async fn is_opted_out(
    gateway: &dyn ChatGateway,
    thread: &ThreadHandle,
    opt_out_reactions: &[String],
    timeout: Duration,
) -> bool {
    let Some(owner_id) = thread.owner_id.as_deref() else {
        return false;
    };
    match owner_reacted(gateway, thread, owner_id, opt_out_reactions, timeout).await {
        Ok(opted_out) => opted_out,
        Err(e) => {
            warn!(thread_id = %thread.id, error = %e, "failed to check opt-out reactions");
            false
        }
    }
}

async fn owner_reacted(
    gateway: &dyn ChatGateway,
    thread: &ThreadHandle,
    owner_id: &str,
    opt_out_reactions: &[String],
    timeout: Duration,
) -> Result<bool, GatewayError> {
    let Some(starter) = bounded(timeout, gateway.starter_message(thread)).await? else {
        return Ok(false);
    };

    let candidates = starter
        .reactions
        .iter()
        .filter(|r| opt_out_reactions.iter().any(|name| *name == r.name));

    for reaction in candidates {
        let users = bounded(
            timeout,
            gateway.reaction_users(&thread.id, &starter.id, reaction),
        )
        .await?;
        if users.iter().any(|u| u == owner_id) {
            return Ok(true);
        }
    }
    Ok(false)
}
