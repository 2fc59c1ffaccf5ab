use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use rollup_core::{ChannelKind, ChatMessage, ReactionRef, StarterMessage, ThreadHandle};

use crate::error::GatewayError;

/// Which slice of a thread's history to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageQuery {
    /// The newest `limit` messages.
    Latest { limit: u8 },
    /// Up to `limit` messages created after `id`.
    After { id: String, limit: u8 },
    /// Up to `limit` messages created before `id`.
    Before { id: String, limit: u8 },
}

/// A display field on a digest card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// One rendered digest entry, the platform-neutral form of an embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigestCard {
    pub title: String,
    pub description: String,
    pub url: Option<String>,
    pub colour: u32,
    pub fields: Vec<CardField>,
    pub timestamp: DateTime<Utc>,
}

/// Everything the pipeline needs from the chat platform.
///
/// Implementations must be `Send + Sync`; a run holds a shared reference for
/// its whole duration and awaits each call before issuing the next.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Resolve a channel by id and report its kind.
    async fn channel_kind(&self, channel_id: &str) -> Result<ChannelKind, GatewayError>;

    /// Currently open child threads of `forum_id`.
    async fn active_threads(&self, forum_id: &str) -> Result<Vec<ThreadHandle>, GatewayError>;

    /// Archived child threads of `forum_id`.
    async fn archived_threads(&self, forum_id: &str) -> Result<Vec<ThreadHandle>, GatewayError>;

    /// The thread's opening post, if it still exists.
    async fn starter_message(
        &self,
        thread: &ThreadHandle,
    ) -> Result<Option<StarterMessage>, GatewayError>;

    /// User ids that reacted with `reaction` on `message_id`.
    async fn reaction_users(
        &self,
        thread_id: &str,
        message_id: &str,
        reaction: &ReactionRef,
    ) -> Result<Vec<String>, GatewayError>;

    /// Fetch messages; order of the returned batch is unspecified.
    async fn messages(
        &self,
        thread_id: &str,
        query: MessageQuery,
    ) -> Result<Vec<ChatMessage>, GatewayError>;

    /// Post one message carrying `cards`.
    async fn send_cards(&self, channel_id: &str, cards: &[DigestCard]) -> Result<(), GatewayError>;
}

/// Await a gateway call, failing with [`GatewayError::Timeout`] after `limit`.
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout {
            ms: limit.as_millis() as u64,
        }),
    }
}
