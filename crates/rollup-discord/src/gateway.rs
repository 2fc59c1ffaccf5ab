//! [`ChatGateway`] over the serenity REST client.
//!
//! Only `Arc<Http>` is used, so the gateway keeps working across WebSocket
//! reconnects and can also run without a gateway connection (`run-once`).

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use serenity::all::{
    Channel, ChannelId, ChannelType, CreateMessage, EmojiId, GetMessages, GuildChannel, Message,
    MessageId, ReactionType, UserId,
};
use serenity::http::{Http, HttpError};
use tracing::{debug, warn};

use rollup_core::ids::snowflake_created_at;
use rollup_core::{ChannelKind, ChatMessage, ReactionRef, StarterMessage, ThreadHandle, ThreadKind};
use rollup_digest::{ChatGateway, DigestCard, GatewayError, MessageQuery};

use crate::embed::to_create_embed;

/// Reactor page size; Discord's maximum.
const REACTION_PAGE: u8 = 100;
/// Guardrail on archived-thread pagination.
const MAX_ARCHIVE_PAGES: usize = 10;

pub struct SerenityGateway {
    http: Arc<Http>,
}

impl SerenityGateway {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }

    async fn guild_channel(&self, id: ChannelId) -> Result<GuildChannel, GatewayError> {
        match id.to_channel(&self.http).await.map_err(platform_error)? {
            Channel::Guild(channel) => Ok(channel),
            _ => Err(GatewayError::NotFound {
                what: format!("guild channel {id}"),
            }),
        }
    }
}

#[async_trait]
impl ChatGateway for SerenityGateway {
    async fn channel_kind(&self, channel_id: &str) -> Result<ChannelKind, GatewayError> {
        let channel = parse_channel(channel_id)?;
        match channel.to_channel(&self.http).await.map_err(platform_error)? {
            Channel::Guild(c) => Ok(channel_kind(c.kind)),
            _ => Ok(ChannelKind::Other),
        }
    }

    async fn active_threads(&self, forum_id: &str) -> Result<Vec<ThreadHandle>, GatewayError> {
        let forum = self.guild_channel(parse_channel(forum_id)?).await?;
        let data = forum
            .guild_id
            .get_active_threads(&self.http)
            .await
            .map_err(platform_error)?;
        Ok(data
            .threads
            .iter()
            .filter(|t| t.parent_id == Some(forum.id))
            .map(thread_handle)
            .collect())
    }

    async fn archived_threads(&self, forum_id: &str) -> Result<Vec<ThreadHandle>, GatewayError> {
        let forum = parse_channel(forum_id)?;
        collect_archive_pages(forum_id, |before| async move {
            let data = forum
                .get_archived_public_threads(&self.http, before, Some(100))
                .await
                .map_err(platform_error)?;
            Ok(ArchivePage {
                next_before: data
                    .threads
                    .last()
                    .and_then(|t| t.thread_metadata.as_ref())
                    .and_then(|m| m.archive_timestamp)
                    .map(|ts| ts.unix_timestamp() as u64),
                threads: data.threads.iter().map(thread_handle).collect(),
                has_more: data.has_more,
            })
        })
        .await
    }

    /// In a forum the opening post shares the thread's id.
    async fn starter_message(
        &self,
        thread: &ThreadHandle,
    ) -> Result<Option<StarterMessage>, GatewayError> {
        let channel = parse_channel(&thread.id)?;
        match channel.message(&self.http, MessageId::new(channel.get())).await {
            Ok(message) => Ok(Some(StarterMessage {
                id: message.id.to_string(),
                reactions: message
                    .reactions
                    .iter()
                    .filter_map(|r| reaction_ref(&r.reaction_type))
                    .collect(),
            })),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(platform_error(e)),
        }
    }

    async fn reaction_users(
        &self,
        thread_id: &str,
        message_id: &str,
        reaction: &ReactionRef,
    ) -> Result<Vec<String>, GatewayError> {
        let channel = parse_channel(thread_id)?;
        let message = MessageId::new(parse_id(message_id)?);
        let kind = reaction_type(reaction)?;

        let mut users = Vec::new();
        let mut after: Option<UserId> = None;
        loop {
            let page = channel
                .reaction_users(&self.http, message, kind.clone(), Some(REACTION_PAGE), after)
                .await
                .map_err(platform_error)?;
            let full = page.len() == REACTION_PAGE as usize;
            after = page.last().map(|u| u.id);
            users.extend(page.iter().map(|u| u.id.to_string()));
            if !full || after.is_none() {
                break;
            }
        }
        Ok(users)
    }

    async fn messages(
        &self,
        thread_id: &str,
        query: MessageQuery,
    ) -> Result<Vec<ChatMessage>, GatewayError> {
        let channel = parse_channel(thread_id)?;
        let builder = match query {
            MessageQuery::Latest { limit } => GetMessages::new().limit(limit),
            MessageQuery::After { id, limit } => GetMessages::new()
                .after(MessageId::new(parse_id(&id)?))
                .limit(limit),
            MessageQuery::Before { id, limit } => GetMessages::new()
                .before(MessageId::new(parse_id(&id)?))
                .limit(limit),
        };
        let batch = channel
            .messages(&self.http, builder)
            .await
            .map_err(platform_error)?;
        Ok(batch.iter().map(chat_message).collect())
    }

    async fn send_cards(&self, channel_id: &str, cards: &[DigestCard]) -> Result<(), GatewayError> {
        let channel = parse_channel(channel_id)?;
        let embeds = cards.iter().map(to_create_embed).collect::<Vec<_>>();
        channel
            .send_message(&self.http, CreateMessage::new().embeds(embeds))
            .await
            .map_err(platform_error)?;
        Ok(())
    }
}

struct ArchivePage {
    threads: Vec<ThreadHandle>,
    /// Archive timestamp of the page's last thread; anchor for the next page.
    next_before: Option<u64>,
    has_more: bool,
}

/// Walk the archived-thread pages newest first.
///
/// Only a failure on the first page is an error. A later failure ends the
/// walk with the threads collected so far.
async fn collect_archive_pages<F, Fut>(
    forum_id: &str,
    mut fetch: F,
) -> Result<Vec<ThreadHandle>, GatewayError>
where
    F: FnMut(Option<u64>) -> Fut,
    Fut: Future<Output = Result<ArchivePage, GatewayError>>,
{
    let mut threads = Vec::new();
    let mut before: Option<u64> = None;

    for page in 0..MAX_ARCHIVE_PAGES {
        let data = match fetch(before).await {
            Ok(data) => data,
            Err(e) if page == 0 => return Err(e),
            Err(e) => {
                warn!(forum_id, page, error = %e, "archived threads page failed, keeping earlier pages");
                break;
            }
        };
        before = data.next_before;
        threads.extend(data.threads);
        debug!(forum_id, page, total = threads.len(), "archived threads page");

        if !data.has_more || before.is_none() {
            break;
        }
    }
    Ok(threads)
}

/// Snowflakes are non-zero `u64`s; serenity's id constructors panic on zero.
fn parse_id(raw: &str) -> Result<u64, GatewayError> {
    match raw.trim().parse::<u64>() {
        Ok(id) if id != 0 => Ok(id),
        _ => Err(GatewayError::InvalidId(raw.to_string())),
    }
}

fn parse_channel(raw: &str) -> Result<ChannelId, GatewayError> {
    parse_id(raw).map(ChannelId::new)
}

fn platform_error(e: serenity::Error) -> GatewayError {
    if is_not_found(&e) {
        return GatewayError::NotFound {
            what: e.to_string(),
        };
    }
    GatewayError::Platform(e.to_string())
}

fn is_not_found(e: &serenity::Error) -> bool {
    if let serenity::Error::Http(inner) = e {
        let inner: &HttpError = inner;
        if let HttpError::UnsuccessfulRequest(resp) = inner {
            return resp.status_code.as_u16() == 404;
        }
    }
    false
}

fn channel_kind(kind: ChannelType) -> ChannelKind {
    match kind {
        ChannelType::Text => ChannelKind::Text,
        ChannelType::News => ChannelKind::Announcement,
        ChannelType::Forum => ChannelKind::Forum,
        ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread => {
            ChannelKind::Thread
        }
        _ => ChannelKind::Other,
    }
}

fn thread_kind(kind: ChannelType) -> ThreadKind {
    match kind {
        ChannelType::PublicThread => ThreadKind::Public,
        ChannelType::PrivateThread => ThreadKind::Private,
        ChannelType::NewsThread => ThreadKind::Announcement,
        _ => ThreadKind::Other,
    }
}

fn thread_handle(channel: &GuildChannel) -> ThreadHandle {
    ThreadHandle {
        id: channel.id.to_string(),
        name: channel.name.clone(),
        kind: thread_kind(channel.kind),
        owner_id: channel.owner_id.map(|id| id.to_string()),
        guild_id: Some(channel.guild_id.to_string()),
        parent_id: channel.parent_id.map(|id| id.to_string()),
    }
}

fn chat_message(message: &Message) -> ChatMessage {
    let created_at = snowflake_created_at(message.id.get())
        .or_else(|| DateTime::from_timestamp(message.timestamp.unix_timestamp(), 0))
        .unwrap_or_default();
    ChatMessage {
        id: message.id.to_string(),
        author_id: message.author.id.to_string(),
        author_name: message.author.name.clone(),
        author_is_bot: message.author.bot,
        content: message.content.clone(),
        created_at,
    }
}

fn reaction_ref(kind: &ReactionType) -> Option<ReactionRef> {
    match kind {
        ReactionType::Unicode(name) => Some(ReactionRef {
            name: name.clone(),
            custom_id: None,
        }),
        ReactionType::Custom { id, name, .. } => Some(ReactionRef {
            name: name.clone().unwrap_or_default(),
            custom_id: Some(id.to_string()),
        }),
        _ => None,
    }
}

fn reaction_type(reaction: &ReactionRef) -> Result<ReactionType, GatewayError> {
    Ok(match &reaction.custom_id {
        Some(id) => ReactionType::Custom {
            animated: false,
            id: EmojiId::new(parse_id(id)?),
            name: Some(reaction.name.clone()),
        },
        None => ReactionType::Unicode(reaction.name.clone()),
    })
}
