#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use rollup_agent::{ChatRequest, ChatResponse, LlmProvider, ProviderError, Summarizer};
use rollup_core::config::DigestConfig;
use rollup_core::{
    ChannelKind, ChatMessage, ReactionRef, StarterMessage, ThreadHandle, ThreadKind,
};
use rollup_digest::{ChatGateway, DigestCard, GatewayError, MessageQuery, RollupRunner};
use rollup_store::CheckpointStore;

pub const FORUM: &str = "500";
pub const DIGEST_CHANNEL: &str = "900";

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// A message whose id doubles as its age in minutes after [`base_time`].
pub fn msg(id: u64, author_id: &str, author_name: &str, content: &str) -> ChatMessage {
    ChatMessage {
        id: id.to_string(),
        author_id: author_id.into(),
        author_name: author_name.into(),
        author_is_bot: false,
        content: content.into(),
        created_at: base_time() + chrono::Duration::minutes(id as i64),
    }
}

pub fn bot_msg(id: u64, content: &str) -> ChatMessage {
    ChatMessage {
        author_is_bot: true,
        ..msg(id, "1", "helper-bot", content)
    }
}

pub fn thread(id: &str, name: &str, owner: &str) -> ThreadHandle {
    ThreadHandle {
        id: id.into(),
        name: name.into(),
        kind: ThreadKind::Public,
        owner_id: Some(owner.into()),
        guild_id: Some("1".into()),
        parent_id: Some(FORUM.into()),
    }
}

/// In-memory chat platform.
#[derive(Default)]
pub struct FakeGateway {
    pub channels: HashMap<String, ChannelKind>,
    pub active: Vec<ThreadHandle>,
    pub archived: Vec<ThreadHandle>,
    pub fail_active: bool,
    pub fail_archived: bool,
    /// The archived listing never answers.
    pub hang_archived: bool,
    pub starters: HashMap<String, StarterMessage>,
    /// `(thread id, reaction name)` to reacting user ids.
    pub reactors: HashMap<(String, String), Vec<String>>,
    pub fail_reactions: bool,
    pub history: Mutex<HashMap<String, Vec<ChatMessage>>>,
    pub fail_messages: HashSet<String>,
    /// Threads whose history requests never answer.
    pub hang_messages: HashSet<String>,
    /// `After` queries ignore the anchor and return the oldest messages.
    pub loose_after: bool,
    /// Zero-based indices of `send_cards` calls that fail.
    pub fail_sends: HashSet<usize>,
    pub sends: Mutex<Vec<Vec<DigestCard>>>,
    pub queries: Mutex<Vec<(String, MessageQuery)>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        let mut gw = Self::default();
        gw.channels.insert(DIGEST_CHANNEL.into(), ChannelKind::Text);
        gw.channels.insert(FORUM.into(), ChannelKind::Forum);
        gw
    }

    pub fn with_thread(mut self, handle: ThreadHandle, messages: Vec<ChatMessage>) -> Self {
        self.history
            .lock()
            .unwrap()
            .insert(handle.id.clone(), messages);
        self.active.push(handle);
        self
    }

    pub fn post(&self, thread_id: &str, message: ChatMessage) {
        self.history
            .lock()
            .unwrap()
            .entry(thread_id.to_string())
            .or_default()
            .push(message);
    }

    pub fn opt_out(&mut self, thread_id: &str, reaction: &str, users: &[&str]) {
        self.starters.insert(
            thread_id.into(),
            StarterMessage {
                id: thread_id.into(),
                reactions: vec![ReactionRef {
                    name: reaction.into(),
                    custom_id: None,
                }],
            },
        );
        self.reactors.insert(
            (thread_id.into(), reaction.into()),
            users.iter().map(|u| u.to_string()).collect(),
        );
    }

    pub fn sent_batch_sizes(&self) -> Vec<usize> {
        self.sends.lock().unwrap().iter().map(Vec::len).collect()
    }

    pub fn sent_cards(&self) -> Vec<DigestCard> {
        self.sends.lock().unwrap().iter().flatten().cloned().collect()
    }

    pub fn queries_for(&self, thread_id: &str) -> Vec<MessageQuery> {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == thread_id)
            .map(|(_, q)| q.clone())
            .collect()
    }
}

fn numeric(id: &str) -> u64 {
    id.parse().unwrap()
}

#[async_trait]
impl ChatGateway for FakeGateway {
    async fn channel_kind(&self, channel_id: &str) -> Result<ChannelKind, GatewayError> {
        self.channels
            .get(channel_id)
            .copied()
            .ok_or_else(|| GatewayError::NotFound {
                what: format!("channel {channel_id}"),
            })
    }

    async fn active_threads(&self, _forum_id: &str) -> Result<Vec<ThreadHandle>, GatewayError> {
        if self.fail_active {
            return Err(GatewayError::Platform("active listing down".into()));
        }
        Ok(self.active.clone())
    }

    async fn archived_threads(&self, _forum_id: &str) -> Result<Vec<ThreadHandle>, GatewayError> {
        if self.hang_archived {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail_archived {
            return Err(GatewayError::Platform("archive listing down".into()));
        }
        Ok(self.archived.clone())
    }

    async fn starter_message(
        &self,
        thread: &ThreadHandle,
    ) -> Result<Option<StarterMessage>, GatewayError> {
        Ok(self.starters.get(&thread.id).cloned())
    }

    async fn reaction_users(
        &self,
        thread_id: &str,
        _message_id: &str,
        reaction: &ReactionRef,
    ) -> Result<Vec<String>, GatewayError> {
        if self.fail_reactions {
            return Err(GatewayError::Platform("reactions unavailable".into()));
        }
        Ok(self
            .reactors
            .get(&(thread_id.to_string(), reaction.name.clone()))
            .cloned()
            .unwrap_or_default())
    }

    /// Returns batches newest-first, like the real platform.
    async fn messages(
        &self,
        thread_id: &str,
        query: MessageQuery,
    ) -> Result<Vec<ChatMessage>, GatewayError> {
        self.queries
            .lock()
            .unwrap()
            .push((thread_id.to_string(), query.clone()));
        if self.hang_messages.contains(thread_id) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail_messages.contains(thread_id) {
            return Err(GatewayError::Platform("history unavailable".into()));
        }

        let mut all = self
            .history
            .lock()
            .unwrap()
            .get(thread_id)
            .cloned()
            .unwrap_or_default();
        all.sort_by_key(|m| numeric(&m.id));

        let mut page: Vec<ChatMessage> = match query {
            MessageQuery::Latest { limit } => {
                let skip = all.len().saturating_sub(limit as usize);
                all.into_iter().skip(skip).collect()
            }
            MessageQuery::After { limit, .. } if self.loose_after => {
                all.into_iter().take(limit as usize).collect()
            }
            MessageQuery::After { id, limit } => all
                .into_iter()
                .filter(|m| numeric(&m.id) > numeric(&id))
                .take(limit as usize)
                .collect(),
            MessageQuery::Before { id, limit } => {
                let older: Vec<_> = all
                    .into_iter()
                    .filter(|m| numeric(&m.id) < numeric(&id))
                    .collect();
                let skip = older.len().saturating_sub(limit as usize);
                older.into_iter().skip(skip).collect()
            }
        };
        page.reverse();
        Ok(page)
    }

    async fn send_cards(&self, _channel_id: &str, cards: &[DigestCard]) -> Result<(), GatewayError> {
        let mut sends = self.sends.lock().unwrap();
        let index = sends.len();
        sends.push(cards.to_vec());
        if self.fail_sends.contains(&index) {
            return Err(GatewayError::Platform("payload rejected".into()));
        }
        Ok(())
    }
}

/// Provider that replies from a script, then with a fixed default.
pub struct ScriptedProvider {
    pub script: Mutex<VecDeque<Result<String, u16>>>,
    pub default_reply: String,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(default_reply: &str) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            default_reply: default_reply.into(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = req.messages.last().map(|m| m.content.clone()).unwrap_or_default();
        self.prompts.lock().unwrap().push(prompt);

        let next = self.script.lock().unwrap().pop_front();
        match next.unwrap_or_else(|| Ok(self.default_reply.clone())) {
            Ok(content) => Ok(ChatResponse {
                content,
                model: req.model.clone(),
                tokens_in: 10,
                tokens_out: 5,
                stop_reason: "stop".into(),
            }),
            Err(status) => Err(ProviderError::Api {
                status,
                message: "scripted failure".into(),
            }),
        }
    }
}

pub fn digest_config() -> DigestConfig {
    DigestConfig {
        forum_channel_id: Some(FORUM.into()),
        default_channel_id: Some(DIGEST_CHANNEL.into()),
        call_timeout_secs: 5,
        ..DigestConfig::default()
    }
}

pub fn memory_store() -> Arc<CheckpointStore> {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    rollup_store::db::init_db(&conn).unwrap();
    Arc::new(CheckpointStore::new(conn))
}

pub fn runner_with(
    config: DigestConfig,
    provider: Arc<ScriptedProvider>,
) -> (RollupRunner, Arc<CheckpointStore>) {
    let store = memory_store();
    let summarizer = Summarizer::new(
        Some(provider as Arc<dyn LlmProvider>),
        "gpt-4o-mini",
        0.2,
        Duration::from_secs(5),
    );
    (RollupRunner::new(store.clone(), summarizer, config), store)
}
