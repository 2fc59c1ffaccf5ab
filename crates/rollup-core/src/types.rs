use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a thread as reported by the chat platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadKind {
    Public,
    Private,
    Announcement,
    Other,
}

impl ThreadKind {
    /// Only discussion threads take part in rollups.
    pub fn is_discussion(self) -> bool {
        matches!(self, Self::Public | Self::Private | Self::Announcement)
    }
}

/// Kind of a channel resolved by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Text,
    Announcement,
    Forum,
    Thread,
    Other,
}

impl ChannelKind {
    /// Digests can only be posted into plain or announcement text channels.
    pub fn accepts_digest(self) -> bool {
        matches!(self, Self::Text | Self::Announcement)
    }
}

/// A child thread of the forum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadHandle {
    pub id: String,
    pub name: String,
    pub kind: ThreadKind,
    pub owner_id: Option<String>,
    pub guild_id: Option<String>,
    pub parent_id: Option<String>,
}

impl ThreadHandle {
    /// Display name, falling back to "Untitled".
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            "Untitled"
        } else {
            &self.name
        }
    }

    /// Deep link back to the thread.
    pub fn url(&self) -> String {
        match &self.guild_id {
            Some(guild) => {
                let parent = self.parent_id.as_deref().unwrap_or(&self.id);
                format!("https://discord.com/channels/{guild}/{parent}/{}", self.id)
            }
            None => format!("https://discord.com/channels/@me/{}", self.id),
        }
    }

    /// Mention token for the thread owner, if known.
    pub fn owner_mention(&self) -> Option<String> {
        self.owner_id.as_ref().map(|id| format!("<@{id}>"))
    }
}

/// One message inside a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub author_is_bot: bool,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A reaction present on a message. `custom_id` is set for server emoji.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionRef {
    pub name: String,
    pub custom_id: Option<String>,
}

/// The opening post of a thread, reduced to what the opt-out check needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarterMessage {
    pub id: String,
    pub reactions: Vec<ReactionRef>,
}

/// Prior-context payload stored with each checkpoint.
///
/// Written as `{"schema":"v1",...}`. Rows written before the payload carried
/// a schema tag decode as [`ThreadMemory::Legacy`], so readers can tell
/// "older-shaped memory" apart from "no memory" (a NULL column).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "schema")]
pub enum ThreadMemory {
    #[serde(rename = "v1")]
    V1 {
        summary: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        key_points: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        contributors: Vec<String>,
    },
    #[serde(rename = "legacy")]
    Legacy { summary: Option<String> },
}

#[derive(Deserialize)]
struct UntaggedMemory {
    summary: Option<String>,
}

impl ThreadMemory {
    pub fn new(summary: impl Into<String>) -> Self {
        Self::V1 {
            summary: summary.into(),
            key_points: Vec::new(),
            contributors: Vec::new(),
        }
    }

    /// Most recent summary text, if any.
    pub fn summary(&self) -> Option<&str> {
        match self {
            Self::V1 { summary, .. } => Some(summary.as_str()),
            Self::Legacy { summary } => summary.as_deref(),
        }
        .filter(|s| !s.trim().is_empty())
    }

    /// Decode the stored JSON. Unknown shapes map to an empty legacy payload.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        match serde_json::from_str::<ThreadMemory>(raw) {
            Ok(m) => Ok(m),
            Err(_) => {
                let legacy: UntaggedMemory = serde_json::from_str(raw)?;
                Ok(Self::Legacy {
                    summary: legacy.summary,
                })
            }
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Persisted checkpoint for one thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadState {
    pub thread_id: String,
    pub thread_name: String,
    /// Newest message already folded into a summary.
    pub last_seen_message_id: Option<String>,
    pub last_summary_at: Option<DateTime<Utc>>,
    pub memory: Option<ThreadMemory>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// `false` for the in-memory fallback used when the store is unreachable.
    #[serde(skip)]
    pub persisted: bool,
}

impl ThreadState {
    /// Fresh, unpersisted state with a null cursor.
    pub fn transient(thread_id: &str, thread_name: &str) -> Self {
        let now = Utc::now();
        Self {
            thread_id: thread_id.to_string(),
            thread_name: thread_name.to_string(),
            last_seen_message_id: None,
            last_summary_at: None,
            memory: None,
            created_at: now,
            updated_at: now,
            persisted: false,
        }
    }
}
