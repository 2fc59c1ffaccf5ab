//! Shared building blocks for the forum rollup: configuration, the persisted
//! thread checkpoint model, and the platform-neutral message/thread types the
//! pipeline crates pass around.

pub mod config;
pub mod error;
pub mod ids;
pub mod text;
pub mod types;

pub use config::RollupConfig;
pub use error::{ConfigError, Result};
pub use types::{
    ChannelKind, ChatMessage, ReactionRef, StarterMessage, ThreadHandle, ThreadKind, ThreadMemory,
    ThreadState,
};
