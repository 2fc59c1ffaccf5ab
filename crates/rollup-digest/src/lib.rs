//! `rollup-digest`: the incremental thread-digest pipeline.
//!
//! A run discovers the forum's threads, drops ineligible and opted-out ones,
//! fetches each thread's new messages, summarises them, commits the
//! checkpoint, and finally posts the collected digest cards in batches.
//!
//! | Stage      | Module                    |
//! |------------|---------------------------|
//! | Discover   | [`discovery`]             |
//! | Fetch      | [`fetch`]                 |
//! | Summarise  | `rollup_agent`            |
//! | Resolve    | [`mention`]               |
//! | Commit     | `rollup_store`            |
//! | Publish    | [`publish`]               |
//! | Orchestrate| [`runner`]                |

pub mod discovery;
pub mod error;
pub mod fetch;
pub mod gateway;
pub mod item;
pub mod mention;
pub mod publish;
pub mod runner;

pub use error::{GatewayError, RollupError};
pub use gateway::{CardField, ChatGateway, DigestCard, MessageQuery};
pub use item::RollupItem;
pub use runner::{RollupRunner, RunOptions, RunReport};
