//! `rollup-store`: SQLite persistence for per-thread rollup checkpoints.

pub mod db;
pub mod error;
pub mod store;

pub use error::{Result, StoreError};
pub use store::{CheckpointCommit, CheckpointStore};
