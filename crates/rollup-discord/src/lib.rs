pub mod adapter;
pub mod commands;
pub mod embed;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod scheduled;

pub use adapter::DiscordAdapter;
pub use error::DiscordError;
pub use gateway::SerenityGateway;
