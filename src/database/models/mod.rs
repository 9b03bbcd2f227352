pub mod cooldown;
pub mod guild_config;
pub mod room;

// Re-export all models for convenience
pub use cooldown::Cooldown;
pub use guild_config::{GuildConfig, NewGuildConfig};
pub use room::Room;
