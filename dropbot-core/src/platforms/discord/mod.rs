// File: src/platforms/discord/mod.rs

pub mod auth;
pub mod runtime;
pub mod songbird;

pub use auth::resolve_bot_user_id;
pub use runtime::{CachedGuildSnapshot, DiscordPlatform};
pub use songbird::{SongbirdConnection, SongbirdVoice};
