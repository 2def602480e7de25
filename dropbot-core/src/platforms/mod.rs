// File: src/platforms/mod.rs

use std::path::Path;

use async_trait::async_trait;
use dropbot_common::models::{ChannelRecord, VoiceStateRecord};

use crate::Error;

#[async_trait]
pub trait PlatformIntegration {
    async fn connect(&mut self) -> Result<(), Error>;
    async fn disconnect(&mut self) -> Result<(), Error>;
}

/// Read-only view of a guild's current channels and voice presence.
///
/// Every call reflects the session state at that moment; nothing is cached
/// between selections.
#[cfg_attr(test, mockall::automock)]
pub trait GuildSnapshot: Send + Sync {
    /// All channels in the guild, in display order.
    fn channels(&self, guild_id: u64) -> Vec<ChannelRecord>;
    fn voice_states(&self, guild_id: u64) -> Vec<VoiceStateRecord>;
}

/// Opens voice connections.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn join(
        &self,
        guild_id: u64,
        channel_id: u64,
        self_mute: bool,
        self_deaf: bool,
    ) -> Result<Box<dyn VoiceConnection>, Error>;
}

/// One open voice connection. Callers must `disconnect` once done with it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceConnection: Send {
    /// Raises or clears the speaking flag. Transports whose driver manages
    /// the flag from outgoing audio may treat this as a no-op.
    async fn set_speaking(&mut self, speaking: bool) -> Result<(), Error>;
    /// Decodes `clip` and sends it until end of stream.
    async fn stream(&mut self, clip: &Path) -> Result<(), Error>;
    async fn disconnect(&mut self) -> Result<(), Error>;
}

// Re-export submodules
pub mod discord;
