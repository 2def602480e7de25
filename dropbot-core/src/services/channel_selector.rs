// File: dropbot-core/src/services/channel_selector.rs

use std::sync::Arc;

use tracing::debug;

use dropbot_common::models::{ChannelOccupancy, ChannelRecord};

use crate::Error;
use crate::platforms::GuildSnapshot;

/// Picks the busiest voice channel in `category_id`.
///
/// Linear scan with a running best and a strict `>` comparison, so among
/// channels with the same count the first one in `channels` order wins. A
/// best count of zero means nobody is around and no channel is returned.
pub fn select_active_channel<'a>(
    channels: &'a [ChannelRecord],
    occupancy: &ChannelOccupancy,
    category_id: u64,
) -> Result<&'a ChannelRecord, Error> {
    let mut best: Option<&ChannelRecord> = None;
    let mut max = 0usize;

    for channel in channels.iter().filter(|c| c.is_voice_in_category(category_id)) {
        let count = occupancy.count(channel.channel_id);
        if count > max {
            max = count;
            best = Some(channel);
        }
    }

    best.ok_or(Error::NoActiveChannel(category_id))
}

/// Runs [`select_active_channel`] against a fresh snapshot of the guild.
pub struct ActiveChannelSelector {
    snapshot: Arc<dyn GuildSnapshot>,
    guild_id: u64,
    category_id: u64,
}

impl ActiveChannelSelector {
    pub fn new(snapshot: Arc<dyn GuildSnapshot>, guild_id: u64, category_id: u64) -> Self {
        Self {
            snapshot,
            guild_id,
            category_id,
        }
    }

    pub fn guild_id(&self) -> u64 {
        self.guild_id
    }

    pub fn select(&self) -> Result<ChannelRecord, Error> {
        let channels = self.snapshot.channels(self.guild_id);
        let occupancy = ChannelOccupancy::from_voice_states(&self.snapshot.voice_states(self.guild_id));
        debug!(
            "Selecting among {} channel(s), {} member(s) in voice",
            channels.len(),
            occupancy.total()
        );
        select_active_channel(&channels, &occupancy, self.category_id).cloned()
    }
}
