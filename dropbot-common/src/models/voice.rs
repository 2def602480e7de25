// File: dropbot-common/src/models/voice.rs

use std::collections::{HashMap, HashSet};

/// The subset of guild channel types the bot cares about.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ChannelKind {
    Text,
    Voice,
    StageVoice,
    Category,
    Other,
}

/// A guild channel as seen in the session cache.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ChannelRecord {
    pub channel_id: u64,
    pub channel_name: String,
    pub kind: ChannelKind,
    /// Category the channel sits under, if any.
    pub parent_id: Option<u64>,
    pub position: i32,
}

impl ChannelRecord {
    pub fn is_voice_in_category(&self, category_id: u64) -> bool {
        self.kind == ChannelKind::Voice && self.parent_id == Some(category_id)
    }
}

/// One member's voice presence. `channel_id` is None when the member is not
/// connected to any voice channel.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VoiceStateRecord {
    pub user_id: u64,
    pub channel_id: Option<u64>,
}

/// Per-channel participant counts, rebuilt for every selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelOccupancy {
    counts: HashMap<u64, usize>,
}

impl ChannelOccupancy {
    /// A member is in at most one channel; repeated states for the same
    /// user count once, first one wins.
    pub fn from_voice_states<'a, I>(states: I) -> Self
    where
        I: IntoIterator<Item = &'a VoiceStateRecord>,
    {
        let mut seen = HashSet::new();
        let mut counts = HashMap::new();
        for state in states {
            let Some(channel_id) = state.channel_id else {
                continue;
            };
            if seen.insert(state.user_id) {
                *counts.entry(channel_id).or_insert(0) += 1;
            }
        }
        Self { counts }
    }

    /// Participants in `channel_id`; unknown channels count as empty.
    pub fn count(&self, channel_id: u64) -> usize {
        self.counts.get(&channel_id).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}
