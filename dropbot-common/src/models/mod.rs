// File: dropbot-common/src/models/mod.rs
pub mod clip;
pub mod voice;

pub use clip::ClipInventory;
pub use voice::{ChannelKind, ChannelOccupancy, ChannelRecord, VoiceStateRecord};
