pub mod channel_selector;
pub mod playback;

pub use channel_selector::{ActiveChannelSelector, select_active_channel};
pub use playback::{CyclePhase, PlaybackController};
