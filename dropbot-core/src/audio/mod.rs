//! src/audio/mod.rs
//!
//! Sound library preparation: transcoding source clips into raw DCA frames
//! and caching them in the output directory.

pub mod dca;
pub mod encoder;
pub mod preparer;

pub use encoder::{ClipEncoder, FfmpegDcaEncoder};
pub use preparer::{ENCODED_EXTENSION, encoded_path_for, prepare_sounds};
