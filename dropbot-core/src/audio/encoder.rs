// File: dropbot-core/src/audio/encoder.rs

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::Error;
use crate::audio::dca;

/// Turns a source audio file into a playable encoded clip at `output`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClipEncoder: Send + Sync {
    async fn encode(&self, input: &Path, output: &Path) -> Result<(), Error>;
}

/// Decodes any ffmpeg-readable source to 48 kHz stereo PCM, then encodes raw
/// DCA frames with Opus.
pub struct FfmpegDcaEncoder {
    ffmpeg_path: PathBuf,
    bitrate_kbps: u32,
}

impl FfmpegDcaEncoder {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, bitrate_kbps: u32) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            bitrate_kbps,
        }
    }

    async fn decode_to_pcm(&self, input: &Path) -> Result<Vec<i16>, Error> {
        let output = Command::new(&self.ffmpeg_path)
            .args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(input)
            .args(["-f", "s16le", "-ar", "48000", "-ac", "2", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::Encode(format!("failed to run {}: {e}", self.ffmpeg_path.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Encode(format!(
                "ffmpeg exited with {} for {}: {}",
                output.status,
                input.display(),
                stderr.trim()
            )));
        }

        Ok(output
            .stdout
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect())
    }
}

#[async_trait]
impl ClipEncoder for FfmpegDcaEncoder {
    async fn encode(&self, input: &Path, output: &Path) -> Result<(), Error> {
        let pcm = self.decode_to_pcm(input).await?;
        debug!("Decoded {} samples from {}", pcm.len(), input.display());

        let bitrate = self.bitrate_kbps;
        let output = output.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<(), Error> {
            let encoded = dca::encode_frames(&pcm, bitrate)?;
            persist_atomically(&output, &encoded)
        })
        .await
        .map_err(|e| Error::TaskJoin(e.to_string()))?
    }
}

/// Prefix and suffix of in-flight encodes; anything named like this in the
/// output directory is a leftover, never a clip.
pub const PARTIAL_PREFIX: &str = ".dropbot-";
pub const PARTIAL_SUFFIX: &str = ".partial";

pub fn is_partial_name(name: &str) -> bool {
    name.starts_with(PARTIAL_PREFIX) && name.ends_with(PARTIAL_SUFFIX)
}

/// Writes through a temp file next to `path` so a failed write never leaves
/// a half-written clip behind.
pub fn persist_atomically(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(PARTIAL_PREFIX)
        .suffix(PARTIAL_SUFFIX)
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
