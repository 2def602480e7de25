//! songbird.rs
//!
//! Voice connections through Songbird. Clips are decoded from raw DCA frames
//! to PCM and played as a single track; the track's end or error event
//! completes the stream.

use std::future::Future;
use std::io::Cursor;
use std::num::NonZeroU64;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use songbird::error::JoinError;
use songbird::input::{Input, RawAdapter};
use songbird::tracks::{ControlError, PlayMode};
use songbird::{Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent};
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

use crate::Error;
use crate::audio::dca;
use crate::platforms::{VoiceConnection, VoiceGateway};

fn non_zero(id: u64, what: &str) -> Result<NonZeroU64, Error> {
    NonZeroU64::new(id).ok_or_else(|| Error::Config(format!("{what} id must not be zero")))
}

/// Joins voice channels with the shared Songbird manager.
pub struct SongbirdVoice {
    manager: Arc<Songbird>,
}

impl SongbirdVoice {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }

    async fn leave_quietly(&self, guild: NonZeroU64) {
        if let Err(e) = self.manager.remove(guild).await {
            debug!("cleanup after failed join: {e}");
        }
    }
}

async fn apply_self_state(call: &Mutex<Call>, self_mute: bool, self_deaf: bool) -> Result<(), Error> {
    let mut handler = call.lock().await;
    handler
        .mute(self_mute)
        .await
        .map_err(|e| Error::VoiceJoin(format!("mute: {e}")))?;
    handler
        .deafen(self_deaf)
        .await
        .map_err(|e| Error::VoiceJoin(format!("deafen: {e}")))?;
    Ok(())
}

/// Runs `cleanup` before handing back a failed `result`.
async fn leave_on_error<T, C, Fut>(result: Result<T, Error>, cleanup: C) -> Result<T, Error>
where
    C: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    if result.is_err() {
        cleanup().await;
    }
    result
}

#[async_trait]
impl VoiceGateway for SongbirdVoice {
    async fn join(
        &self,
        guild_id: u64,
        channel_id: u64,
        self_mute: bool,
        self_deaf: bool,
    ) -> Result<Box<dyn VoiceConnection>, Error> {
        let guild = non_zero(guild_id, "guild")?;
        let channel = non_zero(channel_id, "channel")?;

        let call = match self.manager.join(guild, channel).await {
            Ok(call) => call,
            Err(e) => {
                // A failed join can leave a half-open call behind.
                self.leave_quietly(guild).await;
                return Err(Error::VoiceJoin(format!("join {channel_id} failed: {e}")));
            }
        };

        // The call is live from here on; the caller only gets a connection
        // to disconnect once this returns Ok.
        let configured = apply_self_state(&call, self_mute, self_deaf).await;
        leave_on_error(configured, || self.leave_quietly(guild)).await?;

        Ok(Box::new(SongbirdConnection {
            manager: self.manager.clone(),
            guild,
            call,
        }))
    }
}

pub struct SongbirdConnection {
    manager: Arc<Songbird>,
    guild: NonZeroU64,
    call: Arc<Mutex<Call>>,
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    async fn set_speaking(&mut self, speaking: bool) -> Result<(), Error> {
        // Songbird's driver raises and clears the speaking flag itself
        // whenever the mixer has live audio.
        debug!("speaking={speaking} (driver-managed) in guild {}", self.guild);
        Ok(())
    }

    async fn stream(&mut self, clip: &Path) -> Result<(), Error> {
        let bytes = tokio::fs::read(clip).await?;
        let pcm = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, Error> {
            let frames = dca::read_frames(&mut bytes.as_slice())?;
            let samples = dca::decode_frames(&frames)?;
            Ok(dca::pcm_to_le_bytes(&samples))
        })
        .await
        .map_err(|e| Error::TaskJoin(e.to_string()))??;

        let input: Input =
            RawAdapter::new(Cursor::new(pcm), dca::SAMPLE_RATE, dca::CHANNELS as u32).into();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let track = {
            let mut handler = self.call.lock().await;
            handler.play_input(input)
        };

        for event in [TrackEvent::End, TrackEvent::Error] {
            match track.add_event(Event::Track(event), TrackOutcomeNotifier { tx: tx.clone() }) {
                Ok(()) => {}
                // Too short to catch: it already played out.
                Err(ControlError::Finished) => return Ok(()),
                Err(e) => return Err(Error::Stream(format!("track event registration: {e}"))),
            }
        }
        drop(tx);

        match rx.recv().await {
            Some(Ok(())) => Ok(()),
            Some(Err(reason)) => Err(Error::Stream(reason)),
            None => Err(Error::Stream("track dropped without an end event".into())),
        }
    }

    async fn disconnect(&mut self) -> Result<(), Error> {
        match self.manager.remove(self.guild).await {
            Ok(()) | Err(JoinError::NoCall) => Ok(()),
            Err(e) => Err(Error::Platform(format!("leave failed: {e}"))),
        }
    }
}

/// Reports the first end/error event of a track.
struct TrackOutcomeNotifier {
    tx: mpsc::UnboundedSender<Result<(), String>>,
}

#[async_trait]
impl VoiceEventHandler for TrackOutcomeNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            for (state, _handle) in tracks.iter() {
                let outcome = match &state.playing {
                    PlayMode::Errored(e) => Err(format!("{e:?}")),
                    _ => Ok(()),
                };
                // The receiver is gone once the first outcome was taken.
                let _ = self.tx.send(outcome);
            }
        }
        None
    }
}
