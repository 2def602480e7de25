// File: dropbot-core/src/services/playback.rs
//
// One playback cycle:
//   SELECT -> JOIN -> SETTLE_IN -> SPEAKING_ON -> STREAM -> SPEAKING_OFF
//   -> SETTLE_OUT -> LEAVE
// Once JOIN succeeds, LEAVE always runs, whatever happened in between.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::Error;
use crate::platforms::{VoiceConnection, VoiceGateway};
use crate::services::channel_selector::ActiveChannelSelector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Select,
    Join,
    SettleIn,
    SpeakingOn,
    Stream,
    SpeakingOff,
    SettleOut,
    Leave,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CyclePhase::Select => "SELECT",
            CyclePhase::Join => "JOIN",
            CyclePhase::SettleIn => "SETTLE_IN",
            CyclePhase::SpeakingOn => "SPEAKING_ON",
            CyclePhase::Stream => "STREAM",
            CyclePhase::SpeakingOff => "SPEAKING_OFF",
            CyclePhase::SettleOut => "SETTLE_OUT",
            CyclePhase::Leave => "LEAVE",
        };
        f.write_str(name)
    }
}

pub struct PlaybackController {
    selector: ActiveChannelSelector,
    voice: Arc<dyn VoiceGateway>,
    settle_delay: Duration,
}

impl PlaybackController {
    pub fn new(
        selector: ActiveChannelSelector,
        voice: Arc<dyn VoiceGateway>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            selector,
            voice,
            settle_delay,
        }
    }

    /// Plays `clip` in the busiest channel and leaves. Returns the channel
    /// that was played to.
    pub async fn run_cycle(&self, clip: &Path) -> Result<u64, Error> {
        debug!("cycle => {}", CyclePhase::Select);
        let channel = self.selector.select()?;
        let channel_id = channel.channel_id;

        debug!("cycle => {} channel {}", CyclePhase::Join, channel_id);
        let mut connection = self
            .voice
            .join(self.selector.guild_id(), channel_id, false, true)
            .await?;

        let played = self.play(connection.as_mut(), clip).await;

        debug!("cycle => {}", CyclePhase::Leave);
        if let Err(e) = connection.disconnect().await {
            warn!("Failed to leave channel {} ({}): {}", channel.channel_name, channel_id, e);
        }

        played?;
        info!(
            "played [{}] in channel {} ({})",
            clip.display(),
            channel.channel_name,
            channel_id
        );
        Ok(channel_id)
    }

    async fn play(&self, connection: &mut dyn VoiceConnection, clip: &Path) -> Result<(), Error> {
        debug!("cycle => {}", CyclePhase::SettleIn);
        sleep(self.settle_delay).await;

        debug!("cycle => {}", CyclePhase::SpeakingOn);
        connection.set_speaking(true).await?;

        debug!("cycle => {}", CyclePhase::Stream);
        connection.stream(clip).await?;

        debug!("cycle => {}", CyclePhase::SpeakingOff);
        connection.set_speaking(false).await?;

        debug!("cycle => {}", CyclePhase::SettleOut);
        sleep(self.settle_delay).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::{MockGuildSnapshot, MockVoiceConnection, MockVoiceGateway};
    use dropbot_common::models::{ChannelKind, ChannelRecord, VoiceStateRecord};
    use mockall::Sequence;
    use mockall::predicate::eq;
    use std::path::PathBuf;

    const GUILD: u64 = 10;
    const CATEGORY: u64 = 20;

    fn snapshot_with_members(members: usize) -> Arc<MockGuildSnapshot> {
        let mut snapshot = MockGuildSnapshot::new();
        snapshot.expect_channels().returning(|_| {
            vec![ChannelRecord {
                channel_id: 30,
                channel_name: "hangout".into(),
                kind: ChannelKind::Voice,
                parent_id: Some(CATEGORY),
                position: 0,
            }]
        });
        snapshot.expect_voice_states().returning(move |_| {
            (0..members as u64)
                .map(|user_id| VoiceStateRecord { user_id, channel_id: Some(30) })
                .collect()
        });
        Arc::new(snapshot)
    }

    fn controller(members: usize, voice: MockVoiceGateway) -> PlaybackController {
        PlaybackController::new(
            ActiveChannelSelector::new(snapshot_with_members(members), GUILD, CATEGORY),
            Arc::new(voice),
            Duration::ZERO,
        )
    }

    #[tokio::test]
    async fn full_cycle_runs_phases_in_order() {
        let mut seq = Sequence::new();
        let mut connection = MockVoiceConnection::new();
        connection
            .expect_set_speaking()
            .with(eq(true))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        connection
            .expect_stream()
            .withf(|clip| clip == Path::new("clips/a.wav.dca"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        connection
            .expect_set_speaking()
            .with(eq(false))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        connection
            .expect_disconnect()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));

        let mut voice = MockVoiceGateway::new();
        voice
            .expect_join()
            .with(eq(GUILD), eq(30), eq(false), eq(true))
            .times(1)
            .return_once(move |_, _, _, _| Ok(Box::new(connection) as Box<dyn VoiceConnection>));

        let played = controller(2, voice)
            .run_cycle(&PathBuf::from("clips/a.wav.dca"))
            .await
            .unwrap();
        assert_eq!(played, 30);
    }

    #[tokio::test]
    async fn no_active_channel_never_joins() {
        let mut voice = MockVoiceGateway::new();
        voice.expect_join().never();

        let err = controller(0, voice)
            .run_cycle(Path::new("clips/a.wav.dca"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoActiveChannel(CATEGORY)));
    }

    #[tokio::test]
    async fn stream_failure_still_disconnects() {
        let mut connection = MockVoiceConnection::new();
        connection.expect_set_speaking().with(eq(true)).returning(|_| Ok(()));
        connection
            .expect_stream()
            .times(1)
            .returning(|_| Err(Error::Stream("udp socket closed".into())));
        connection.expect_set_speaking().with(eq(false)).never();
        connection.expect_disconnect().times(1).returning(|| Ok(()));

        let mut voice = MockVoiceGateway::new();
        voice
            .expect_join()
            .return_once(move |_, _, _, _| Ok(Box::new(connection) as Box<dyn VoiceConnection>));

        let err = controller(1, voice)
            .run_cycle(Path::new("clips/a.wav.dca"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Stream(_)));
    }

    #[tokio::test]
    async fn join_failure_has_nothing_to_release() {
        let mut voice = MockVoiceGateway::new();
        voice
            .expect_join()
            .times(1)
            .returning(|_, _, _, _| Err(Error::VoiceJoin("gateway timeout".into())));

        let err = controller(3, voice)
            .run_cycle(Path::new("clips/a.wav.dca"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::VoiceJoin(_)));
    }

    #[tokio::test]
    async fn leave_failure_after_a_good_play_is_only_logged() {
        let mut connection = MockVoiceConnection::new();
        connection.expect_set_speaking().returning(|_| Ok(()));
        connection.expect_stream().returning(|_| Ok(()));
        connection
            .expect_disconnect()
            .times(1)
            .returning(|| Err(Error::Platform("already gone".into())));

        let mut voice = MockVoiceGateway::new();
        voice
            .expect_join()
            .return_once(move |_, _, _, _| Ok(Box::new(connection) as Box<dyn VoiceConnection>));

        assert_eq!(controller(1, voice).run_cycle(Path::new("x.dca")).await.unwrap(), 30);
    }

    #[test]
    fn phases_display_as_state_names() {
        assert_eq!(CyclePhase::SettleIn.to_string(), "SETTLE_IN");
        assert_eq!(CyclePhase::SpeakingOff.to_string(), "SPEAKING_OFF");
    }
}
