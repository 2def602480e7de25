// dropbot-core/src/tasks/clip_drop.rs

use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{error, info, warn};

use dropbot_common::models::ClipInventory;

use crate::Error;
use crate::services::playback::PlaybackController;
use crate::tasks::scheduler::ScheduledTask;

/// Picks a random clip and plays it through the controller on every run.
pub struct ClipDropTask {
    inventory: ClipInventory,
    rng: StdRng,
    controller: PlaybackController,
}

impl ClipDropTask {
    /// A fixed `seed` makes the clip sequence reproducible.
    pub fn new(
        inventory: ClipInventory,
        controller: PlaybackController,
        seed: Option<u64>,
    ) -> Result<Self, Error> {
        if inventory.is_empty() {
            return Err(Error::EmptyInventory("nothing to play".into()));
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            inventory,
            rng,
            controller,
        })
    }

    /// Returns the channel the clip went to.
    pub async fn drop_clip(&mut self) -> Result<u64, Error> {
        let clip = self
            .inventory
            .choose(&mut self.rng)
            .ok_or_else(|| Error::EmptyInventory("nothing to play".into()))?;
        info!("playing [{}]", clip.display());
        self.controller.run_cycle(clip).await
    }
}

#[async_trait]
impl ScheduledTask for ClipDropTask {
    async fn run(&mut self) {
        match self.drop_clip().await {
            Ok(_) => {}
            Err(Error::NoActiveChannel(category)) => {
                info!("Nobody in voice under category {category}; skipping");
            }
            Err(e) if e.is_cycle_recoverable() => warn!("Playback cycle failed: {e}"),
            Err(e) => error!("Playback cycle failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::{MockGuildSnapshot, MockVoiceConnection, MockVoiceGateway, VoiceConnection};
    use crate::services::channel_selector::ActiveChannelSelector;
    use dropbot_common::models::{ChannelKind, ChannelRecord};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    fn empty_guild_controller(voice: MockVoiceGateway) -> PlaybackController {
        let mut snapshot = MockGuildSnapshot::new();
        snapshot.expect_channels().returning(|_| {
            vec![ChannelRecord {
                channel_id: 3,
                channel_name: "lounge".into(),
                kind: ChannelKind::Voice,
                parent_id: Some(2),
                position: 0,
            }]
        });
        snapshot.expect_voice_states().returning(|_| Vec::new());
        PlaybackController::new(
            ActiveChannelSelector::new(Arc::new(snapshot), 1, 2),
            Arc::new(voice),
            Duration::ZERO,
        )
    }

    #[test]
    fn empty_inventory_is_refused() {
        let result = ClipDropTask::new(
            ClipInventory::default(),
            empty_guild_controller(MockVoiceGateway::new()),
            Some(1),
        );
        assert!(matches!(result, Err(Error::EmptyInventory(_))));
    }

    #[tokio::test]
    async fn empty_voice_channels_skip_the_run_without_joining() {
        let mut voice = MockVoiceGateway::new();
        voice.expect_join().never();

        let inventory = ClipInventory::from_paths(vec![PathBuf::from("out/a.wav.dca")]);
        let mut task = ClipDropTask::new(inventory, empty_guild_controller(voice), Some(7)).unwrap();

        assert!(matches!(task.drop_clip().await, Err(Error::NoActiveChannel(2))));
        // The scheduled entry point swallows it.
        task.run().await;
    }

    #[tokio::test]
    async fn streams_one_of_the_inventory_clips() {
        let mut snapshot = MockGuildSnapshot::new();
        snapshot.expect_channels().returning(|_| {
            vec![ChannelRecord {
                channel_id: 3,
                channel_name: "lounge".into(),
                kind: ChannelKind::Voice,
                parent_id: Some(2),
                position: 0,
            }]
        });
        snapshot.expect_voice_states().returning(|_| {
            vec![dropbot_common::models::VoiceStateRecord { user_id: 9, channel_id: Some(3) }]
        });

        let mut connection = MockVoiceConnection::new();
        connection.expect_set_speaking().returning(|_| Ok(()));
        connection
            .expect_stream()
            .withf(|clip| clip == std::path::Path::new("out/a.wav.dca") || clip == std::path::Path::new("out/b.wav.dca"))
            .times(1)
            .returning(|_| Ok(()));
        connection.expect_disconnect().times(1).returning(|| Ok(()));

        let mut voice = MockVoiceGateway::new();
        voice
            .expect_join()
            .return_once(move |_, _, _, _| Ok(Box::new(connection) as Box<dyn VoiceConnection>));

        let controller = PlaybackController::new(
            ActiveChannelSelector::new(Arc::new(snapshot), 1, 2),
            Arc::new(voice),
            Duration::ZERO,
        );
        let inventory = ClipInventory::from_paths(vec![
            PathBuf::from("out/a.wav.dca"),
            PathBuf::from("out/b.wav.dca"),
        ]);
        let mut task = ClipDropTask::new(inventory, controller, Some(42)).unwrap();

        assert_eq!(task.drop_clip().await.unwrap(), 3);
    }
}
