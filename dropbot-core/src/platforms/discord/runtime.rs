use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use songbird::Songbird;
use songbird::shards::TwilightMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use twilight_cache_inmemory::{InMemoryCache, ResourceType};
use twilight_gateway::{
    self as gateway,
    CloseFrame,
    Config,
    Event,
    EventTypeFlags,
    Intents,
    Shard,
    MessageSender,
    StreamExt,
};
use twilight_http::Client as HttpClient;
use twilight_http::client::ClientBuilder;
use twilight_model::channel::ChannelType;
use twilight_model::gateway::payload::incoming::{GuildCreate, Ready as ReadyPayload};
use twilight_model::gateway::payload::outgoing::UpdatePresence;
use twilight_model::gateway::presence::{Activity, ActivityType, MinimalActivity, Status};
use twilight_model::id::Id;
use twilight_model::id::marker::GuildMarker;

use dropbot_common::models::{ChannelKind, ChannelRecord, VoiceStateRecord};

use crate::{BotConfig, Error};
use crate::platforms::{GuildSnapshot, PlatformIntegration};
use crate::platforms::discord::auth::resolve_bot_user_id;
use crate::platforms::discord::songbird::SongbirdVoice;

/// The shard runner:
///   - calls `shard.next_event(...)`
///   - updates the in-memory cache
///   - forwards every event to songbird so voice joins can complete
///   - sets the bot presence on READY
///   - flips `ready_tx` once the configured guild is available.
async fn shard_runner(
    mut shard: Shard,
    cache: Arc<InMemoryCache>,
    songbird: Arc<Songbird>,
    guild_id: Id<GuildMarker>,
    status_text: String,
    ready_tx: watch::Sender<bool>,
) {
    let shard_id = shard.id().number();
    info!("(ShardRunner) Shard {shard_id} started. Listening for events.");

    while let Some(item) = shard.next_event(EventTypeFlags::all()).await {
        match item {
            Ok(event) => {
                cache.update(&event);
                songbird.process(&event).await;

                match &event {
                    Event::Ready(ready) => {
                        let data: &ReadyPayload = ready;
                        info!(
                            "Shard {shard_id} => READY as {}#{} (ID={})",
                            data.user.name, data.user.discriminator, data.user.id
                        );
                        match presence_for(&status_text) {
                            Ok(presence) => {
                                if let Err(e) = shard.sender().command(&presence) {
                                    warn!("Shard {shard_id} => failed to set presence: {e:?}");
                                }
                            }
                            Err(e) => warn!("Shard {shard_id} => invalid presence: {e}"),
                        }
                    }
                    Event::GuildCreate(guild) => {
                        if guild.id() == guild_id && matches!(&**guild, GuildCreate::Available(_)) {
                            info!("Shard {shard_id} => guild {guild_id} available");
                            ready_tx.send_replace(true);
                        }
                    }
                    _ => {
                        trace!("Shard {shard_id} => unhandled event: {:?}", event.kind());
                    }
                }
            }
            Err(err) => {
                error!("Shard {shard_id} => error receiving event: {err:?}");
            }
        }
    }

    warn!("(ShardRunner) Shard {shard_id} event loop ended.");
}

/// "Playing <status_text>", online.
pub fn presence_for(status_text: &str) -> Result<UpdatePresence, Error> {
    let activity: Activity = MinimalActivity {
        kind: ActivityType::Playing,
        name: status_text.to_string(),
        url: None,
    }
    .into();

    UpdatePresence::new(vec![activity], false, None::<u64>, Status::Online)
        .map_err(|e| Error::Platform(format!("presence error: {e}")))
}

/// The Discord session: gateway shards, HTTP client, cache and the songbird
/// voice manager that rides on the same shards.
pub struct DiscordPlatform {
    pub token: String,
    pub guild_id: u64,
    pub client_id: Option<u64>,
    pub status_text: String,

    pub shard_tasks: Vec<JoinHandle<()>>,
    pub shard_senders: Vec<MessageSender>,

    pub http: Option<Arc<HttpClient>>,
    pub cache: Option<Arc<InMemoryCache>>,
    pub songbird: Option<Arc<Songbird>>,

    ready_tx: watch::Sender<bool>,
}

impl DiscordPlatform {
    pub fn new(config: &BotConfig) -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self {
            token: config.token.clone(),
            guild_id: config.guild_id,
            client_id: config.client_id,
            status_text: config.status_text.clone(),
            shard_tasks: Vec::new(),
            shard_senders: Vec::new(),
            http: None,
            cache: None,
            songbird: None,
            ready_tx,
        }
    }

    /// Resolves once the configured guild has been received, i.e. the cache
    /// holds its channels and voice states.
    pub async fn wait_until_ready(&self) -> Result<(), Error> {
        let mut rx = self.ready_tx.subscribe();
        rx.wait_for(|ready| *ready)
            .await
            .map(|_| ())
            .map_err(|_| Error::Platform("Discord session closed before becoming ready".into()))
    }

    pub fn is_connected(&self) -> bool {
        !self.shard_tasks.is_empty()
    }

    pub fn guild_snapshot(&self) -> Result<CachedGuildSnapshot, Error> {
        let cache = self
            .cache
            .clone()
            .ok_or_else(|| Error::Platform("Discord cache not available; not connected".into()))?;
        Ok(CachedGuildSnapshot { cache })
    }

    pub fn voice_gateway(&self) -> Result<SongbirdVoice, Error> {
        let manager = self
            .songbird
            .clone()
            .ok_or_else(|| Error::Platform("Songbird not available; not connected".into()))?;
        Ok(SongbirdVoice::new(manager))
    }
}

/// Connect: build the HTTP client and cache, create the recommended shards,
/// attach songbird to them and spawn one runner per shard.
#[async_trait]
impl PlatformIntegration for DiscordPlatform {
    async fn connect(&mut self) -> Result<(), Error> {
        if self.is_connected() {
            info!("(DiscordPlatform) Already connected => skipping");
            return Ok(());
        }
        let guild_id = Id::<GuildMarker>::new_checked(self.guild_id)
            .ok_or_else(|| Error::Config("GUILD_ID must not be zero".into()))?;

        // Prepare the Twilight client:
        let http_client = Arc::new(
            ClientBuilder::new()
                .token(self.token.clone())
                .timeout(Duration::from_secs(30))
                .build()
        );
        self.http = Some(http_client.clone());

        let user_id = resolve_bot_user_id(&http_client, self.client_id).await?;

        // Only what channel selection needs:
        let cache = Arc::new(
            InMemoryCache::builder()
                .resource_types(ResourceType::GUILD | ResourceType::CHANNEL | ResourceType::VOICE_STATE)
                .build()
        );
        self.cache = Some(cache.clone());

        let config = Config::new(
            self.token.clone(),
            Intents::GUILDS | Intents::GUILD_VOICE_STATES,
        );

        let shards: Vec<Shard> = gateway::create_recommended(&http_client, config, |_, b| b.build())
            .await
            .map_err(|e| Error::Platform(format!("create_recommended error: {e}")))?
            .collect();

        let senders: HashMap<u32, MessageSender> = shards
            .iter()
            .map(|shard| (shard.id().number(), shard.sender()))
            .collect();
        let songbird = Arc::new(Songbird::twilight(Arc::new(TwilightMap::new(senders)), user_id));
        self.songbird = Some(songbird.clone());

        for shard in shards {
            self.shard_senders.push(shard.sender());

            let handle = tokio::spawn(shard_runner(
                shard,
                cache.clone(),
                songbird.clone(),
                guild_id,
                self.status_text.clone(),
                self.ready_tx.clone(),
            ));
            self.shard_tasks.push(handle);
        }

        debug!("(DiscordPlatform) {} shard(s) running", self.shard_tasks.len());
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Error> {
        // Gracefully close shards
        for sender in &self.shard_senders {
            let _ = sender.close(CloseFrame::NORMAL);
        }
        // Wait for them
        for task in &mut self.shard_tasks {
            let _ = task.await;
        }

        self.shard_senders.clear();
        self.shard_tasks.clear();
        self.songbird = None;

        info!("(DiscordPlatform) Disconnected");
        Ok(())
    }
}

/// Channel and voice-state view backed by the gateway cache.
#[derive(Clone)]
pub struct CachedGuildSnapshot {
    cache: Arc<InMemoryCache>,
}

impl GuildSnapshot for CachedGuildSnapshot {
    fn channels(&self, guild_id: u64) -> Vec<ChannelRecord> {
        let Some(guild_id) = Id::<GuildMarker>::new_checked(guild_id) else {
            return Vec::new();
        };
        // Copy the ids out so the guild entry isn't held while reading channels.
        let ids: Vec<_> = match self.cache.guild_channels(guild_id) {
            Some(ids) => ids.iter().copied().collect(),
            None => return Vec::new(),
        };

        let mut channels: Vec<ChannelRecord> = ids
            .into_iter()
            .filter_map(|id| self.cache.channel(id))
            .map(|channel| ChannelRecord {
                channel_id: channel.id.get(),
                channel_name: channel.name.clone().unwrap_or_else(|| channel.id.to_string()),
                kind: channel_kind(channel.kind),
                parent_id: channel.parent_id.map(|p| p.get()),
                position: channel.position.unwrap_or_default(),
            })
            .collect();

        // The cache stores ids in a set; restore the order the client shows.
        channels.sort_by_key(|c| (c.position, c.channel_id));
        channels
    }

    fn voice_states(&self, guild_id: u64) -> Vec<VoiceStateRecord> {
        let Some(guild_id) = Id::<GuildMarker>::new_checked(guild_id) else {
            return Vec::new();
        };
        let users: Vec<_> = match self.cache.guild_voice_states(guild_id) {
            Some(users) => users.iter().copied().collect(),
            None => return Vec::new(),
        };

        users
            .into_iter()
            .filter_map(|user_id| {
                self.cache.voice_state(user_id, guild_id).map(|state| VoiceStateRecord {
                    user_id: user_id.get(),
                    channel_id: Some(state.channel_id().get()),
                })
            })
            .collect()
    }
}

pub fn channel_kind(kind: ChannelType) -> ChannelKind {
    match kind {
        ChannelType::GuildText => ChannelKind::Text,
        ChannelType::GuildVoice => ChannelKind::Voice,
        ChannelType::GuildStageVoice => ChannelKind::StageVoice,
        ChannelType::GuildCategory => ChannelKind::Category,
        _ => ChannelKind::Other,
    }
}
