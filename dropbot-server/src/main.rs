use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use dropbot_core::audio::{FfmpegDcaEncoder, prepare_sounds};
use dropbot_core::platforms::discord::DiscordPlatform;
use dropbot_core::platforms::PlatformIntegration;
use dropbot_core::services::{ActiveChannelSelector, PlaybackController};
use dropbot_core::tasks::{ClipDropTask, Scheduler};
use dropbot_core::{BotConfig, Error};

mod signals;

#[derive(Parser, Debug, Clone)]
#[command(name = "dropbot")]
#[command(author, version, about = "Drops a random sound clip into the busiest voice channel on a timer")]
struct Args {
    /// Folder of source clips (overrides AUDIO_INPUT_FOLDER)
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Folder for encoded clips (overrides AUDIO_OUTPUT_FOLDER)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Seconds between drops (overrides INTERVAL_SECS)
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Seed for clip selection (overrides SEED)
    #[arg(long)]
    seed: Option<u64>,

    /// Encode the sound library and exit without connecting
    #[arg(long, default_value = "false")]
    prepare_only: bool,
}

impl Args {
    fn apply(&self, config: &mut BotConfig) -> Result<(), Error> {
        if let Some(dir) = &self.input_dir {
            config.input_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(secs) = self.interval_secs {
            if secs == 0 {
                return Err(Error::Config("--interval-secs must be greater than zero".into()));
            }
            config.interval = Duration::from_secs(secs);
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        Ok(())
    }
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("dropbot=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(sub)
        .expect("Failed to set global subscriber");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("Fatal: {e}");
        return Err(e.into());
    }
    Ok(())
}

async fn run(args: Args) -> Result<(), Error> {
    let mut config = BotConfig::from_env()?;
    args.apply(&mut config)?;
    info!("DropBot starting. {:?}", config);

    let encoder = FfmpegDcaEncoder::new(config.ffmpeg_path.clone(), config.bitrate_kbps);
    let inventory = prepare_sounds(&config.input_dir, &config.output_dir, &encoder).await?;
    if inventory.is_empty() {
        return Err(Error::EmptyInventory(format!(
            "no encoded clips in {}",
            config.output_dir.display()
        )));
    }
    if args.prepare_only {
        info!("Sound library prepared; exiting (--prepare-only)");
        return Ok(());
    }

    // Listen before anything long-running starts so an early Ctrl-C is not lost.
    let mut shutdown = signals::Shutdown::listen()?;

    let mut discord = DiscordPlatform::new(&config);
    discord.connect().await?;

    tokio::select! {
        ready = discord.wait_until_ready() => ready?,
        signal = shutdown.recv() => {
            info!("Received {signal} before guild {} became available", config.guild_id);
            discord.disconnect().await?;
            return Ok(());
        }
    }

    let selector = ActiveChannelSelector::new(
        Arc::new(discord.guild_snapshot()?),
        config.guild_id,
        config.category_id,
    );
    let controller = PlaybackController::new(
        selector,
        Arc::new(discord.voice_gateway()?),
        config.settle_delay,
    );
    let task = ClipDropTask::new(inventory, controller, config.seed)?;

    let mut scheduler = Scheduler::new();
    scheduler.start(config.interval, task).await?;
    info!("Dropping a clip every {:?}", config.interval);

    let signal = shutdown.recv().await;
    info!("Received {signal}; shutting down");

    scheduler.stop().await;
    if let Err(e) = discord.disconnect().await {
        warn!("Error while disconnecting from Discord: {e}");
    }
    info!("DropBot stopped");
    Ok(())
}
