// File: dropbot-core/src/config.rs
//
// Process configuration, read once at startup and passed explicitly to the
// preparer, selector and scheduler.

use std::path::PathBuf;
use std::time::Duration;

use crate::Error;

pub const DEFAULT_INPUT_FOLDER: &str = "../resources/audio/";
pub const DEFAULT_OUTPUT_FOLDER: &str = "../resources/encoded/";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(250);
pub const DEFAULT_BITRATE_KBPS: u32 = 96;
pub const DEFAULT_STATUS_TEXT: &str = "😈";

#[derive(Clone)]
pub struct BotConfig {
    pub token: String,
    /// The bot's own user id. Looked up over HTTP when not configured.
    pub client_id: Option<u64>,
    pub guild_id: u64,
    pub category_id: u64,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub interval: Duration,
    pub settle_delay: Duration,
    pub bitrate_kbps: u32,
    pub ffmpeg_path: PathBuf,
    pub status_text: String,
    pub seed: Option<u64>,
}

// Keep the token out of logs.
impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("guild_id", &self.guild_id)
            .field("category_id", &self.category_id)
            .field("input_dir", &self.input_dir)
            .field("output_dir", &self.output_dir)
            .field("interval", &self.interval)
            .field("settle_delay", &self.settle_delay)
            .field("bitrate_kbps", &self.bitrate_kbps)
            .field("ffmpeg_path", &self.ffmpeg_path)
            .field("status_text", &self.status_text)
            .field("seed", &self.seed)
            .finish()
    }
}

impl BotConfig {
    /// Loads `.env` (if any) and reads the process environment.
    pub fn from_env() -> Result<Self, Error> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Missing or invalid
    /// identifiers fail here, before any connection is attempted.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let token = get("TOKEN").ok_or_else(|| Error::Config("TOKEN is not set".into()))?;
        let guild_id = parse_snowflake("GUILD_ID", get("GUILD_ID"))?
            .ok_or_else(|| Error::Config("GUILD_ID is not set".into()))?;
        let category_id = parse_snowflake("CATEGORY_ID", get("CATEGORY_ID"))?
            .ok_or_else(|| Error::Config("CATEGORY_ID is not set".into()))?;
        let client_id = parse_snowflake("CLIENT_ID", get("CLIENT_ID"))?;

        let interval = match get("INTERVAL_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .parse()
                    .map_err(|_| Error::Config(format!("INTERVAL_SECS is not a number: {raw}")))?;
                if secs == 0 {
                    return Err(Error::Config("INTERVAL_SECS must be greater than zero".into()));
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_INTERVAL,
        };

        let seed = match get("SEED") {
            Some(raw) => Some(
                raw.parse::<u64>()
                    .map_err(|_| Error::Config(format!("SEED is not a number: {raw}")))?,
            ),
            None => None,
        };

        Ok(Self {
            token,
            client_id,
            guild_id,
            category_id,
            input_dir: get("AUDIO_INPUT_FOLDER")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT_FOLDER)),
            output_dir: get("AUDIO_OUTPUT_FOLDER")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_FOLDER)),
            interval,
            settle_delay: DEFAULT_SETTLE_DELAY,
            bitrate_kbps: DEFAULT_BITRATE_KBPS,
            ffmpeg_path: get("FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("ffmpeg")),
            status_text: get("STATUS_TEXT").unwrap_or_else(|| DEFAULT_STATUS_TEXT.to_string()),
            seed,
        })
    }
}

/// Discord ids are non-zero u64 snowflakes.
fn parse_snowflake(key: &str, raw: Option<String>) -> Result<Option<u64>, Error> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.parse::<u64>() {
        Ok(0) => Err(Error::Config(format!("{key} must not be zero"))),
        Ok(id) => Ok(Some(id)),
        Err(_) => Err(Error::Config(format!("{key} is not a valid id: {raw}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn minimal_environment_uses_defaults() {
        let cfg = BotConfig::from_lookup(lookup_from(&[
            ("TOKEN", "abc"),
            ("GUILD_ID", "111"),
            ("CATEGORY_ID", "222"),
        ]))
        .expect("valid config");

        assert_eq!(cfg.guild_id, 111);
        assert_eq!(cfg.category_id, 222);
        assert_eq!(cfg.client_id, None);
        assert_eq!(cfg.interval, Duration::from_secs(60));
        assert_eq!(cfg.settle_delay, Duration::from_millis(250));
        assert_eq!(cfg.bitrate_kbps, 96);
        assert_eq!(cfg.input_dir, PathBuf::from(DEFAULT_INPUT_FOLDER));
        assert_eq!(cfg.output_dir, PathBuf::from(DEFAULT_OUTPUT_FOLDER));
        assert_eq!(cfg.seed, None);
    }

    #[test]
    fn overrides_are_honoured() {
        let cfg = BotConfig::from_lookup(lookup_from(&[
            ("TOKEN", "abc"),
            ("GUILD_ID", "111"),
            ("CATEGORY_ID", "222"),
            ("CLIENT_ID", "333"),
            ("AUDIO_INPUT_FOLDER", "/clips/in"),
            ("AUDIO_OUTPUT_FOLDER", "/clips/out"),
            ("INTERVAL_SECS", "300"),
            ("SEED", "7"),
            ("STATUS_TEXT", "lurking"),
        ]))
        .expect("valid config");

        assert_eq!(cfg.client_id, Some(333));
        assert_eq!(cfg.input_dir, PathBuf::from("/clips/in"));
        assert_eq!(cfg.output_dir, PathBuf::from("/clips/out"));
        assert_eq!(cfg.interval, Duration::from_secs(300));
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.status_text, "lurking");
    }

    #[test]
    fn missing_category_fails_fast() {
        let err = BotConfig::from_lookup(lookup_from(&[("TOKEN", "abc"), ("GUILD_ID", "111")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("CATEGORY_ID")));
    }

    #[test]
    fn blank_and_zero_ids_are_rejected() {
        let blank = BotConfig::from_lookup(lookup_from(&[
            ("TOKEN", "abc"),
            ("GUILD_ID", "   "),
            ("CATEGORY_ID", "222"),
        ]));
        assert!(matches!(blank, Err(Error::Config(_))));

        let zero = BotConfig::from_lookup(lookup_from(&[
            ("TOKEN", "abc"),
            ("GUILD_ID", "0"),
            ("CATEGORY_ID", "222"),
        ]));
        assert!(matches!(zero, Err(Error::Config(msg)) if msg.contains("zero")));
    }

    #[test]
    fn debug_output_redacts_token() {
        let cfg = BotConfig::from_lookup(lookup_from(&[
            ("TOKEN", "super-secret"),
            ("GUILD_ID", "111"),
            ("CATEGORY_ID", "222"),
        ]))
        .expect("valid config");
        assert!(!format!("{cfg:?}").contains("super-secret"));
    }
}
