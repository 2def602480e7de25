// ================================================================
// File: dropbot-common/src/error.rs
// ================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Parse error: {0}")]
    Parse(String),

    // Startup-fatal sound library failures:
    #[error("Encoding error: {0}")]
    Encode(String),

    #[error("No playable clips: {0}")]
    EmptyInventory(String),

    // Per-cycle failures, logged and skipped by the scheduler:
    #[error("No active voice channel in category {0}")]
    NoActiveChannel(u64),

    #[error("Voice join error: {0}")]
    VoiceJoin(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Task join error: {0}")]
    TaskJoin(String),
}

impl Error {
    /// Whether a playback cycle that failed with this error should leave the
    /// process running. Everything a single tick can produce is recoverable.
    pub fn is_cycle_recoverable(&self) -> bool {
        matches!(
            self,
            Error::NoActiveChannel(_)
                | Error::VoiceJoin(_)
                | Error::Stream(_)
                | Error::Io(_)
                | Error::Platform(_)
        )
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Parse(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Parse(s.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Self {
        Error::Parse(err.to_string())
    }
}
