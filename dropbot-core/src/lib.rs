// src/lib.rs

pub mod audio;
pub mod config;
pub mod platforms;
pub mod services;
pub mod tasks;

pub use config::BotConfig;
pub use dropbot_common::error::Error;
