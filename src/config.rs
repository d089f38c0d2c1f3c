//! Configuration management for Scribe
//!
//! Loads settings from environment variables (.env file)

use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Discord bot token
    pub discord_token: String,
    /// Gemini API key
    pub gemini_api_key: String,
    /// Optional guild ID for development (faster command sync)
    pub guild_id: Option<u64>,
    /// Directory for per-user meeting recordings
    pub recordings_dir: PathBuf,
    /// Path to the meetings database
    pub database_path: PathBuf,
    /// Maximum meeting length before the watchdog stops the recording
    pub max_meeting_secs: u64,
    /// Audio sample rate (Discord uses 48kHz)
    pub sample_rate: u32,
    /// Audio channels (Discord uses stereo)
    pub channels: u8,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let discord_token = env::var("DISCORD_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("DISCORD_TOKEN".to_string()))?;

        let gemini_api_key = env::var("GEMINI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("GEMINI_API_KEY".to_string()))?;

        let guild_id = env::var("GUILD_ID")
            .ok()
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<u64>()
                    .map_err(|_| ConfigError::InvalidValue("GUILD_ID".to_string(), s))
            })
            .transpose()?;

        let recordings_dir = env::var("RECORDINGS_DIR")
            .unwrap_or_else(|_| "recordings".to_string())
            .into();

        let database_path = env::var("DATABASE_PATH")
            .unwrap_or_else(|_| "scribe.db".to_string())
            .into();

        let max_meeting_secs = env::var("MAX_MEETING_SECS")
            .ok()
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<u64>()
                    .map_err(|_| ConfigError::InvalidValue("MAX_MEETING_SECS".to_string(), s))
            })
            .transpose()?
            .unwrap_or(5 * 3600);

        Ok(Self {
            discord_token,
            gemini_api_key,
            guild_id,
            recordings_dir,
            database_path,
            max_meeting_secs,
            sample_rate: 48000,
            channels: 2,
        })
    }
}

/// Gemini model identifiers
pub mod models {
    pub const GEMINI_FLASH: &str = "gemini-2.0-flash";
}
