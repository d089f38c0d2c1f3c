//! Scribe - a Discord meeting recorder
//!
//! Records voice meetings per speaker as Ogg Opus, transcribes them with
//! Gemini, and forwards chat prompts to the same model.

mod ai;
mod audio;
mod bot;
mod commands;
mod config;
mod database;
mod logging;
mod session;

use config::Config;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    logging::init();

    info!("Scribe starting...");

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("Please ensure DISCORD_TOKEN and GEMINI_API_KEY are set in .env file");
            std::process::exit(1);
        }
    };

    info!("Configuration loaded successfully");
    if let Some(guild_id) = config.guild_id {
        info!(
            "Development mode: Commands will be registered to guild {}",
            guild_id
        );
    }

    // Create recordings directory
    if let Err(e) = std::fs::create_dir_all(&config.recordings_dir) {
        error!("Failed to create recordings directory: {}", e);
        std::process::exit(1);
    }

    // Run the bot
    if let Err(e) = bot::run(config).await {
        error!("Bot error: {}", e);
        std::process::exit(1);
    }
}
