//! Discord Bot event handler and voice receive handler

use crate::ai::ChatClient;
use crate::audio::MeetingRecorder;
use crate::commands;
use crate::config::Config;
use crate::database::Database;
use crate::session::SessionManager;
use serenity::all::{
    ActivityData, Client, Context, EventHandler, GatewayIntents, GuildId, Interaction, Ready,
    UserId, VoiceState,
};
use async_trait::async_trait;
use songbird::events::{Event, EventContext, EventHandler as VoiceEventHandler};
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Bot state shared across handlers
pub struct BotState {
    pub config: Arc<Config>,
    pub db: Arc<Database>,
    pub chat: Arc<ChatClient>,
    pub sessions: Arc<SessionManager>,
}

/// Main event handler for the bot
pub struct Handler {
    pub state: Arc<BotState>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Logged in as {}", ready.user.name);

        ctx.set_activity(Some(ActivityData::listening("your meetings | /help")));

        let commands = commands::register_all();

        // If guild ID is set, register to specific guild (faster for dev)
        if let Some(guild_id) = self.state.config.guild_id {
            let guild = GuildId::new(guild_id);
            match guild.set_commands(&ctx.http, commands).await {
                Ok(cmds) => info!("Registered {} guild commands", cmds.len()),
                Err(e) => error!("Failed to register guild commands: {}", e),
            }
        } else {
            match serenity::all::Command::set_global_commands(&ctx.http, commands).await {
                Ok(cmds) => info!("Registered {} global commands", cmds.len()),
                Err(e) => error!("Failed to register global commands: {}", e),
            }
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            let result = match command.data.name.as_str() {
                "join" => {
                    commands::recording::handle_join(&ctx, &command, self.state.clone()).await
                }
                "stop" => {
                    commands::recording::handle_stop(&ctx, &command, self.state.clone()).await
                }
                "status" => {
                    commands::recording::handle_status(&ctx, &command, self.state.clone()).await
                }
                "chat" => commands::chat::handle_chat(&ctx, &command, self.state.clone()).await,
                "joke" => commands::chat::handle_joke(&ctx, &command, self.state.clone()).await,
                "transcript" => {
                    commands::meetings::handle(&ctx, &command, self.state.clone()).await
                }
                "help" => commands::help::handle(&ctx, &command).await,
                _ => Ok(()),
            };

            if let Err(e) = result {
                error!("Command error: {}", e);
            }
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        // Only watch for the bot itself being dropped from a voice channel
        // (kicked, or the channel was deleted) while a session runs
        if new.user_id != ctx.cache.current_user().id {
            return;
        }
        if new.channel_id.is_some() {
            return;
        }

        let guild_id = new
            .guild_id
            .or_else(|| old.as_ref().and_then(|o| o.guild_id));
        let Some(guild_id) = guild_id else {
            return;
        };

        if !self.state.sessions.is_active(guild_id) {
            return;
        }

        warn!(
            "[{}] Disconnected from voice while recording, salvaging session",
            guild_id
        );
        if let Err(e) = self.state.sessions.finish(&ctx.http, guild_id).await {
            error!("[{}] Failed to salvage session: {}", guild_id, e);
        }
    }
}

/// Voice receive event handler attached to each recorded call
pub struct VoiceReceiver {
    pub recorder: Arc<MeetingRecorder>,
}

#[async_trait]
impl VoiceEventHandler for VoiceReceiver {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        match ctx {
            EventContext::SpeakingStateUpdate(speaking) => {
                // Learn which SSRC belongs to which user
                if let Some(user_id) = speaking.user_id {
                    self.recorder
                        .map_ssrc(speaking.ssrc, UserId::new(user_id.0));
                }
            }
            EventContext::VoiceTick(tick) => {
                self.recorder.process_voice_tick(tick);
            }
            _ => {}
        }

        None
    }
}

/// Create and run the Discord bot
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Arc::new(config);

    let db = Arc::new(Database::open(&config.database_path)?);
    let chat = Arc::new(ChatClient::new(config.gemini_api_key.clone()));
    let sessions = Arc::new(SessionManager::new(config.clone(), db.clone(), chat.clone()));

    let state = Arc::new(BotState {
        config: config.clone(),
        db,
        chat,
        sessions,
    });

    let handler = Handler { state };

    // Voice receive needs the voice-state intent on top of the defaults
    let intents = GatewayIntents::non_privileged() | GatewayIntents::GUILD_VOICE_STATES;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird()
        .await?;

    info!("Starting bot...");
    client.start().await?;

    Ok(())
}
