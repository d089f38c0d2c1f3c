//! Recording commands: /join, /stop, /status

use serenity::all::{
    Colour, CommandInteraction, Context, CreateCommand, CreateEmbed, CreateEmbedFooter,
    CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
};
use std::sync::Arc;
use tracing::info;

use crate::bot::BotState;
use crate::session::format_duration;

use super::respond;

/// Register recording commands
pub fn register() -> Vec<CreateCommand> {
    vec![
        CreateCommand::new("join")
            .description("Join your voice channel and start recording the meeting"),
        CreateCommand::new("stop")
            .description("Stop recording, post the audio and transcribe the meeting"),
        CreateCommand::new("status")
            .description("Show what the current recording has captured so far"),
    ]
}

/// Handle /join
pub async fn handle_join(
    ctx: &Context,
    command: &CommandInteraction,
    state: Arc<BotState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let Some(guild_id) = command.guild_id else {
        respond(ctx, command, "This command only works in a server.", true).await?;
        return Ok(());
    };

    // Find the caller's voice channel from the guild cache
    let voice_channel_id = {
        let guild = ctx.cache.guild(guild_id).ok_or("Guild not in cache")?;
        guild
            .voice_states
            .get(&command.user.id)
            .and_then(|vs| vs.channel_id)
    };

    let Some(voice_channel_id) = voice_channel_id else {
        respond(
            ctx,
            command,
            "Join a voice channel first, then run /join again.",
            true,
        )
        .await?;
        return Ok(());
    };

    if state.sessions.is_active(guild_id) {
        respond(
            ctx,
            command,
            "Already recording in this server. Use /stop to finish the current meeting.",
            true,
        )
        .await?;
        return Ok(());
    }

    // Joining voice can take a moment
    command.defer(&ctx.http).await?;

    let manager = songbird::get(ctx).await.ok_or("Songbird not registered")?;
    let call = manager.join(guild_id, voice_channel_id).await?;

    let session = match state
        .sessions
        .begin(
            ctx.http.clone(),
            manager.clone(),
            guild_id,
            command.channel_id,
            voice_channel_id,
            call,
        )
        .await
    {
        Ok(session) => session,
        Err(e) => {
            // A failed start must not leave the bot parked in the channel
            let _ = manager.leave(guild_id).await;
            let embed = CreateEmbed::new()
                .title("⚠️ Recording failed")
                .colour(Colour::RED)
                .description("Could not start the recording. Try again in a moment.");
            let _ = command
                .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
                .await;
            return Err(e.into());
        }
    };

    let channel_name = ctx
        .cache
        .channel(voice_channel_id)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| "the voice channel".to_string());

    let embed = CreateEmbed::new()
        .title("🎙️ Recording started")
        .colour(Colour::DARK_GREEN)
        .description(format!(
            "Recording **{}** since <t:{}:T>. Finish with /stop.",
            channel_name,
            session.started_at.timestamp()
        ))
        .field("Meeting", format!("#{}", session.meeting_id), true)
        .field(
            "Auto-stop",
            format!("after {}", format_duration(state.config.max_meeting_secs)),
            true,
        )
        .footer(CreateEmbedFooter::new(
            "Let everyone in the call know they are being recorded.",
        ));

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;

    info!(
        "Started recording in guild {} channel {}",
        guild_id, voice_channel_id
    );
    Ok(())
}

/// Handle /stop
pub async fn handle_stop(
    ctx: &Context,
    command: &CommandInteraction,
    state: Arc<BotState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let Some(guild_id) = command.guild_id else {
        respond(ctx, command, "This command only works in a server.", true).await?;
        return Ok(());
    };

    if !state.sessions.is_active(guild_id) {
        respond(
            ctx,
            command,
            "Nothing is being recorded. Start a meeting with /join.",
            true,
        )
        .await?;
        return Ok(());
    }

    respond(ctx, command, "🔄 Wrapping up the recording...", false).await?;

    let manager = songbird::get(ctx).await.ok_or("Songbird not registered")?;
    let result = state.sessions.finish(&ctx.http, guild_id).await;

    // Disconnect even when the wrap-up failed
    let _ = manager.leave(guild_id).await;

    if let Err(e) = result {
        let _ = command
            .edit_response(
                &ctx.http,
                EditInteractionResponse::new()
                    .content("⚠️ Something went wrong while wrapping up the recording."),
            )
            .await;
        return Err(e.into());
    }

    info!("Stopped recording in guild {}", guild_id);
    Ok(())
}

/// Handle /status
pub async fn handle_status(
    ctx: &Context,
    command: &CommandInteraction,
    state: Arc<BotState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let Some(guild_id) = command.guild_id else {
        respond(ctx, command, "This command only works in a server.", true).await?;
        return Ok(());
    };

    let Some(status) = state.sessions.status(guild_id) else {
        respond(
            ctx,
            command,
            "No active recording. Start one with /join.",
            true,
        )
        .await?;
        return Ok(());
    };

    let channel_name = ctx
        .cache
        .channel(status.voice_channel_id)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| "unknown".to_string());

    let started = status.started_at.timestamp();
    let embed = CreateEmbed::new()
        .title("🎙️ Recording in progress")
        .colour(Colour::BLURPLE)
        .field("Channel", format!("🔊 {}", channel_name), true)
        .field("Meeting", format!("#{}", status.meeting_id), true)
        .field("Started", format!("<t:{}:T> (<t:{}:R>)", started, started), false)
        .field("Elapsed", format_duration(status.elapsed_secs), true)
        .field("Auto-stop in", format_duration(status.remaining_secs), true)
        .field(
            "Captured",
            format!(
                "{} speaker(s), {} of audio",
                status.speakers,
                human_bytes(status.buffered_bytes)
            ),
            false,
        );

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().embed(embed),
            ),
        )
        .await?;
    Ok(())
}

fn human_bytes(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;

    let b = bytes as f64;
    if b >= MIB {
        format!("{:.1} MiB", b / MIB)
    } else if b >= KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(0), "0 B");
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(2048), "2.0 KiB");
        assert_eq!(human_bytes(5 * 1024 * 1024), "5.0 MiB");
    }
}
