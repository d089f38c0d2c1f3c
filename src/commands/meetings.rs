//! Meeting commands: /transcript fetches a stored transcript

use serenity::all::{
    CommandInteraction, CommandOptionType, Context, CreateCommand, CreateCommandOption,
    CreateInteractionResponseFollowup, EditInteractionResponse, ResolvedValue,
};
use std::sync::Arc;

use crate::bot::BotState;
use crate::session::format_duration;

use super::{chunk_content, respond, MESSAGE_CHUNK};

/// Register meeting commands
pub fn register() -> Vec<CreateCommand> {
    vec![CreateCommand::new("transcript")
        .description("Fetch the transcript of a finished meeting")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "id",
                "Meeting id from the recording summary",
            )
            .required(true)
            .min_int_value(1),
        )]
}

/// Handle /transcript
pub async fn handle(
    ctx: &Context,
    command: &CommandInteraction,
    state: Arc<BotState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let options = command.data.options();
    let id = options.iter().find_map(|opt| match &opt.value {
        ResolvedValue::Integer(id) if opt.name == "id" => Some(*id),
        _ => None,
    });

    let Some(id) = id else {
        respond(ctx, command, "Give me a meeting id.", true).await?;
        return Ok(());
    };

    // Meetings are only readable from the guild they were recorded in
    let meeting = state
        .db
        .get_meeting(id)?
        .filter(|m| command.guild_id.map(|g| g.get()) == Some(m.guild_id));

    let Some(meeting) = meeting else {
        respond(ctx, command, &format!("No meeting #{} here.", id), true).await?;
        return Ok(());
    };

    let transcript = meeting
        .transcript
        .as_deref()
        .filter(|t| !t.trim().is_empty());
    let Some(transcript) = transcript else {
        respond(
            ctx,
            command,
            &format!("No transcript stored for meeting #{}.", id),
            true,
        )
        .await?;
        return Ok(());
    };

    command.defer(&ctx.http).await?;

    let duration = meeting
        .duration_secs()
        .map(|s| format_duration(s.max(0) as u64))
        .unwrap_or_else(|| "unknown length".to_string());
    let header = format!(
        "📝 **Meeting #{}** in <#{}>: started <t:{}:f>, {}, {} speaker(s)",
        meeting.id,
        meeting.channel_id,
        meeting.started_at.timestamp(),
        duration,
        meeting.participants.len()
    );
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(header))
        .await?;

    // Each chunk goes in its own code fence; leave room for the backticks
    for chunk in chunk_content(transcript, MESSAGE_CHUNK - 8) {
        command
            .create_followup(
                &ctx.http,
                CreateInteractionResponseFollowup::new().content(format!("```\n{}\n```", chunk)),
            )
            .await?;
    }

    Ok(())
}
