//! Chat commands: /chat and /joke forward prompts to the AI service

use serenity::all::{
    CommandInteraction, CommandOptionType, Context, CreateCommand, CreateCommandOption,
    CreateInteractionResponseFollowup, EditInteractionResponse, ResolvedValue,
};
use std::sync::Arc;
use tracing::{error, info};

use crate::ai::ChatError;
use crate::bot::BotState;

use super::{chunk_content, respond, MESSAGE_CHUNK};

/// Prompt used by /joke
const JOKE_PROMPT: &str =
    "Tell one short, original, family-friendly joke. Reply with the joke only.";

/// Register chat commands
pub fn register() -> Vec<CreateCommand> {
    vec![
        CreateCommand::new("chat")
            .description("Ask the AI anything")
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "prompt", "What to ask")
                    .required(true),
            ),
        CreateCommand::new("joke").description("Get a joke from the AI"),
    ]
}

/// Handle /chat
pub async fn handle_chat(
    ctx: &Context,
    command: &CommandInteraction,
    state: Arc<BotState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let options = command.data.options();
    let prompt = options.iter().find_map(|opt| match &opt.value {
        ResolvedValue::String(s) if opt.name == "prompt" => Some(s.to_string()),
        _ => None,
    });

    let Some(prompt) = prompt else {
        respond(ctx, command, "Give me a prompt to send.", true).await?;
        return Ok(());
    };

    forward(ctx, command, state, &prompt).await
}

/// Handle /joke
pub async fn handle_joke(
    ctx: &Context,
    command: &CommandInteraction,
    state: Arc<BotState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    forward(ctx, command, state, JOKE_PROMPT).await
}

/// Defer, forward the prompt verbatim and post the reply in
/// message-sized chunks
async fn forward(
    ctx: &Context,
    command: &CommandInteraction,
    state: Arc<BotState>,
    prompt: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    command.defer(&ctx.http).await?;

    let reply = match state.chat.chat(prompt).await {
        Ok(reply) => reply,
        Err(ChatError::RateLimited) => {
            "⚠️ The AI service is rate limited right now. Try again in a minute.".to_string()
        }
        Err(e) => {
            error!("Chat request failed: {}", e);
            command
                .edit_response(
                    &ctx.http,
                    EditInteractionResponse::new()
                        .content("Something went wrong talking to the AI service. Try again later."),
                )
                .await?;
            return Ok(());
        }
    };

    let mut chunks = chunk_content(&reply, MESSAGE_CHUNK).into_iter();

    let first = chunks.next().unwrap_or_else(|| "(no reply)".to_string());
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(first))
        .await?;

    for chunk in chunks {
        command
            .create_followup(
                &ctx.http,
                CreateInteractionResponseFollowup::new().content(chunk),
            )
            .await?;
    }

    info!(
        "Answered /{} for {}",
        command.data.name, command.user.name
    );
    Ok(())
}
