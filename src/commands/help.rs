//! Help command

use serenity::all::{
    Colour, CommandInteraction, Context, CreateCommand, CreateEmbed, CreateInteractionResponse,
    CreateInteractionResponseMessage,
};

/// Register the help command
pub fn register() -> Vec<CreateCommand> {
    vec![CreateCommand::new("help").description("Show what this bot can do")]
}

/// Handle /help
pub async fn handle(
    ctx: &Context,
    command: &CommandInteraction,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let embed = CreateEmbed::new()
        .title("📖 Scribe commands")
        .colour(Colour::BLURPLE)
        .description(
            "I record voice meetings per speaker, transcribe them afterwards, \
             and pass questions straight to an AI model.",
        )
        .field("/join", "Join your voice channel and start recording", false)
        .field("/stop", "Stop recording, post the audio and transcribe", false)
        .field("/status", "Show the current recording session", false)
        .field("/transcript id", "Fetch a finished meeting's transcript", false)
        .field("/chat prompt", "Ask the AI anything", false)
        .field("/joke", "Get a joke from the AI", false)
        .field("/help", "This message", false);

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embed)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}
