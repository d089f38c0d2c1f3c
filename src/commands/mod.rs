//! Slash command plugins, one module per feature area.

pub mod chat;
pub mod help;
pub mod meetings;
pub mod recording;

use serenity::all::{
    CommandInteraction, Context, CreateCommand, CreateInteractionResponse,
    CreateInteractionResponseMessage,
};

/// Discord caps messages at 2000 chars; leave headroom for framing
pub const MESSAGE_CHUNK: usize = 1900;

/// Collect every plugin's slash commands for registration
pub fn register_all() -> Vec<CreateCommand> {
    vec![
        recording::register(),
        chat::register(),
        meetings::register(),
        help::register(),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Helper to send an immediate text response
pub(crate) async fn respond(
    ctx: &Context,
    command: &CommandInteraction,
    content: &str,
    ephemeral: bool,
) -> Result<(), serenity::Error> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(ephemeral),
            ),
        )
        .await
}

/// Split text into message-sized chunks without cutting a character in two
pub fn chunk_content(text: &str, chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if !current.is_empty() && current.len() + ch.len_utf8() > chunk_size {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_content_short_text_is_single_chunk() {
        assert_eq!(chunk_content("hello", 100), vec!["hello".to_string()]);
    }

    #[test]
    fn test_chunk_content_empty_text_has_no_chunks() {
        assert!(chunk_content("", 100).is_empty());
    }

    #[test]
    fn test_chunk_content_respects_char_boundaries() {
        // 3 bytes per char; naive byte slicing would split mid-character
        let text = "あ".repeat(100);
        let chunks = chunk_content(&text, 32);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= 32));
        assert_eq!(chunks.concat(), text);
    }
}
