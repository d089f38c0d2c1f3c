//! Meeting transcription via the Gemini File API
//!
//! Uploads each speaker's track with a name label and asks the model for
//! a single attributed transcript.

use crate::ai::client::{ChatClient, ChatError, FileData, PartRequest};
use crate::audio::{AudioProcessor, RecordedTrack};
use serenity::model::id::UserId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Prompt for meeting transcription
pub mod prompts {
    pub const TRANSCRIPT: &str = r#"
You are the minute-taker for a recorded voice meeting. Each attached audio
file is one speaker's track; the text label before each file names that
speaker.

Rules:
1. Produce a single chronological transcript of the meeting, attributing
   every line to its speaker ("Name: what they said").
2. If a track is silent or contains no intelligible speech, skip it. Do
   not invent dialogue that is not in the audio.
3. Output the transcript only, with no commentary or headings.
"#;
}

/// Turns a meeting's per-speaker recordings into one transcript
pub struct Transcriber {
    client: Arc<ChatClient>,
}

impl Transcriber {
    pub fn new(client: Arc<ChatClient>) -> Self {
        Self { client }
    }

    /// Transcribe the given tracks, labelling each with the speaker's name
    pub async fn transcribe(
        &self,
        tracks: &[RecordedTrack],
        speakers: &HashMap<UserId, String>,
    ) -> Result<String, ChatError> {
        if tracks.is_empty() {
            return Err(ChatError::NoAudio);
        }

        let mut uploaded = Vec::new();
        let mut parts = vec![PartRequest::Text {
            text: prompts::TRANSCRIPT.to_string(),
        }];

        for track in tracks {
            let speaker = speakers
                .get(&track.user_id)
                .cloned()
                .unwrap_or_else(|| format!("User_{}", track.user_id));

            let mime_type = AudioProcessor::mime_type(&track.path);

            match self.client.upload_file(&track.path, mime_type).await {
                Ok(file_info) => {
                    if let Err(e) = self.client.wait_for_file_active(&file_info.name).await {
                        warn!("Track for {} not ready: {}", speaker, e);
                        self.client.delete_file(&file_info.name).await;
                        continue;
                    }

                    parts.push(PartRequest::Text {
                        text: format!("Speaker: {}", speaker),
                    });
                    parts.push(PartRequest::FileData {
                        file_data: FileData {
                            file_uri: file_info.uri.clone(),
                            mime_type: file_info.mime_type.clone(),
                        },
                    });
                    uploaded.push(file_info.name);
                }
                Err(e) => {
                    warn!("Failed to upload track for {}: {}", speaker, e);
                }
            }
        }

        if uploaded.is_empty() {
            return Err(ChatError::NoAudio);
        }

        info!("Transcribing {} speaker tracks", uploaded.len());
        let result = self.client.generate(parts).await;

        for name in &uploaded {
            self.client.delete_file(name).await;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_prompt_contents() {
        assert!(prompts::TRANSCRIPT.contains("chronological transcript"));
        assert!(prompts::TRANSCRIPT.contains("not invent dialogue"));
    }
}
