//! Gemini API client module
//!
//! Text generation for the chat commands plus the File API plumbing
//! (upload, activation poll, delete) used by meeting transcription.

use crate::config;
use reqwest::{multipart, Client};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEMINI_UPLOAD_BASE: &str = "https://generativelanguage.googleapis.com/upload/v1beta";

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("API error: {0}")]
    Api(String),
    #[error("No audio files provided")]
    NoAudio,
    #[error("Rate limit exceeded")]
    RateLimited,
}

/// Response from Gemini file upload
#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: FileInfo,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FileInfo {
    pub(crate) name: String,
    pub(crate) uri: String,
    #[serde(rename = "mimeType")]
    pub(crate) mime_type: String,
    state: String,
}

/// Response from Gemini content generation
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i32,
    message: String,
}

/// Request body for content generation
#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<ContentRequest>,
}

#[derive(Debug, Serialize)]
struct ContentRequest {
    role: String,
    parts: Vec<PartRequest>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum PartRequest {
    Text { text: String },
    FileData { file_data: FileData },
}

#[derive(Debug, Serialize)]
pub(crate) struct FileData {
    pub(crate) file_uri: String,
    pub(crate) mime_type: String,
}

fn extract_text(response: GenerateResponse) -> Option<String> {
    response
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content.parts.into_iter().next())
        .and_then(|p| p.text)
}

/// Gemini REST client shared by the chat commands and the transcriber
pub struct ChatClient {
    client: Client,
    api_key: String,
    model: String,
}

impl ChatClient {
    /// Create a new client with the given API key
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key,
            model: config::models::GEMINI_FLASH.to_string(),
        }
    }

    /// Forward a prompt verbatim and return the model's reply
    pub async fn chat(&self, prompt: &str) -> Result<String, ChatError> {
        debug!("Forwarding chat prompt ({} chars)", prompt.len());
        self.generate(vec![PartRequest::Text {
            text: prompt.to_string(),
        }])
        .await
    }

    /// Run one generateContent call over the given parts
    pub(crate) async fn generate(&self, parts: Vec<PartRequest>) -> Result<String, ChatError> {
        let request = GenerateRequest {
            contents: vec![ContentRequest {
                role: "user".to_string(),
                parts,
            }],
        };

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            GEMINI_API_BASE, self.model, self.api_key
        );

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 || text.contains("Quota exceeded") {
                return Err(ChatError::RateLimited);
            }

            return Err(ChatError::Api(format!("Generation failed: {} - {}", status, text)));
        }

        let gen_response: GenerateResponse = response.json().await?;

        if let Some(error) = gen_response.error {
            return Err(ChatError::Api(error.message));
        }

        extract_text(gen_response)
            .ok_or_else(|| ChatError::Api("Response contained no text".to_string()))
    }

    /// Upload a file to the Gemini File API
    pub(crate) async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
    ) -> Result<FileInfo, ChatError> {
        let mut file = File::open(path).await?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer).await?;

        let file_name = path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.ogg");

        let url = format!(
            "{}/files?key={}",
            GEMINI_UPLOAD_BASE, self.api_key
        );

        let part = multipart::Part::bytes(buffer)
            .file_name(file_name.to_string())
            .mime_str(mime_type)?;

        let form = multipart::Form::new()
            .part("file", part);

        let response = self.client
            .post(&url)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!("Upload failed: {} - {}", status, text);
            return Err(ChatError::Api(format!("Upload failed: {}", status)));
        }

        let upload_response: UploadResponse = response.json().await?;
        info!("Uploaded file: {}", upload_response.file.name);

        Ok(upload_response.file)
    }

    /// Poll until an uploaded file is ready for generation
    pub(crate) async fn wait_for_file_active(&self, name: &str) -> Result<(), ChatError> {
        // `name` is the full resource name, e.g. "files/abc123"
        let url = format!(
            "{}/{}?key={}",
            GEMINI_API_BASE, name, self.api_key
        );

        for _ in 0..30 {
            let response = self.client.get(&url).send().await?;

            if response.status().is_success() {
                let file_info: FileInfo = response.json().await?;
                if file_info.state == "ACTIVE" {
                    return Ok(());
                }
                if file_info.state == "FAILED" {
                    return Err(ChatError::Api("File processing failed".to_string()));
                }
            }

            tokio::time::sleep(Duration::from_secs(2)).await;
        }

        Err(ChatError::Api("File processing timeout".to_string()))
    }

    /// Delete an uploaded file; failures are ignored
    pub(crate) async fn delete_file(&self, name: &str) {
        let url = format!(
            "{}/{}?key={}",
            GEMINI_API_BASE, name, self.api_key
        );

        let _ = self.client.delete(&url).send().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_from_candidates() {
        let json = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "Why did the bot cross the road?"}]}}
            ]
        }"#;
        let response: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            extract_text(response).as_deref(),
            Some("Why did the bot cross the road?")
        );
    }

    #[test]
    fn test_extract_text_handles_empty_response() {
        let response: GenerateResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(extract_text(response).is_none());
    }

    #[test]
    fn test_error_payload_parses() {
        let json = r#"{"error": {"code": 429, "message": "Quota exceeded"}}"#;
        let response: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.error.map(|e| e.message).as_deref(), Some("Quota exceeded"));
    }

    #[test]
    fn test_part_request_wire_shape() {
        let text = serde_json::to_value(PartRequest::Text { text: "hi".into() }).unwrap();
        assert_eq!(text, serde_json::json!({"text": "hi"}));

        let file = serde_json::to_value(PartRequest::FileData {
            file_data: FileData {
                file_uri: "files/abc".into(),
                mime_type: "audio/ogg".into(),
            },
        })
        .unwrap();
        assert_eq!(
            file,
            serde_json::json!({"file_data": {"file_uri": "files/abc", "mime_type": "audio/ogg"}})
        );
    }
}
