//! Gemini REST integration: chat passthrough and meeting transcription.

pub mod client;
pub mod transcriber;

pub use client::{ChatClient, ChatError};
pub use transcriber::Transcriber;
