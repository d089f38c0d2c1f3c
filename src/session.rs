//! Session management for guild recording sessions
//!
//! One active recording per guild: begin wires the voice receiver and a
//! duration watchdog, finish runs the flush / store / transcribe pipeline.

use crate::ai::{ChatClient, ChatError, Transcriber};
use crate::audio::recorder::RecorderError;
use crate::audio::{MeetingRecorder, RecordedTrack};
use crate::config::Config;
use crate::database::{Database, DatabaseError};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serenity::all::{
    ChannelId, Colour, CreateAttachment, CreateEmbed, CreateEmbedFooter, CreateMessage, GuildId,
    Http, UserId,
};
use songbird::{Call, Songbird};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{error, info, warn};

/// Discord rejects larger uploads on the default tier
const MAX_UPLOAD_BYTES: u64 = 8 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No active recording session")]
    NotRecording,
    #[error("Recorder error: {0}")]
    Recorder(#[from] RecorderError),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Discord error: {0}")]
    Discord(#[from] serenity::Error),
}

/// A recording session for a single guild
pub struct RecordingSession {
    /// Guild being recorded
    pub guild_id: GuildId,
    /// Text channel where /join was invoked; status posts go here
    pub text_channel_id: ChannelId,
    /// Voice channel being captured
    pub voice_channel_id: ChannelId,
    /// Meeting row backing this session
    pub meeting_id: i64,
    /// Session start time
    pub started_at: DateTime<Utc>,
    /// Per-user audio capture
    pub recorder: Arc<MeetingRecorder>,
    /// Voice call handle, kept to detach events on finish
    call: Arc<tokio::sync::Mutex<Call>>,
    /// Duration watchdog; the slot is emptied before the pipeline runs
    watchdog: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

/// Point-in-time view of a session for /status
pub struct SessionStatus {
    pub meeting_id: i64,
    pub voice_channel_id: ChannelId,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: u64,
    pub remaining_secs: u64,
    pub speakers: usize,
    pub buffered_bytes: usize,
}

/// Session manager for all guilds
pub struct SessionManager {
    sessions: DashMap<GuildId, Arc<RecordingSession>>,
    config: Arc<Config>,
    db: Arc<Database>,
    transcriber: Transcriber,
}

impl SessionManager {
    /// Create a new session manager sharing the bot's AI client
    pub fn new(config: Arc<Config>, db: Arc<Database>, chat: Arc<ChatClient>) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
            db,
            transcriber: Transcriber::new(chat),
        }
    }

    /// Get the active session for a guild
    pub fn get(&self, guild_id: GuildId) -> Option<Arc<RecordingSession>> {
        self.sessions.get(&guild_id).map(|r| r.value().clone())
    }

    /// Whether a guild is currently being recorded
    pub fn is_active(&self, guild_id: GuildId) -> bool {
        self.sessions.contains_key(&guild_id)
    }

    /// Start recording a joined voice call.
    ///
    /// Opens the meeting row, attaches the voice receiver to the call and
    /// spawns the maximum-duration watchdog.
    pub async fn begin(
        self: &Arc<Self>,
        http: Arc<Http>,
        driver: Arc<Songbird>,
        guild_id: GuildId,
        text_channel_id: ChannelId,
        voice_channel_id: ChannelId,
        call: Arc<tokio::sync::Mutex<Call>>,
    ) -> Result<Arc<RecordingSession>, SessionError> {
        let started_at = Utc::now();
        let recorder = Arc::new(MeetingRecorder::new(
            &self.config.recordings_dir,
            self.config.channels,
            self.config.sample_rate,
        )?);

        let meeting_id =
            self.db
                .create_meeting(guild_id.get(), voice_channel_id.get(), started_at)?;

        {
            let mut handler = call.lock().await;
            handler.add_global_event(
                songbird::CoreEvent::SpeakingStateUpdate.into(),
                crate::bot::VoiceReceiver {
                    recorder: recorder.clone(),
                },
            );
            handler.add_global_event(
                songbird::CoreEvent::VoiceTick.into(),
                crate::bot::VoiceReceiver {
                    recorder: recorder.clone(),
                },
            );
        }

        let session = Arc::new(RecordingSession {
            guild_id,
            text_channel_id,
            voice_channel_id,
            meeting_id,
            started_at,
            recorder,
            call,
            watchdog: parking_lot::Mutex::new(None),
        });
        self.sessions.insert(guild_id, session.clone());

        let handle = self.spawn_watchdog(http, driver, guild_id);
        *session.watchdog.lock() = Some(handle);

        info!(
            "[{}] Recording meeting {} in channel {}",
            guild_id, meeting_id, voice_channel_id
        );
        Ok(session)
    }

    /// Force-stop the session once the configured maximum duration passes
    fn spawn_watchdog(
        self: &Arc<Self>,
        http: Arc<Http>,
        driver: Arc<Songbird>,
        guild_id: GuildId,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let max_secs = self.config.max_meeting_secs;

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(max_secs)).await;

            let Some(session) = manager.get(guild_id) else {
                return;
            };
            // Detach our own handle so finish() does not abort this task
            session.watchdog.lock().take();

            warn!("[{}] Maximum meeting length reached, stopping", guild_id);
            let notice = CreateMessage::new().embed(
                CreateEmbed::new()
                    .title("⏱️ Maximum meeting length reached")
                    .description(format!(
                        "Recording stopped automatically after {}.",
                        format_duration(max_secs)
                    ))
                    .colour(Colour::ORANGE),
            );
            if let Err(e) = session.text_channel_id.send_message(&http, notice).await {
                warn!("[{}] Failed to post timeout notice: {}", guild_id, e);
            }

            if let Err(e) = manager.finish(&http, guild_id).await {
                error!("[{}] Auto-stop failed: {}", guild_id, e);
            }
            if let Err(e) = driver.leave(guild_id).await {
                warn!("[{}] Failed to leave voice channel: {}", guild_id, e);
            }
        })
    }

    /// Point-in-time status for /status
    pub fn status(&self, guild_id: GuildId) -> Option<SessionStatus> {
        let session = self.get(guild_id)?;
        let elapsed = (Utc::now() - session.started_at).num_seconds().max(0) as u64;

        Some(SessionStatus {
            meeting_id: session.meeting_id,
            voice_channel_id: session.voice_channel_id,
            started_at: session.started_at,
            elapsed_secs: elapsed,
            remaining_secs: self.config.max_meeting_secs.saturating_sub(elapsed),
            speakers: session.recorder.speakers(),
            buffered_bytes: session.recorder.buffered_bytes(),
        })
    }

    /// Finish a session: flush audio, close the meeting row, post the
    /// completion embed and transcribe. Leaving the voice channel is the
    /// caller's job; on a forced disconnect there is nothing to leave.
    pub async fn finish(&self, http: &Arc<Http>, guild_id: GuildId) -> Result<(), SessionError> {
        let Some((_, session)) = self.sessions.remove(&guild_id) else {
            return Err(SessionError::NotRecording);
        };

        if let Some(handle) = session.watchdog.lock().take() {
            handle.abort();
        }

        {
            let mut call = session.call.lock().await;
            call.remove_all_global_events();
        }

        let ended_at = Utc::now();
        let elapsed = (ended_at - session.started_at).num_seconds().max(0) as u64;

        let tracks = match session.recorder.flush() {
            Ok(tracks) => tracks,
            Err(RecorderError::NoData) => {
                info!(
                    "[{}] Nothing recorded for meeting {}",
                    guild_id, session.meeting_id
                );
                self.db.delete_meeting(session.meeting_id)?;
                let msg =
                    CreateMessage::new().content("🔇 Nobody spoke, so nothing was recorded.");
                session.text_channel_id.send_message(http, msg).await?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let participants: Vec<u64> = tracks.iter().map(|t| t.user_id.get()).collect();
        let recordings: Vec<String> = tracks
            .iter()
            .map(|t| t.path.display().to_string())
            .collect();
        self.db
            .finish_meeting(session.meeting_id, ended_at, &participants, &recordings)?;

        let speakers = resolve_names(http, session.guild_id, &tracks).await;
        let speaker_list = tracks
            .iter()
            .map(|t| {
                let name = speakers
                    .get(&t.user_id)
                    .cloned()
                    .unwrap_or_else(|| format!("User_{}", t.user_id));
                format!("{} ({} of speech)", name, format_duration(t.duration_secs() as u64))
            })
            .collect::<Vec<_>>()
            .join(", ");

        let embed = CreateEmbed::new()
            .title("✅ Recording complete")
            .colour(Colour::DARK_GREEN)
            .field("Meeting", format!("#{}", session.meeting_id), true)
            .field("Duration", format_duration(elapsed), true)
            .field("Speakers", speaker_list, false)
            .footer(CreateEmbedFooter::new(format!(
                "Transcript: /transcript id:{}",
                session.meeting_id
            )));

        let mut message = CreateMessage::new().embed(embed);
        let mut too_large = 0usize;
        for track in &tracks {
            let size = std::fs::metadata(&track.path).map(|m| m.len()).unwrap_or(0);
            if size > MAX_UPLOAD_BYTES {
                too_large += 1;
                continue;
            }
            match CreateAttachment::path(&track.path).await {
                Ok(attachment) => message = message.add_file(attachment),
                Err(e) => warn!(
                    "[{}] Could not attach {}: {}",
                    guild_id,
                    track.path.display(),
                    e
                ),
            }
        }
        if too_large > 0 {
            message = message.content(format!(
                "{} recording(s) were too large to attach and stay on disk.",
                too_large
            ));
        }
        session.text_channel_id.send_message(http, message).await?;

        let notice = CreateMessage::new().content("📝 Transcribing the meeting audio...");
        session.text_channel_id.send_message(http, notice).await?;

        match self.transcriber.transcribe(&tracks, &speakers).await {
            Ok(transcript) => {
                self.db.set_transcript(session.meeting_id, &transcript)?;
                let done = CreateMessage::new().content(format!(
                    "Transcript ready. Read it with `/transcript id:{}`.",
                    session.meeting_id
                ));
                session.text_channel_id.send_message(http, done).await?;
            }
            Err(ChatError::RateLimited) => {
                let msg = CreateMessage::new().content(
                    "⚠️ The AI service is rate limited right now; the transcript was skipped.",
                );
                session.text_channel_id.send_message(http, msg).await?;
            }
            Err(e) => {
                error!("[{}] Transcription failed: {}", guild_id, e);
                let msg = CreateMessage::new()
                    .content("Transcription failed; the audio files above are still available.");
                session.text_channel_id.send_message(http, msg).await?;
            }
        }

        let captured: usize = tracks.iter().map(|t| t.bytes).sum();
        info!(
            "[{}] Meeting {} finished ({} speakers, {} bytes of audio, {})",
            guild_id,
            session.meeting_id,
            tracks.len(),
            captured,
            format_duration(elapsed)
        );
        Ok(())
    }
}

/// Resolve display names for the recorded users; synthetic ids from
/// unmapped SSRCs fall back to a placeholder.
async fn resolve_names(
    http: &Arc<Http>,
    guild_id: GuildId,
    tracks: &[RecordedTrack],
) -> HashMap<UserId, String> {
    let mut names = HashMap::new();
    for track in tracks {
        let name = match http.get_member(guild_id, track.user_id).await {
            Ok(member) => member.display_name().to_string(),
            Err(_) => format!("User_{}", track.user_id),
        };
        names.insert(track.user_id, name);
    }
    names
}

/// Render seconds as "1h 23m 45s"
pub fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(59), "59s");
        assert_eq!(format_duration(60), "1m 0s");
        assert_eq!(format_duration(3725), "1h 2m 5s");
        assert_eq!(format_duration(5 * 3600), "5h 0m 0s");
    }

    // A /stop racing the watchdog lands here; the command path has to
    // survive it and still disconnect
    #[tokio::test]
    async fn test_finish_without_session_is_not_recording() {
        let config = Arc::new(Config {
            discord_token: String::new(),
            gemini_api_key: String::new(),
            guild_id: None,
            recordings_dir: "recordings".into(),
            database_path: ":memory:".into(),
            max_meeting_secs: 5 * 3600,
            sample_rate: 48000,
            channels: 2,
        });
        let db = Arc::new(Database::open(":memory:").unwrap());
        let chat = Arc::new(ChatClient::new(String::new()));
        let manager = Arc::new(SessionManager::new(config, db, chat));

        let http = Arc::new(Http::new(""));
        let err = manager.finish(&http, GuildId::new(1)).await.unwrap_err();
        assert!(matches!(err, SessionError::NotRecording));
        assert!(!manager.is_active(GuildId::new(1)));
    }
}
