//! Per-user voice capture
//!
//! Buffers the Opus frames Discord delivers for each speaking user and
//! flushes them to one Ogg Opus file per user.

use crate::audio::processor::AudioProcessor;
use dashmap::DashMap;
use serenity::model::id::UserId;
use songbird::events::context_data::VoiceTick;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{error, info, trace};

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No audio data captured")]
    NoData,
}

/// Per-user frame buffer
#[derive(Default)]
struct UserAudioBuffer {
    frames: Vec<Vec<u8>>,
    bytes: usize,
}

impl UserAudioBuffer {
    fn push(&mut self, frame: &[u8]) {
        self.bytes += frame.len();
        self.frames.push(frame.to_vec());
    }

    fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// A flushed per-user recording
#[derive(Debug, Clone)]
pub struct RecordedTrack {
    pub user_id: UserId,
    pub path: PathBuf,
    pub frames: usize,
    pub bytes: usize,
}

impl RecordedTrack {
    /// Captured speech length; Discord delivers one frame per 20ms
    pub fn duration_secs(&self) -> f64 {
        self.frames as f64 * 0.02
    }
}

/// Collects Opus frames per speaking user and writes them out as Ogg Opus
pub struct MeetingRecorder {
    /// SSRC -> user mapping learned from speaking-state updates
    ssrc_users: DashMap<u32, UserId>,
    /// Buffered frames, keyed by user
    buffers: DashMap<UserId, UserAudioBuffer>,
    /// Output directory for flushed recordings
    out_dir: PathBuf,
    /// Session timestamp for unique filenames
    session_timestamp: u64,
    channels: u8,
    sample_rate: u32,
}

impl MeetingRecorder {
    /// Create a recorder writing into `out_dir`
    pub fn new<P: AsRef<Path>>(
        out_dir: P,
        channels: u8,
        sample_rate: u32,
    ) -> Result<Self, RecorderError> {
        let out_dir = out_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&out_dir)?;

        let session_timestamp = unix_now();

        Ok(Self {
            ssrc_users: DashMap::new(),
            buffers: DashMap::new(),
            out_dir,
            session_timestamp,
            channels,
            sample_rate,
        })
    }

    /// Record which user an SSRC belongs to
    pub fn map_ssrc(&self, ssrc: u32, user_id: UserId) {
        trace!("SSRC {} speaks for user {}", ssrc, user_id);
        self.ssrc_users.insert(ssrc, user_id);
    }

    /// Process one 20ms voice tick from the driver
    pub fn process_voice_tick(&self, tick: &VoiceTick) {
        for (ssrc, data) in &tick.speaking {
            let Some(rtp) = &data.packet else { continue };

            let end = rtp.packet.len().saturating_sub(rtp.payload_end_pad);
            if rtp.payload_offset >= end {
                continue;
            }
            let payload = &rtp.packet[rtp.payload_offset..end];

            self.add_opus_frame(self.resolve_user(*ssrc), payload);
        }
    }

    /// Append one Opus frame to a user's buffer
    pub fn add_opus_frame(&self, user_id: UserId, frame: &[u8]) {
        if frame.is_empty() {
            return;
        }
        let mut entry = self.buffers.entry(user_id).or_default();
        entry.push(frame);
        trace!("Buffered {} bytes for user {}", frame.len(), user_id);
    }

    /// User behind an SSRC; an unmapped SSRC gets a synthetic id so its
    /// audio is kept rather than dropped
    fn resolve_user(&self, ssrc: u32) -> UserId {
        self.ssrc_users
            .get(&ssrc)
            .map(|r| *r.value())
            .unwrap_or_else(|| UserId::new(ssrc as u64))
    }

    /// Whether any audio is buffered
    pub fn has_data(&self) -> bool {
        self.buffers.iter().any(|r| !r.value().is_empty())
    }

    /// Number of users with buffered audio
    pub fn speakers(&self) -> usize {
        self.buffers.len()
    }

    /// Total bytes buffered across all users
    pub fn buffered_bytes(&self) -> usize {
        self.buffers.iter().map(|r| r.value().bytes).sum()
    }

    /// Flush all buffered audio to per-user Ogg Opus files.
    ///
    /// A write failure for one user does not lose the others' audio.
    pub fn flush(&self) -> Result<Vec<RecordedTrack>, RecorderError> {
        let mut tracks = Vec::new();
        let flush_time = unix_now();

        let user_ids: Vec<UserId> = self.buffers.iter().map(|r| *r.key()).collect();

        for user_id in user_ids {
            let Some((_, buffer)) = self.buffers.remove(&user_id) else {
                continue;
            };
            if buffer.is_empty() {
                continue;
            }

            let path = self.out_dir.join(format!(
                "{}_{}_{}.ogg",
                self.session_timestamp,
                user_id.get(),
                flush_time
            ));

            match self.write_track(&path, &buffer.frames, user_id) {
                Ok(()) => {
                    info!(
                        "Saved {} frames for user {} to {:?}",
                        buffer.frames.len(),
                        user_id,
                        path
                    );
                    tracks.push(RecordedTrack {
                        user_id,
                        path,
                        frames: buffer.frames.len(),
                        bytes: buffer.bytes,
                    });
                }
                Err(e) => {
                    error!("Failed to save audio for user {}: {}", user_id, e);
                }
            }
        }

        if tracks.is_empty() {
            return Err(RecorderError::NoData);
        }

        Ok(tracks)
    }

    fn write_track(
        &self,
        path: &Path,
        frames: &[Vec<u8>],
        user_id: UserId,
    ) -> Result<(), RecorderError> {
        let file = BufWriter::new(File::create(path)?);
        let serial = (user_id.get() ^ self.session_timestamp) as u32;
        AudioProcessor::write_ogg_opus(file, frames, self.channels, self.sample_rate, serial)?;
        Ok(())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_recorder_flushes_per_user_ogg() {
        let temp = tempdir().unwrap();
        let recorder = MeetingRecorder::new(temp.path(), 2, 48000).unwrap();

        let alice = UserId::new(12345);
        let bob = UserId::new(67890);
        recorder.add_opus_frame(alice, &[0x01; 60]);
        recorder.add_opus_frame(alice, &[0x02; 60]);
        recorder.add_opus_frame(bob, &[0x03; 60]);

        assert!(recorder.has_data());
        assert_eq!(recorder.speakers(), 2);
        assert_eq!(recorder.buffered_bytes(), 180);

        let mut tracks = recorder.flush().unwrap();
        tracks.sort_by_key(|t| t.user_id);
        assert_eq!(tracks.len(), 2);

        assert_eq!(tracks[0].user_id, alice);
        assert_eq!(tracks[0].frames, 2);
        assert!((tracks[0].duration_secs() - 0.04).abs() < 1e-9);

        for track in &tracks {
            let data = std::fs::read(&track.path).unwrap();
            assert_eq!(&data[..4], b"OggS");
        }

        // Buffers drained
        assert!(!recorder.has_data());
    }

    #[test]
    fn test_flush_without_audio_is_no_data() {
        let temp = tempdir().unwrap();
        let recorder = MeetingRecorder::new(temp.path(), 2, 48000).unwrap();
        assert!(matches!(recorder.flush(), Err(RecorderError::NoData)));
    }

    #[test]
    fn test_ssrc_resolution() {
        let temp = tempdir().unwrap();
        let recorder = MeetingRecorder::new(temp.path(), 2, 48000).unwrap();

        // Unmapped SSRCs fall back to a synthetic user id
        assert_eq!(recorder.resolve_user(555), UserId::new(555));

        recorder.map_ssrc(555, UserId::new(424242));
        assert_eq!(recorder.resolve_user(555), UserId::new(424242));
    }

    #[test]
    fn test_empty_frames_are_ignored() {
        let temp = tempdir().unwrap();
        let recorder = MeetingRecorder::new(temp.path(), 2, 48000).unwrap();
        recorder.add_opus_frame(UserId::new(1), &[]);
        assert!(!recorder.has_data());
    }

    #[test]
    fn test_flush_keeps_other_tracks_when_one_write_fails() {
        let temp = tempdir().unwrap();
        let recorder = MeetingRecorder::new(temp.path(), 2, 48000).unwrap();

        let blocked = UserId::new(111);
        let kept = UserId::new(222);
        recorder.add_opus_frame(blocked, &[0x01; 60]);
        recorder.add_opus_frame(kept, &[0x02; 60]);

        // A directory at the output path makes File::create fail for the
        // blocked user; cover the timestamps flush could pick
        let now = unix_now();
        for t in now..now + 3 {
            let clash = temp.path().join(format!(
                "{}_{}_{}.ogg",
                recorder.session_timestamp,
                blocked.get(),
                t
            ));
            std::fs::create_dir_all(&clash).unwrap();
        }

        let tracks = recorder.flush().unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].user_id, kept);

        let data = std::fs::read(&tracks[0].path).unwrap();
        assert_eq!(&data[..4], b"OggS");
    }
}
