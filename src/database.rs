//! Meeting persistence
//!
//! Uses SQLite to keep a record of every recorded meeting

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON column error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid timestamp in row: {0}")]
    InvalidTimestamp(String),
    #[error("Lock error")]
    LockError,
}

/// A recorded meeting
#[derive(Debug, Clone)]
pub struct Meeting {
    pub id: i64,
    pub guild_id: u64,
    /// Voice channel the meeting took place in
    pub channel_id: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Discord user IDs that were captured speaking
    pub participants: Vec<u64>,
    /// Paths of the per-user recording files
    pub recordings: Vec<String>,
    pub transcript: Option<String>,
}

impl Meeting {
    /// Meeting length in seconds, if the meeting has ended
    pub fn duration_secs(&self) -> Option<i64> {
        self.ended_at.map(|end| (end - self.started_at).num_seconds())
    }
}

/// Database connection wrapper
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init()?;
        Ok(db)
    }

    /// Initialize database tables
    fn init(&self) -> Result<(), DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockError)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS meetings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id INTEGER NOT NULL,
                channel_id INTEGER NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT,
                participants TEXT NOT NULL DEFAULT '[]',
                recordings TEXT NOT NULL DEFAULT '[]',
                transcript TEXT
            )",
            [],
        )?;
        Ok(())
    }

    /// Create an open meeting row and return its id
    pub fn create_meeting(
        &self,
        guild_id: u64,
        channel_id: u64,
        started_at: DateTime<Utc>,
    ) -> Result<i64, DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockError)?;
        conn.execute(
            "INSERT INTO meetings (guild_id, channel_id, started_at) VALUES (?, ?, ?)",
            params![guild_id, channel_id, started_at.to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Close a meeting with its end time, participants and recording paths
    pub fn finish_meeting(
        &self,
        id: i64,
        ended_at: DateTime<Utc>,
        participants: &[u64],
        recordings: &[String],
    ) -> Result<(), DatabaseError> {
        let participants = serde_json::to_string(participants)?;
        let recordings = serde_json::to_string(recordings)?;

        let conn = self.conn.lock().map_err(|_| DatabaseError::LockError)?;
        conn.execute(
            "UPDATE meetings SET ended_at = ?, participants = ?, recordings = ? WHERE id = ?",
            params![ended_at.to_rfc3339(), participants, recordings, id],
        )?;
        Ok(())
    }

    /// Attach a transcript to a meeting
    pub fn set_transcript(&self, id: i64, transcript: &str) -> Result<(), DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockError)?;
        conn.execute(
            "UPDATE meetings SET transcript = ? WHERE id = ?",
            params![transcript, id],
        )?;
        Ok(())
    }

    /// Fetch a meeting by id
    pub fn get_meeting(&self, id: i64) -> Result<Option<Meeting>, DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockError)?;

        let mut stmt = conn.prepare(
            "SELECT id, guild_id, channel_id, started_at, ended_at,
                    participants, recordings, transcript
             FROM meetings WHERE id = ?",
        )?;

        let row = stmt.query_row(params![id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, Option<String>>(7)?,
            ))
        });

        match row {
            Ok((id, guild_id, channel_id, started, ended, participants, recordings, transcript)) => {
                Ok(Some(Meeting {
                    id,
                    guild_id,
                    channel_id,
                    started_at: parse_timestamp(&started)?,
                    ended_at: ended.as_deref().map(parse_timestamp).transpose()?,
                    participants: serde_json::from_str(&participants)?,
                    recordings: serde_json::from_str(&recordings)?,
                    transcript,
                }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a meeting (used when a recording captured no audio)
    pub fn delete_meeting(&self, id: i64) -> Result<(), DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockError)?;
        conn.execute("DELETE FROM meetings WHERE id = ?", params![id])?;
        Ok(())
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DatabaseError::InvalidTimestamp(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meeting_lifecycle() {
        let db = Database::open(":memory:").unwrap();
        let started = Utc::now();

        let id = db.create_meeting(12345, 67890, started).unwrap();
        assert!(id > 0);

        // Open meeting: no end, no participants yet
        let meeting = db.get_meeting(id).unwrap().unwrap();
        assert_eq!(meeting.guild_id, 12345);
        assert_eq!(meeting.channel_id, 67890);
        assert!(meeting.ended_at.is_none());
        assert!(meeting.participants.is_empty());
        assert!(meeting.duration_secs().is_none());

        let ended = started + chrono::Duration::seconds(90);
        db.finish_meeting(id, ended, &[111, 222], &["a.ogg".to_string(), "b.ogg".to_string()])
            .unwrap();

        let meeting = db.get_meeting(id).unwrap().unwrap();
        assert_eq!(meeting.participants, vec![111, 222]);
        assert_eq!(meeting.recordings.len(), 2);
        assert_eq!(meeting.duration_secs(), Some(90));
        assert!(meeting.transcript.is_none());

        db.set_transcript(id, "Alice: hello").unwrap();
        let meeting = db.get_meeting(id).unwrap().unwrap();
        assert_eq!(meeting.transcript.as_deref(), Some("Alice: hello"));
    }

    #[test]
    fn test_missing_and_deleted_meetings() {
        let db = Database::open(":memory:").unwrap();
        assert!(db.get_meeting(999).unwrap().is_none());

        let id = db.create_meeting(1, 2, Utc::now()).unwrap();
        db.delete_meeting(id).unwrap();
        assert!(db.get_meeting(id).unwrap().is_none());
    }
}
