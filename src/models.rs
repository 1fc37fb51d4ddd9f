use serde::{Deserialize, Serialize};

/// A catalogued recording. Created once at ingestion, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Song {
    pub id: i64,
    pub title: String,
    pub artist: String,
    /// Reference to the source audio the fingerprints were derived from.
    pub audio_ref: String,
}

/// Outcome of one identification request. Not persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Identification {
    pub song: Option<Song>,
    pub confidence: f64,
}
