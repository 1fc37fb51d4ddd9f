//! Error taxonomy for the fingerprinting service.

use thiserror::Error;

/// Errors surfaced by the pipeline and its collaborators.
///
/// A sample buffer too short to fill a single analysis frame is not an
/// error: the analyzer returns an empty landmark sequence and
/// identification reports a clean no-match.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or unsupported audio payload.
    #[error("failed to decode audio: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    /// The container held no decodable audio track.
    #[error("audio stream has no decodable track")]
    NoAudioTrack,

    #[error("failed to resample audio: {0}")]
    Resample(#[from] rubato::ResampleError),

    #[error("failed to construct resampler: {0}")]
    ResamplerConstruction(#[from] rubato::ResamplerConstructionError),

    /// Catalogue read or write failed. Must reach the caller as-is, never
    /// downgraded to a "no match" result.
    #[error("catalogue unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    /// The matcher selected a song the catalogue cannot resolve.
    #[error("catalogue references unknown song {song_id}")]
    InconsistentCatalogue { song_id: i64 },

    /// Missing or malformed request fields. Raised at the API boundary only.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The blocking fingerprint task was cancelled or panicked.
    #[error("fingerprint task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
