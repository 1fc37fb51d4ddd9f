//! Catalogue persistence and the ingest/identify orchestrations.

pub mod database;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::EngineError;
use crate::fingerprint::fingerprint_samples;
use crate::fingerprint::hashing::Fingerprint;
use crate::fingerprint::matching::{find_best_match, SongHits};
use crate::models::{Identification, Song};

/// Durable mapping from fingerprint hashes to songs.
///
/// Handed to the orchestrations explicitly so the pipeline can run against
/// an in-memory fake in tests.
#[async_trait]
pub trait CatalogueStore: Send + Sync {
    async fn create_song(
        &self,
        title: &str,
        artist: &str,
        audio_ref: &str,
    ) -> Result<Song, EngineError>;

    /// All entries become visible together or not at all; a partially
    /// visible fingerprint set would produce false negatives.
    async fn insert_fingerprints(
        &self,
        song_id: i64,
        fingerprints: &[Fingerprint],
    ) -> Result<(), EngineError>;

    async fn find_by_hashes(&self, hashes: &HashSet<u64>) -> Result<SongHits, EngineError>;

    async fn get_song(&self, song_id: i64) -> Result<Option<Song>, EngineError>;

    async fn list_songs(&self) -> Result<Vec<Song>, EngineError>;
}

/// Catalogue a new recording: fingerprint it, create the song row, then
/// batch-insert its fingerprint entries.
pub async fn ingest<S: CatalogueStore>(
    store: &S,
    title: &str,
    artist: &str,
    audio_ref: &str,
    samples: Vec<f32>,
) -> Result<Song, EngineError> {
    let fingerprints =
        tokio::task::spawn_blocking(move || fingerprint_samples(&samples)).await?;

    let song = store.create_song(title, artist, audio_ref).await?;
    store.insert_fingerprints(song.id, &fingerprints).await?;

    tracing::info!(
        song_id = song.id,
        fingerprints = fingerprints.len(),
        "ingested song"
    );

    Ok(song)
}

/// Identify an unknown clip against the catalogue.
///
/// Clips too short to produce fingerprints report a clean no-match. Store
/// failures and an unresolvable winner both surface as errors; neither is
/// ever reported as "no match".
pub async fn identify<S: CatalogueStore>(
    store: &S,
    samples: Vec<f32>,
) -> Result<Identification, EngineError> {
    let fingerprints =
        tokio::task::spawn_blocking(move || fingerprint_samples(&samples)).await?;

    if fingerprints.is_empty() {
        return Ok(Identification {
            song: None,
            confidence: 0.0,
        });
    }

    let hashes: HashSet<u64> = fingerprints.iter().map(|f| f.hash).collect();
    let hits = store.find_by_hashes(&hashes).await?;

    let outcome = find_best_match(&fingerprints, &hits);

    let Some(song_id) = outcome.song_id else {
        return Ok(Identification {
            song: None,
            confidence: 0.0,
        });
    };

    let song = store
        .get_song(song_id)
        .await?
        .ok_or(EngineError::InconsistentCatalogue { song_id })?;

    tracing::debug!(
        song_id,
        confidence = outcome.confidence,
        delta = outcome.aligned_delta,
        "identified candidate"
    );

    Ok(Identification {
        song: Some(song),
        confidence: outcome.confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::fingerprint::{FRAME_SIZE, SAMPLE_RATE};

    /// In-memory catalogue used to exercise the pipeline without SQLite.
    #[derive(Default)]
    struct MemoryStore {
        songs: Mutex<Vec<Song>>,
        fingerprints: Mutex<Vec<(i64, u64, i64)>>,
        fail_reads: bool,
        drop_songs: bool,
    }

    #[async_trait]
    impl CatalogueStore for MemoryStore {
        async fn create_song(
            &self,
            title: &str,
            artist: &str,
            audio_ref: &str,
        ) -> Result<Song, EngineError> {
            let mut songs = self.songs.lock().unwrap();
            let song = Song {
                id: songs.len() as i64 + 1,
                title: title.to_string(),
                artist: artist.to_string(),
                audio_ref: audio_ref.to_string(),
            };
            songs.push(song.clone());
            Ok(song)
        }

        async fn insert_fingerprints(
            &self,
            song_id: i64,
            fingerprints: &[Fingerprint],
        ) -> Result<(), EngineError> {
            let mut rows = self.fingerprints.lock().unwrap();
            for fingerprint in fingerprints {
                rows.push((song_id, fingerprint.hash, i64::from(fingerprint.frame_index)));
            }
            Ok(())
        }

        async fn find_by_hashes(&self, hashes: &HashSet<u64>) -> Result<SongHits, EngineError> {
            if self.fail_reads {
                return Err(EngineError::StoreUnavailable(sqlx::Error::PoolClosed));
            }

            let rows = self.fingerprints.lock().unwrap();
            let mut hits = SongHits::new();
            for &(song_id, hash, offset) in rows.iter() {
                if hashes.contains(&hash) {
                    hits.entry(song_id).or_default().push((hash, offset));
                }
            }
            Ok(hits)
        }

        async fn get_song(&self, song_id: i64) -> Result<Option<Song>, EngineError> {
            if self.drop_songs {
                return Ok(None);
            }
            Ok(self
                .songs
                .lock()
                .unwrap()
                .iter()
                .find(|s| s.id == song_id)
                .cloned())
        }

        async fn list_songs(&self) -> Result<Vec<Song>, EngineError> {
            Ok(self.songs.lock().unwrap().clone())
        }
    }

    /// Sweep through the analysis bands so every frame gets a different
    /// spectral shape and the fingerprints carry information.
    fn chirp(start_hz: f32, end_hz: f32, len: usize) -> Vec<f32> {
        let mut phase = 0.0f32;
        (0..len)
            .map(|i| {
                let f = start_hz + (end_hz - start_hz) * i as f32 / len as f32;
                phase += 2.0 * std::f32::consts::PI * f / SAMPLE_RATE as f32;
                phase.sin()
            })
            .collect()
    }

    #[tokio::test]
    async fn ingest_then_identify_round_trips() {
        let store = MemoryStore::default();
        let samples = chirp(45.0, 295.0, FRAME_SIZE * 8);

        let song = ingest(&store, "Isibusiso", "Mthunzi", "assets/isibusiso.mp3", samples.clone())
            .await
            .unwrap();
        let identification = identify(&store, samples).await.unwrap();

        let matched = identification.song.expect("expected a match");
        assert_eq!(matched.id, song.id);
        assert_eq!(matched.title, "Isibusiso");
        assert!(
            identification.confidence > 0.5,
            "confidence {}",
            identification.confidence
        );
    }

    #[tokio::test]
    async fn unrelated_audio_reports_low_confidence() {
        let store = MemoryStore::default();
        ingest(
            &store,
            "Rising",
            "A",
            "rising.mp3",
            chirp(45.0, 295.0, FRAME_SIZE * 16),
        )
        .await
        .unwrap();

        let identification = identify(&store, chirp(295.0, 45.0, FRAME_SIZE * 16))
            .await
            .unwrap();

        assert!(
            identification.confidence < 0.1,
            "confidence {}",
            identification.confidence
        );
    }

    #[tokio::test]
    async fn short_clips_identify_as_no_match() {
        let store = MemoryStore::default();

        let identification = identify(&store, vec![0.0; FRAME_SIZE / 2]).await.unwrap();

        assert!(identification.song.is_none());
        assert_eq!(identification.confidence, 0.0);
    }

    #[tokio::test]
    async fn store_failures_propagate_instead_of_reporting_no_match() {
        let store = MemoryStore {
            fail_reads: true,
            ..Default::default()
        };

        let result = identify(&store, chirp(45.0, 295.0, FRAME_SIZE * 4)).await;

        assert!(matches!(result, Err(EngineError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn unresolvable_winner_surfaces_catalogue_corruption() {
        let mut store = MemoryStore::default();
        let samples = chirp(45.0, 295.0, FRAME_SIZE * 4);
        ingest(&store, "Ghost", "Nobody", "ghost.mp3", samples.clone())
            .await
            .unwrap();

        store.drop_songs = true;
        let result = identify(&store, samples).await;

        assert!(matches!(
            result,
            Err(EngineError::InconsistentCatalogue { .. })
        ));
    }

    #[tokio::test]
    async fn ingest_creates_listable_songs() {
        let store = MemoryStore::default();
        ingest(&store, "One", "A", "1.mp3", chirp(45.0, 295.0, FRAME_SIZE * 2))
            .await
            .unwrap();
        ingest(&store, "Two", "B", "2.mp3", chirp(60.0, 200.0, FRAME_SIZE * 2))
            .await
            .unwrap();

        let songs = store.list_songs().await.unwrap();
        assert_eq!(songs.len(), 2);
        assert_eq!(songs[0].title, "One");
    }
}
