//! SQLite-backed catalogue store.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::error::EngineError;
use crate::fingerprint::hashing::Fingerprint;
use crate::fingerprint::matching::SongHits;
use crate::models::Song;
use crate::persistance::CatalogueStore;

/// Rows per INSERT statement. Three binds per row keeps a chunk well under
/// SQLite's 999 bind-parameter floor.
const INSERT_CHUNK_SIZE: usize = 300;

/// Hashes per SELECT ... IN (...) expansion, same constraint.
const HASH_CHUNK_SIZE: usize = 500;

pub struct Database {
    connection: SqlitePool,
}

impl Database {
    /// Connect and make sure the schema exists.
    ///
    /// SQLite serializes writers anyway; a single pooled connection also
    /// keeps `sqlite::memory:` databases coherent across calls.
    pub async fn init(url: &str) -> Result<Self, EngineError> {
        let connection = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;

        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&connection)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS songs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                artist TEXT NOT NULL,
                audio_ref TEXT NOT NULL
            )
            "#,
        )
        .execute(&connection)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fingerprints (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                hash INTEGER NOT NULL,
                song_id INTEGER NOT NULL REFERENCES songs(id),
                time_offset INTEGER NOT NULL
            )
            "#,
        )
        .execute(&connection)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS fingerprints_hash_idx ON fingerprints(hash)")
            .execute(&connection)
            .await?;

        Ok(Self { connection })
    }
}

#[async_trait]
impl CatalogueStore for Database {
    async fn create_song(
        &self,
        title: &str,
        artist: &str,
        audio_ref: &str,
    ) -> Result<Song, EngineError> {
        let row = sqlx::query(
            r#"
            INSERT INTO songs (title, artist, audio_ref)
            VALUES (?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(title)
        .bind(artist)
        .bind(audio_ref)
        .fetch_one(&self.connection)
        .await?;

        Ok(Song {
            id: row.get("id"),
            title: title.to_string(),
            artist: artist.to_string(),
            audio_ref: audio_ref.to_string(),
        })
    }

    async fn insert_fingerprints(
        &self,
        song_id: i64,
        fingerprints: &[Fingerprint],
    ) -> Result<(), EngineError> {
        let mut tx = self.connection.begin().await?;

        for chunk in fingerprints.chunks(INSERT_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT INTO fingerprints (hash, song_id, time_offset) ");

            builder.push_values(chunk, |mut row, fingerprint| {
                // u64 hashes round-trip through SQLite's signed integers;
                // the cast back in find_by_hashes restores them.
                row.push_bind(fingerprint.hash as i64)
                    .push_bind(song_id)
                    .push_bind(i64::from(fingerprint.frame_index));
            });

            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_hashes(&self, hashes: &HashSet<u64>) -> Result<SongHits, EngineError> {
        let mut hits = SongHits::new();
        if hashes.is_empty() {
            return Ok(hits);
        }

        let hashes: Vec<i64> = hashes.iter().map(|&hash| hash as i64).collect();

        for chunk in hashes.chunks(HASH_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "SELECT song_id, hash, time_offset FROM fingerprints WHERE hash IN (",
            );

            let mut separated = builder.separated(", ");
            for hash in chunk {
                separated.push_bind(*hash);
            }
            separated.push_unseparated(")");

            let rows = builder.build().fetch_all(&self.connection).await?;

            for row in rows {
                let song_id: i64 = row.get("song_id");
                let hash: i64 = row.get("hash");
                let time_offset: i64 = row.get("time_offset");

                hits.entry(song_id)
                    .or_default()
                    .push((hash as u64, time_offset));
            }
        }

        Ok(hits)
    }

    async fn get_song(&self, song_id: i64) -> Result<Option<Song>, EngineError> {
        Ok(sqlx::query_as::<_, Song>(
            "SELECT id, title, artist, audio_ref FROM songs WHERE id = ?",
        )
        .bind(song_id)
        .fetch_optional(&self.connection)
        .await?)
    }

    async fn list_songs(&self) -> Result<Vec<Song>, EngineError> {
        Ok(sqlx::query_as::<_, Song>(
            "SELECT id, title, artist, audio_ref FROM songs ORDER BY id",
        )
        .fetch_all(&self.connection)
        .await?)
    }
}
