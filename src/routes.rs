//! HTTP boundary for the catalogue service.
//!
//! Accepts multipart uploads, maps engine error kinds onto transport
//! responses and applies the match-threshold policy. Nothing below this
//! module knows about HTTP.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;

use crate::error::EngineError;
use crate::fingerprint::decode::decode;
use crate::models::Song;
use crate::persistance::database::Database;
use crate::persistance::{self, CatalogueStore};

/// A best alignment explaining fewer query hashes than this is reported as
/// unmatched. Policy of the boundary, not the matcher.
const MATCH_THRESHOLD: f64 = 0.1;

/// Uploads cap out at 50 MiB, enough for a full-length lossless track.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub fn router(database: Arc<Database>) -> Router {
    Router::new()
        .route("/songs", post(ingest_song).get(list_songs))
        .route("/identify", post(identify_song))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(database)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_songs(
    State(database): State<Arc<Database>>,
) -> Result<Json<Vec<Song>>, EngineError> {
    Ok(Json(database.list_songs().await?))
}

/// Catalogue a new song from a multipart upload with `title`, `artist` and
/// `file` fields.
async fn ingest_song(
    State(database): State<Arc<Database>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Song>), EngineError> {
    let SongUpload {
        title,
        artist,
        file_name,
        audio,
    } = SongUpload::read(multipart).await?;

    let samples = tokio::task::spawn_blocking(move || decode(&audio)).await??;
    let song =
        persistance::ingest(database.as_ref(), &title, &artist, &file_name, samples).await?;

    Ok((StatusCode::CREATED, Json(song)))
}

#[derive(Serialize)]
struct IdentifyResponse {
    matched: bool,
    song: Option<Song>,
    confidence: f64,
}

/// Identify an uploaded clip against the catalogue.
async fn identify_song(
    State(database): State<Arc<Database>>,
    multipart: Multipart,
) -> Result<Json<IdentifyResponse>, EngineError> {
    let upload = SongUpload::read(multipart).await?;

    let samples = tokio::task::spawn_blocking(move || decode(&upload.audio)).await??;
    let identification = persistance::identify(database.as_ref(), samples).await?;

    let matched = identification.confidence > MATCH_THRESHOLD;
    Ok(Json(IdentifyResponse {
        matched,
        song: if matched { identification.song } else { None },
        confidence: identification.confidence,
    }))
}

struct SongUpload {
    title: String,
    artist: String,
    file_name: String,
    audio: Vec<u8>,
}

impl SongUpload {
    /// Pull the known fields out of a multipart body. The audio part is
    /// required; metadata fields default to empty.
    async fn read(mut multipart: Multipart) -> Result<Self, EngineError> {
        let mut title = String::new();
        let mut artist = String::new();
        let mut file_name = String::new();
        let mut audio = Vec::new();

        while let Some(field) = multipart.next_field().await.map_err(invalid)? {
            let name = field.name().unwrap_or_default().to_string();

            match name.as_str() {
                "title" => title = field.text().await.map_err(invalid)?,
                "artist" => artist = field.text().await.map_err(invalid)?,
                "file" => {
                    file_name = field.file_name().unwrap_or("upload").to_string();
                    audio = field.bytes().await.map_err(invalid)?.to_vec();
                }
                _ => {}
            }
        }

        if audio.is_empty() {
            return Err(EngineError::Validation("no audio file provided".to_string()));
        }

        Ok(Self {
            title,
            artist,
            file_name,
            audio,
        })
    }
}

fn invalid(error: axum::extract::multipart::MultipartError) -> EngineError {
    EngineError::Validation(error.to_string())
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn status_for(error: &EngineError) -> StatusCode {
    match error {
        EngineError::Validation(_) => StatusCode::BAD_REQUEST,
        EngineError::Decode(_)
        | EngineError::NoAudioTrack
        | EngineError::Resample(_)
        | EngineError::ResamplerConstruction(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::InconsistentCatalogue { .. } | EngineError::Task(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
