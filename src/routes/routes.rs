//! Defines routes for the audio API and the dashboard.
//!
//! ## Structure
//! - **Audio endpoints**
//!   - `POST   /api/upload`             multipart upload (`audio`, `name`, `surname`)
//!   - `GET    /api/audio`              list all records, newest first
//!   - `GET    /api/audio/{id}`         one record
//!   - `DELETE /api/audio/{id}`         delete record and file
//!   - `GET    /api/audio/{id}/stream`  play back the file
//!
//! - **Per-user endpoints**
//!   - `GET    /api/users/stats`        upload counts per owner
//!   - `GET    /api/users/audio`        records of one owner (`?name=&surname=`)
//!
//! Anything else is served from the dashboard's static directory.

use crate::{
    handlers::{
        audio_handlers::{
            delete_audio, get_audio, list_audio, stream_audio, upload_audio, user_audio,
            user_statistics,
        },
        health_handlers::{healthz, readyz},
    },
    services::audio_service::AudioService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::path::Path;
use tower_http::{cors::CorsLayer, services::ServeDir};

/// Room for multipart boundaries and the owner text fields on top of the file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the API router. Handlers share `AudioService` as state.
pub fn routes() -> Router<AudioService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api/upload", post(upload_audio))
        .route("/api/audio", get(list_audio))
        .route("/api/audio/{id}", get(get_audio).delete(delete_audio))
        .route("/api/audio/{id}/stream", get(stream_audio))
        .route("/api/users/stats", get(user_statistics))
        .route("/api/users/audio", get(user_audio))
}

/// The full application: API routes, upload size limit, permissive CORS and
/// the static dashboard as fallback.
pub fn app(service: AudioService, public_dir: impl AsRef<Path>) -> Router {
    let body_limit = usize::try_from(service.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    routes()
        .layer(DefaultBodyLimit::max(body_limit))
        .fallback_service(ServeDir::new(public_dir.as_ref()))
        .layer(CorsLayer::permissive())
        .with_state(service)
}
