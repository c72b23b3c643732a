//! HTTP handlers for audio uploads, listings, playback and statistics.
//! Upload and playback stream bodies to avoid buffering whole files. All
//! persistence goes through `AudioService` and its `MetadataStore`.

use crate::{
    errors::AppError,
    models::{
        audio::{AudioRecord, Owner},
        stats::UserStatistics,
    },
    services::audio_service::{AudioService, StagedUpload},
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, Query, Request, State},
    response::Response,
};
use futures::StreamExt;
use mime_guess::Mime;
use serde::{Deserialize, Serialize};
use std::io;
use tower::ServiceExt;
use tower_http::services::ServeFile;

/// Multipart field carrying the file.
const AUDIO_FIELD: &str = "audio";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub audio: AudioRecord,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

/// Query for `GET /api/users/audio`; missing parts mean empty strings.
#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub name: Option<String>,
    pub surname: Option<String>,
}

/// POST `/api/upload`: multipart with an `audio` file plus `name`/`surname`.
///
/// The file is staged as soon as its field arrives; the owner fields may come
/// before or after it, so the record is only written once the body is done.
pub async fn upload_audio(
    State(service): State<AudioService>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut owner = Owner::default();
    let mut staged: Option<StagedUpload> = None;

    let read = async {
        while let Some(field) = multipart.next_field().await? {
            let field_name = field.name().unwrap_or_default().to_string();
            match field_name.as_str() {
                "name" => owner.name = field.text().await?,
                "surname" => owner.surname = field.text().await?,
                AUDIO_FIELD if staged.is_none() => {
                    let original_name = field.file_name().unwrap_or_default().to_string();
                    let mimetype = field.content_type().map(str::to_string);
                    let stream = field.map(|chunk| chunk.map_err(io::Error::other));
                    staged = Some(
                        service
                            .stage_upload(original_name, mimetype, stream)
                            .await?,
                    );
                }
                _ => {}
            }
        }
        Ok::<_, AppError>(())
    }
    .await;

    if let Err(err) = read {
        if let Some(staged) = staged {
            service.discard(staged).await;
        }
        return Err(err);
    }

    let staged = staged.ok_or_else(|| AppError::bad_request("No audio file provided"))?;
    let audio = service.commit(staged, owner).await?;

    Ok(Json(UploadResponse {
        success: true,
        message: "Audio file uploaded successfully".into(),
        audio,
    }))
}

/// GET `/api/audio`: every record, newest first.
pub async fn list_audio(
    State(service): State<AudioService>,
) -> Result<Json<Vec<AudioRecord>>, AppError> {
    Ok(Json(service.store.list_all().await?))
}

/// GET `/api/audio/{id}`
pub async fn get_audio(
    State(service): State<AudioService>,
    Path(id): Path<String>,
) -> Result<Json<AudioRecord>, AppError> {
    service
        .store
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Audio file not found"))
}

/// DELETE `/api/audio/{id}`: removes the record and the file.
pub async fn delete_audio(
    State(service): State<AudioService>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    service.delete(&id).await?;
    Ok(Json(DeleteResponse {
        success: true,
        message: "Audio file deleted successfully".into(),
    }))
}

/// GET `/api/audio/{id}/stream`: the payload, honouring `Range` so the
/// dashboard's player can seek.
pub async fn stream_audio(
    State(service): State<AudioService>,
    Path(id): Path<String>,
    request: Request,
) -> Result<Response, AppError> {
    let (record, _file) = service.open(&id).await?;

    let mime = record
        .mimetype
        .as_deref()
        .and_then(|m| m.parse::<Mime>().ok())
        .unwrap_or_else(|| mime_guess::from_path(&record.path).first_or_octet_stream());

    let response = ServeFile::new_with_mime(&record.path, &mime)
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {});

    Ok(response.map(Body::new))
}

/// GET `/api/users/stats`
pub async fn user_statistics(
    State(service): State<AudioService>,
) -> Result<Json<Vec<UserStatistics>>, AppError> {
    Ok(Json(service.store.user_statistics().await?))
}

/// GET `/api/users/audio?name=&surname=`
pub async fn user_audio(
    State(service): State<AudioService>,
    Query(q): Query<OwnerQuery>,
) -> Result<Json<Vec<AudioRecord>>, AppError> {
    let name = q.name.unwrap_or_default();
    let surname = q.surname.unwrap_or_default();
    Ok(Json(service.store.list_by_owner(&name, &surname).await?))
}
