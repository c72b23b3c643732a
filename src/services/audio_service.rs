//! src/services/audio_service.rs
//!
//! AudioService couples the upload directory on disk with the
//! [`MetadataStore`]. Payloads land under `upload_dir/{uuid}-{millis}{ext}`;
//! the store only ever sees the resulting record.

use crate::{
    models::audio::{AudioRecord, Owner, format_from_name},
    services::metadata_store::{MetadataStore, StoreError},
};
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Extensions / MIME subtypes accepted as audio.
const AUDIO_KINDS: [&str; 7] = ["mp3", "wav", "ogg", "m4a", "aac", "flac", "webm"];

/// Default cap on a single upload: 100 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Only audio files are allowed!")]
    NotAudio,
    #[error("audio file exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },
    #[error("audio file `{0}` not found")]
    NotFound(String),
    #[error("audio file `{0}` not found on disk")]
    MissingOnDisk(String),
    #[error(transparent)]
    Store(StoreError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<StoreError> for AudioError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => AudioError::NotFound(id),
            other => AudioError::Store(other),
        }
    }
}

pub type AudioResult<T> = Result<T, AudioError>;

/// Payload already on disk under its final name, not yet recorded.
#[derive(Debug)]
pub struct StagedUpload {
    pub original_name: String,
    pub mimetype: Option<String>,
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Clone)]
pub struct AudioService {
    /// Metadata for every stored file.
    pub store: MetadataStore,

    /// Directory holding the uploaded payloads.
    pub upload_dir: PathBuf,

    pub max_upload_bytes: u64,
}

impl AudioService {
    pub fn new(store: MetadataStore, upload_dir: impl Into<PathBuf>, max_upload_bytes: u64) -> Self {
        Self {
            store,
            upload_dir: upload_dir.into(),
            max_upload_bytes,
        }
    }

    /// Write an upload's bytes to their final place without recording them.
    ///
    /// Bytes go to a temporary file which is fsynced and renamed into place.
    /// The caller must follow up with [`AudioService::commit`] or
    /// [`AudioService::discard`].
    pub async fn stage_upload<S>(
        &self,
        original_name: String,
        mimetype: Option<String>,
        stream: S,
    ) -> AudioResult<StagedUpload>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        if !is_audio(&original_name, mimetype.as_deref()) {
            return Err(AudioError::NotAudio);
        }

        fs::create_dir_all(&self.upload_dir).await?;
        let filename = unique_filename(&original_name);
        let path = self.upload_dir.join(&filename);
        let tmp_path = self.upload_dir.join(format!(".tmp-{}", Uuid::new_v4()));

        let size = match self.write_temp(&tmp_path, stream).await {
            Ok(size) => size,
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(err);
            }
        };

        if let Err(err) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(AudioError::Io(err));
        }

        debug!("staged {} ({} bytes) at {}", original_name, size, path.display());
        Ok(StagedUpload {
            original_name,
            mimetype,
            filename,
            path,
            size,
        })
    }

    /// Insert the record for a staged upload. Owner parts are trimmed.
    /// If the insert fails the staged file is removed.
    pub async fn commit(&self, staged: StagedUpload, owner: Owner) -> AudioResult<AudioRecord> {
        let record = AudioRecord {
            id: Uuid::new_v4().to_string(),
            format: format_from_name(&staged.original_name),
            original_name: staged.original_name,
            filename: staged.filename,
            path: staged.path.to_string_lossy().into_owned(),
            size: staged.size,
            mimetype: staged.mimetype,
            uploaded_at: Utc::now(),
            duration: None,
            owner: Owner::new(owner.name.trim(), owner.surname.trim()),
        };

        match self.store.insert(record).await {
            Ok(record) => {
                info!(
                    "Stored {} ({} bytes) as {}",
                    record.original_name, record.size, record.filename
                );
                Ok(record)
            }
            Err(err) => {
                let _ = fs::remove_file(&staged.path).await;
                Err(err.into())
            }
        }
    }

    /// Drop a staged upload that will not be recorded.
    pub async fn discard(&self, staged: StagedUpload) {
        if let Err(err) = fs::remove_file(&staged.path).await {
            warn!("failed to discard {}: {}", staged.path.display(), err);
        }
    }

    async fn write_temp<S>(&self, tmp_path: &Path, stream: S) -> AudioResult<u64>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let mut file = File::create(tmp_path).await?;
        let mut size: u64 = 0;

        pin_mut!(stream);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            size += chunk.len() as u64;
            if size > self.max_upload_bytes {
                return Err(AudioError::TooLarge {
                    limit: self.max_upload_bytes,
                });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        file.sync_all().await?;
        Ok(size)
    }

    /// Fetch a record together with its opened payload.
    ///
    /// A record whose file has vanished yields `MissingOnDisk`.
    pub async fn open(&self, id: &str) -> AudioResult<(AudioRecord, File)> {
        let record = self
            .store
            .get_by_id(id)
            .await?
            .ok_or_else(|| AudioError::NotFound(id.to_string()))?;

        let file = File::open(&record.path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                AudioError::MissingOnDisk(id.to_string())
            } else {
                AudioError::Io(err)
            }
        })?;

        Ok((record, file))
    }

    /// Remove the record, then its payload.
    ///
    /// A payload that is already gone is not an error.
    pub async fn delete(&self, id: &str) -> AudioResult<AudioRecord> {
        let record = self.store.delete(id).await?;

        match fs::remove_file(&record.path).await {
            Ok(_) => debug!("removed physical file {}", record.path),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", record.path);
            }
            Err(err) => warn!("failed to remove {} after delete: {}", record.path, err),
        }

        Ok(record)
    }
}

/// Accept a file when either its MIME type or its extension names a known
/// audio kind.
pub fn is_audio(original_name: &str, mimetype: Option<&str>) -> bool {
    let by_mime = mimetype.is_some_and(|mime| {
        let mime = mime.to_ascii_lowercase();
        AUDIO_KINDS
            .iter()
            .any(|kind| mime.contains(&format!("audio/{kind}")))
    });
    let lower_name = original_name.to_ascii_lowercase();
    let by_ext = AUDIO_KINDS
        .iter()
        .any(|kind| lower_name.ends_with(&format!(".{kind}")));
    by_mime || by_ext
}

/// `{uuid}-{unix millis}{ext}`, keeping the extension as the client sent it.
fn unique_filename(original_name: &str) -> String {
    let ext = Path::new(original_name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    format!("{}-{}{}", Uuid::new_v4(), Utc::now().timestamp_millis(), ext)
}
