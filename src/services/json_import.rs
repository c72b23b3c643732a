//! One-shot import of the legacy `audio-metadata.json` file into the
//! metadata store.
//!
//! The JSON file is an array of records in the same camelCase shape the API
//! serves. Entries whose payload is gone from disk are skipped; after the run
//! the JSON file is copied to `<file>.backup.<unix millis>`.

use crate::{
    models::audio::AudioRecord,
    services::metadata_store::{MetadataStore, StoreResult},
};
use chrono::Utc;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, warn};

/// Entry that could not be imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    /// Original filename, or the id when the entry has none.
    pub audio: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub migrated: usize,
    pub skipped: Vec<SkippedEntry>,
    pub backup_path: Option<PathBuf>,
    /// Records in the store once the import finished.
    pub total_records: usize,
}

/// Import every usable entry of `json_path` into `store`.
///
/// A missing, empty, malformed or non-array file imports nothing and is not
/// an error. Only failures of the store itself abort the run.
pub async fn import_json(store: &MetadataStore, json_path: &Path) -> StoreResult<ImportReport> {
    let mut report = ImportReport::default();

    let raw = match fs::read_to_string(json_path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!(
                "No existing JSON metadata file at {}. Nothing to migrate.",
                json_path.display()
            );
            return Ok(report);
        }
        Err(err) => return Err(err.into()),
    };

    if raw.trim().is_empty() {
        warn!("JSON file is empty. Nothing to migrate.");
        return Ok(report);
    }

    let entries = match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Array(entries)) => entries,
        Ok(_) => {
            warn!("JSON file does not contain an array. Nothing to migrate.");
            return Ok(report);
        }
        Err(err) => {
            error!("Error parsing JSON file: {}", err);
            return Ok(report);
        }
    };

    if entries.is_empty() {
        warn!("JSON file contains no audio files. Nothing to migrate.");
        return Ok(report);
    }

    info!("Found {} audio file(s) in JSON", entries.len());
    let existing = store.list_all().await?.len();
    if existing > 0 {
        warn!(
            "Database already contains {} record(s); they are kept and ids already present are skipped",
            existing
        );
    }

    let total = entries.len();
    for (index, entry) in entries.into_iter().enumerate() {
        let label = entry_label(&entry);
        let record = match serde_json::from_value::<AudioRecord>(entry) {
            Ok(record) => record,
            Err(err) => {
                warn!("Skipping {}: {}", label, err);
                report.skipped.push(SkippedEntry {
                    audio: label,
                    reason: format!("invalid entry: {err}"),
                });
                continue;
            }
        };

        if !Path::new(&record.path).exists() {
            warn!("Skipping {}: File not found at {}", label, record.path);
            report.skipped.push(SkippedEntry {
                audio: label,
                reason: "File not found on disk".into(),
            });
            continue;
        }

        match store.insert(record).await {
            Ok(_) => report.migrated += 1,
            Err(err) => {
                error!("Error migrating {}: {}", label, err);
                report.skipped.push(SkippedEntry {
                    audio: label,
                    reason: err.to_string(),
                });
            }
        }

        if (index + 1) % 10 == 0 {
            info!("Migrated {}/{} files...", index + 1, total);
        }
    }

    let backup_path = backup_path_for(json_path);
    match fs::copy(json_path, &backup_path).await {
        Ok(_) => {
            info!("JSON file backed up to: {}", backup_path.display());
            report.backup_path = Some(backup_path);
        }
        Err(err) => warn!("Could not create backup: {}", err),
    }

    report.total_records = store.list_all().await?.len();
    info!(
        "Migration completed: {} migrated, {} skipped, {} total record(s)",
        report.migrated,
        report.skipped.len(),
        report.total_records
    );
    Ok(report)
}

fn entry_label(entry: &Value) -> String {
    entry
        .get("originalName")
        .and_then(Value::as_str)
        .or_else(|| entry.get("id").and_then(Value::as_str))
        .unwrap_or("<unnamed>")
        .to_string()
}

fn backup_path_for(json_path: &Path) -> PathBuf {
    let mut name = json_path.as_os_str().to_owned();
    name.push(format!(".backup.{}", Utc::now().timestamp_millis()));
    PathBuf::from(name)
}
