//! Represents an uploaded audio file and its owner.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// The person an upload is attributed to.
///
/// Not a foreign key: both parts are plain text and default to empty strings
/// so grouping by owner never has to deal with nulls.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Owner {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub surname: String,
}

impl Owner {
    pub fn new(name: impl Into<String>, surname: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            surname: surname.into(),
        }
    }
}

/// Metadata for one stored audio file.
///
/// The record describes the bytes on disk; it does not hold them. Once
/// inserted, `id`, `path`, `filename` and `uploaded_at` never change.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AudioRecord {
    /// Opaque unique identifier (a UUID for records created by the upload handler).
    pub id: String,

    /// Filename as supplied by the client.
    pub original_name: String,

    /// Server-generated unique filename inside the upload directory.
    pub filename: String,

    /// Filesystem path of the stored bytes.
    pub path: String,

    /// Size in bytes.
    pub size: u64,

    /// MIME type reported by the upload transport.
    #[serde(default)]
    pub mimetype: Option<String>,

    /// Upload instant, millisecond precision.
    #[serde(with = "iso_millis")]
    pub uploaded_at: DateTime<Utc>,

    /// Reserved for audio length; never populated yet.
    #[serde(default)]
    pub duration: Option<i64>,

    /// Lower-cased extension including the leading dot, e.g. `.mp3`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub format: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub owner: Owner,
}

impl AudioRecord {
    /// Truncate the upload instant to the precision the store persists.
    pub fn normalized(mut self) -> Self {
        self.uploaded_at = self.uploaded_at.trunc_subsecs(3);
        self
    }
}

/// Lower-cased extension of `name` with its leading dot, or an empty string.
pub fn format_from_name(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

/// Render a timestamp as `2024-05-01T10:00:00.000Z`.
///
/// Every stored `uploaded_at` uses this exact shape so that text ordering in
/// SQLite matches chronological ordering.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse any RFC 3339 timestamp into UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}

/// Treat an explicit `null` like a missing key. Older metadata files wrote
/// `"owner": null` for anonymous uploads.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

mod iso_millis {
    use super::{format_timestamp, parse_timestamp};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn format_is_lowercased_with_dot() {
        assert_eq!(format_from_name("Song.MP3"), ".mp3");
        assert_eq!(format_from_name("archive.tar.FLAC"), ".flac");
        assert_eq!(format_from_name("noext"), "");
        assert_eq!(format_from_name(".hidden"), "");
    }

    #[test]
    fn deserializes_legacy_json_with_missing_fields() {
        let json = r#"{
            "id": "abc",
            "originalName": "take1.wav",
            "filename": "uuid-1700000000000.wav",
            "path": "uploads/uuid-1700000000000.wav",
            "size": 42,
            "uploadedAt": "2024-05-01T10:00:00.123Z"
        }"#;
        let rec: AudioRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.owner, Owner::default());
        assert_eq!(rec.mimetype, None);
        assert_eq!(rec.duration, None);
        assert_eq!(
            rec.uploaded_at,
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
                + chrono::Duration::milliseconds(123)
        );
    }

    #[test]
    fn null_owner_and_format_read_as_empty() {
        let json = r#"{
            "id": "n1",
            "originalName": "memo.ogg",
            "filename": "f.ogg",
            "path": "uploads/f.ogg",
            "size": 1,
            "uploadedAt": "2024-05-01T10:00:00.000Z",
            "mimetype": null,
            "format": null,
            "owner": null
        }"#;
        let rec: AudioRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.format, "");
        assert_eq!(rec.owner, Owner::default());
        assert_eq!(rec.mimetype, None);

        let owner: Owner = serde_json::from_str(r#"{"name": null, "surname": "Lee"}"#).unwrap();
        assert_eq!(owner, Owner::new("", "Lee"));
    }

    #[test]
    fn serializes_camel_case_with_millisecond_timestamp() {
        let rec = AudioRecord {
            id: "a1".into(),
            original_name: "x.ogg".into(),
            filename: "f.ogg".into(),
            path: "uploads/f.ogg".into(),
            size: 3,
            mimetype: Some("audio/ogg".into()),
            uploaded_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            duration: None,
            format: ".ogg".into(),
            owner: Owner::new("Jo", "Doe"),
        };
        let value = serde_json::to_value(&rec).unwrap();
        assert_eq!(value["originalName"], "x.ogg");
        assert_eq!(value["uploadedAt"], "2024-01-02T03:04:05.000Z");
        assert_eq!(value["owner"]["surname"], "Doe");
        assert!(value["duration"].is_null());
    }
}
