//! src/services/metadata_store.rs
//!
//! MetadataStore: the `audio_files` table in SQLite, one row per uploaded
//! file. The store never touches the audio bytes themselves. Callers own the
//! files on disk and coordinate their lifecycle around these calls.

use crate::models::{
    audio::{AudioRecord, Owner, format_timestamp, parse_timestamp},
    stats::UserStatistics,
};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use sqlx::{
    FromRow, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{io, path::Path, str::FromStr, sync::Arc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("audio record `{0}` not found")]
    NotFound(String),
    #[error("audio record `{0}` already exists")]
    DuplicateId(String),
    #[error("invalid audio record: {0}")]
    InvalidRecord(String),
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS audio_files (
        id TEXT PRIMARY KEY,
        original_name TEXT NOT NULL,
        filename TEXT NOT NULL,
        file_path TEXT NOT NULL,
        size INTEGER NOT NULL,
        mimetype TEXT,
        uploaded_at TEXT NOT NULL,
        duration INTEGER,
        format TEXT,
        owner_name TEXT NOT NULL DEFAULT '',
        owner_surname TEXT NOT NULL DEFAULT ''
    )
"#;

/// Persistent metadata for uploaded audio files.
///
/// The connection is opened lazily on first use, together with the
/// create-if-absent schema, and shared by every clone of the store.
/// After [`MetadataStore::close`] the next call opens a fresh connection.
#[derive(Clone)]
pub struct MetadataStore {
    options: SqliteConnectOptions,
    pool: Arc<Mutex<Option<SqlitePool>>>,
}

/// Flat table row; owner columns are nullable in databases created by older
/// versions of the service.
#[derive(FromRow)]
struct AudioRow {
    id: String,
    original_name: String,
    filename: String,
    file_path: String,
    size: i64,
    mimetype: Option<String>,
    uploaded_at: String,
    duration: Option<i64>,
    format: Option<String>,
    owner_name: Option<String>,
    owner_surname: Option<String>,
}

impl TryFrom<AudioRow> for AudioRecord {
    type Error = StoreError;

    fn try_from(row: AudioRow) -> StoreResult<Self> {
        let size = u64::try_from(row.size).map_err(|_| {
            StoreError::InvalidRecord(format!("negative size {} for `{}`", row.size, row.id))
        })?;
        let uploaded_at = parse_timestamp(&row.uploaded_at).map_err(|err| {
            StoreError::InvalidRecord(format!(
                "bad uploaded_at `{}` for `{}`: {}",
                row.uploaded_at, row.id, err
            ))
        })?;

        Ok(AudioRecord {
            id: row.id,
            original_name: row.original_name,
            filename: row.filename,
            path: row.file_path,
            size,
            mimetype: row.mimetype,
            uploaded_at,
            duration: row.duration,
            format: row.format.unwrap_or_default(),
            owner: Owner {
                name: row.owner_name.unwrap_or_default(),
                surname: row.owner_surname.unwrap_or_default(),
            },
        })
    }
}

impl MetadataStore {
    /// Create a store for the given connect options. Nothing is opened yet.
    pub fn new(options: SqliteConnectOptions) -> Self {
        Self {
            options,
            pool: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a store for a `sqlite://` URL, creating the database file and
    /// its parent directory when missing.
    pub fn open(database_url: &str) -> StoreResult<Self> {
        let db_path = database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:")
            .trim_start_matches("file:");
        debug!("Interpreted SQLite path => {}", db_path);

        if !db_path.starts_with(":memory:") {
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent)?;
                    info!("Created missing directory {:?}", parent);
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        Ok(Self::new(options))
    }

    /// Wrap an already-open pool. The schema is created immediately; if the
    /// store is closed later it reconnects with the pool's own options.
    #[allow(dead_code)]
    pub async fn with_pool(pool: SqlitePool) -> StoreResult<Self> {
        create_schema(&pool).await?;
        let options = (*pool.connect_options()).clone();
        Ok(Self {
            options,
            pool: Arc::new(Mutex::new(Some(pool))),
        })
    }

    /// Return the live pool, connecting and creating the schema on first use.
    async fn pool(&self) -> StoreResult<SqlitePool> {
        let mut slot = self.pool.lock().await;
        if let Some(pool) = slot.as_ref() {
            if !pool.is_closed() {
                return Ok(pool.clone());
            }
        }

        // A single long-lived connection; in-memory databases would lose
        // their contents if the pool recycled it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(self.options.clone())
            .await?;
        create_schema(&pool).await?;
        info!("Connected to SQLite database");

        *slot = Some(pool.clone());
        Ok(pool)
    }

    /// Insert one new record and return it as stored.
    ///
    /// Fails with `DuplicateId` when the id is already present.
    pub async fn insert(&self, record: AudioRecord) -> StoreResult<AudioRecord> {
        let record = record.normalized();
        let size = i64::try_from(record.size).map_err(|_| {
            StoreError::InvalidRecord(format!("size {} does not fit", record.size))
        })?;
        let pool = self.pool().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO audio_files (
                id, original_name, filename, file_path, size, mimetype,
                uploaded_at, duration, format, owner_name, owner_surname
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.original_name)
        .bind(&record.filename)
        .bind(&record.path)
        .bind(size)
        .bind(record.mimetype.as_deref())
        .bind(format_timestamp(&record.uploaded_at))
        .bind(record.duration)
        .bind(&record.format)
        .bind(&record.owner.name)
        .bind(&record.owner.surname)
        .execute(&pool)
        .await;

        match result {
            Ok(_) => {
                info!("Audio inserted with ID: {}", record.id);
                Ok(record)
            }
            Err(err) if is_unique_violation(&err) => Err(StoreError::DuplicateId(record.id)),
            Err(err) => Err(StoreError::Storage(err)),
        }
    }

    /// Every record, most recent upload first.
    pub async fn list_all(&self) -> StoreResult<Vec<AudioRecord>> {
        let pool = self.pool().await?;
        let rows = sqlx::query_as::<_, AudioRow>(
            "SELECT id, original_name, filename, file_path, size, mimetype,
                    uploaded_at, duration, format, owner_name, owner_surname
             FROM audio_files
             ORDER BY uploaded_at DESC",
        )
        .fetch_all(&pool)
        .await?;

        let records = into_records(rows);
        debug!("Fetched {} audio file(s) from database", records.len());
        Ok(records)
    }

    /// Look up one record. A missing id is `None`, not an error.
    pub async fn get_by_id(&self, id: &str) -> StoreResult<Option<AudioRecord>> {
        let pool = self.pool().await?;
        sqlx::query_as::<_, AudioRow>(
            "SELECT id, original_name, filename, file_path, size, mimetype,
                    uploaded_at, duration, format, owner_name, owner_surname
             FROM audio_files
             WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .map(AudioRecord::try_from)
        .transpose()
    }

    /// Remove a record and return it as it was before removal.
    ///
    /// Lookup and removal are one statement, so of two deletes racing for the
    /// same id exactly one succeeds; the other gets `NotFound`.
    pub async fn delete(&self, id: &str) -> StoreResult<AudioRecord> {
        let pool = self.pool().await?;
        let row = sqlx::query_as::<_, AudioRow>(
            "DELETE FROM audio_files
             WHERE id = ?
             RETURNING id, original_name, filename, file_path, size, mimetype,
                       uploaded_at, duration, format, owner_name, owner_surname",
        )
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        info!("Audio deleted with ID: {}", id);
        AudioRecord::try_from(row)
    }

    /// Records whose owner exactly matches (case-sensitive), newest first.
    pub async fn list_by_owner(&self, name: &str, surname: &str) -> StoreResult<Vec<AudioRecord>> {
        let pool = self.pool().await?;
        let rows = sqlx::query_as::<_, AudioRow>(
            "SELECT id, original_name, filename, file_path, size, mimetype,
                    uploaded_at, duration, format, owner_name, owner_surname
             FROM audio_files
             WHERE COALESCE(owner_name, '') = ? AND COALESCE(owner_surname, '') = ?
             ORDER BY uploaded_at DESC",
        )
        .bind(name)
        .bind(surname)
        .fetch_all(&pool)
        .await?;

        let records = into_records(rows);
        debug!(
            "Fetched {} audio file(s) for user: {} {}",
            records.len(),
            name,
            surname
        );
        Ok(records)
    }

    /// Upload counts per named owner, with `today_count` taken over the
    /// current local calendar day.
    pub async fn user_statistics(&self) -> StoreResult<Vec<UserStatistics>> {
        self.user_statistics_for_day(Local::now().date_naive()).await
    }

    /// Upload counts per named owner, with `today_count` taken over `day`
    /// in local time. Owners with both name and surname empty are left out.
    pub async fn user_statistics_for_day(&self, day: NaiveDate) -> StoreResult<Vec<UserStatistics>> {
        let (start, end) = local_day_bounds(day);
        let pool = self.pool().await?;

        let stats = sqlx::query_as::<_, UserStatistics>(
            "SELECT COALESCE(owner_name, '') AS name,
                    COALESCE(owner_surname, '') AS surname,
                    COUNT(*) AS total_count,
                    SUM(CASE WHEN uploaded_at >= ? AND uploaded_at < ? THEN 1 ELSE 0 END)
                        AS today_count
             FROM audio_files
             WHERE COALESCE(owner_name, '') != '' OR COALESCE(owner_surname, '') != ''
             GROUP BY COALESCE(owner_name, ''), COALESCE(owner_surname, '')
             ORDER BY name, surname",
        )
        .bind(format_timestamp(&start))
        .bind(format_timestamp(&end))
        .fetch_all(&pool)
        .await?;

        debug!("Fetched statistics for {} user(s)", stats.len());
        Ok(stats)
    }

    /// Cheap connectivity check.
    pub async fn ping(&self) -> StoreResult<()> {
        let pool = self.pool().await?;
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&pool)
            .await?;
        Ok(())
    }

    /// Release the connection. Calling it again is a no-op; any later
    /// operation reconnects.
    pub async fn close(&self) {
        let pool = self.pool.lock().await.take();
        if let Some(pool) = pool {
            pool.close().await;
            info!("Database connection closed");
        }
    }
}

async fn create_schema(pool: &SqlitePool) -> StoreResult<()> {
    sqlx::query(CREATE_TABLE).execute(pool).await?;
    debug!("Database table ready");
    Ok(())
}

/// Convert listing rows, leaving out the ones that cannot be read so a
/// single damaged legacy row does not hide all the others.
fn into_records(rows: Vec<AudioRow>) -> Vec<AudioRecord> {
    rows.into_iter()
        .filter_map(|row| match AudioRecord::try_from(row) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!("Skipping unreadable audio row: {}", err);
                None
            }
        })
        .collect()
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// `[local midnight of day, local midnight of the next day)` as UTC instants.
fn local_day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_midnight(day);
    let end = day
        .succ_opt()
        .map(local_midnight)
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    (start, end)
}

fn local_midnight(day: NaiveDate) -> DateTime<Utc> {
    let midnight = day.and_time(NaiveTime::MIN);
    first_valid_instant(midnight, |local| {
        Local
            .from_local_datetime(local)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    })
    .unwrap_or_else(|| midnight.and_utc())
}

/// The first local time at or after `start` that exists, resolved to UTC.
///
/// Where the clocks jump forward over midnight the day begins at the end of
/// the gap, so this walks forward a minute at a time for at most a day.
fn first_valid_instant<F>(start: NaiveDateTime, resolve: F) -> Option<DateTime<Utc>>
where
    F: Fn(&NaiveDateTime) -> Option<DateTime<Utc>>,
{
    (0..=24 * 60)
        .map(|minutes| start + TimeDelta::minutes(minutes))
        .find_map(|local| resolve(&local))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    /// File-backed store in a fresh temp dir; keep the guard alive.
    pub(crate) fn temp_store() -> (MetadataStore, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("meta/audio.db").display());
        (MetadataStore::open(&url).unwrap(), dir)
    }

    pub(crate) fn record(id: &str, owner: Owner, uploaded_at: DateTime<Utc>) -> AudioRecord {
        AudioRecord {
            id: id.to_string(),
            original_name: format!("{id}.mp3"),
            filename: format!("{id}-1700000000000.mp3"),
            path: format!("uploads/{id}-1700000000000.mp3"),
            size: 1024,
            mimetype: Some("audio/mpeg".into()),
            uploaded_at,
            duration: None,
            format: ".mp3".into(),
            owner,
        }
    }

    fn noon(day: NaiveDate) -> DateTime<Utc> {
        local_midnight(day) + Duration::hours(12)
    }

    fn ids(records: &[AudioRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let (store, _guard) = temp_store();
        let inserted = store
            .insert(record("a1", Owner::new("Jo", "Doe"), Utc::now()))
            .await
            .unwrap();

        let fetched = store.get_by_id("a1").await.unwrap();
        assert_eq!(fetched, Some(inserted));
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let (store, _guard) = temp_store();
        assert_eq!(store.get_by_id("nope").await.unwrap(), None);
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let (store, _guard) = temp_store();
        store
            .insert(record("dup", Owner::default(), Utc::now()))
            .await
            .unwrap();

        let err = store
            .insert(record("dup", Owner::default(), Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(id) if id == "dup"));
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_all_is_newest_first() {
        let (store, _guard) = temp_store();
        let base = Utc::now() - Duration::days(3);
        for (i, offset) in [5, 1, 9, 3].into_iter().enumerate() {
            store
                .insert(record(
                    &format!("r{i}"),
                    Owner::default(),
                    base + Duration::minutes(offset),
                ))
                .await
                .unwrap();
        }

        let all = store.list_all().await.unwrap();
        assert_eq!(ids(&all), vec!["r2", "r0", "r3", "r1"]);
        assert!(all.windows(2).all(|w| w[0].uploaded_at >= w[1].uploaded_at));
    }

    #[tokio::test]
    async fn delete_removes_and_second_delete_is_not_found() {
        let (store, _guard) = temp_store();
        let inserted = store
            .insert(record("gone", Owner::new("Ann", "Lee"), Utc::now()))
            .await
            .unwrap();
        store
            .insert(record("kept", Owner::new("Ann", "Lee"), Utc::now()))
            .await
            .unwrap();

        let deleted = store.delete("gone").await.unwrap();
        assert_eq!(deleted, inserted);
        assert_eq!(store.get_by_id("gone").await.unwrap(), None);
        assert_eq!(ids(&store.list_all().await.unwrap()), vec!["kept"]);

        let err = store.delete("gone").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "gone"));
    }

    #[tokio::test]
    async fn racing_deletes_succeed_once() {
        let (store, _guard) = temp_store();
        store
            .insert(record("race", Owner::default(), Utc::now()))
            .await
            .unwrap();

        let (a, b) = tokio::join!(store.delete("race"), store.delete("race"));
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    }

    #[tokio::test]
    async fn list_by_owner_matches_exactly() {
        let (store, _guard) = temp_store();
        let base = Utc::now() - Duration::hours(5);
        store
            .insert(record("old", Owner::new("Ann", "Lee"), base))
            .await
            .unwrap();
        store
            .insert(record("new", Owner::new("Ann", "Lee"), base + Duration::hours(1)))
            .await
            .unwrap();
        store
            .insert(record("lower", Owner::new("ann", "lee"), base))
            .await
            .unwrap();
        store
            .insert(record("other", Owner::new("Ann", "Leeds"), base))
            .await
            .unwrap();
        store
            .insert(record("anon", Owner::default(), base))
            .await
            .unwrap();

        let ann = store.list_by_owner("Ann", "Lee").await.unwrap();
        assert_eq!(ids(&ann), vec!["new", "old"]);

        let anon = store.list_by_owner("", "").await.unwrap();
        assert_eq!(ids(&anon), vec!["anon"]);

        assert!(store.list_by_owner("Bob", "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn statistics_count_today_and_total() {
        let (store, _guard) = temp_store();
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let yesterday = today.pred_opt().unwrap();

        for i in 0..3 {
            store
                .insert(record(
                    &format!("t{i}"),
                    Owner::new("Ann", "Lee"),
                    noon(today) + Duration::minutes(i),
                ))
                .await
                .unwrap();
        }
        for i in 0..2 {
            store
                .insert(record(
                    &format!("y{i}"),
                    Owner::new("Ann", "Lee"),
                    noon(yesterday) + Duration::minutes(i),
                ))
                .await
                .unwrap();
        }
        store
            .insert(record("a1", Owner::new("Jo", "Doe"), noon(today)))
            .await
            .unwrap();
        store
            .insert(record("a2", Owner::new("Jo", "Doe"), noon(yesterday)))
            .await
            .unwrap();
        store
            .insert(record("nobody", Owner::default(), noon(today)))
            .await
            .unwrap();
        store
            .insert(record("half", Owner::new("", "Solo"), noon(today)))
            .await
            .unwrap();

        let stats = store.user_statistics_for_day(today).await.unwrap();
        assert_eq!(
            stats,
            vec![
                UserStatistics {
                    name: "".into(),
                    surname: "Solo".into(),
                    total_count: 1,
                    today_count: 1,
                },
                UserStatistics {
                    name: "Ann".into(),
                    surname: "Lee".into(),
                    total_count: 5,
                    today_count: 3,
                },
                UserStatistics {
                    name: "Jo".into(),
                    surname: "Doe".into(),
                    total_count: 2,
                    today_count: 1,
                },
            ]
        );
    }

    #[tokio::test]
    async fn statistics_day_boundaries_are_local_midnights() {
        let (store, _guard) = temp_store();
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let (start, end) = local_day_bounds(day);

        store
            .insert(record("first", Owner::new("Jo", "Doe"), start))
            .await
            .unwrap();
        store
            .insert(record(
                "last",
                Owner::new("Jo", "Doe"),
                end - Duration::milliseconds(1),
            ))
            .await
            .unwrap();
        store
            .insert(record("next", Owner::new("Jo", "Doe"), end))
            .await
            .unwrap();

        let stats = store.user_statistics_for_day(day).await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total_count, 3);
        assert_eq!(stats[0].today_count, 2);
    }

    #[tokio::test]
    async fn statistics_use_current_day() {
        let (store, _guard) = temp_store();
        store
            .insert(record("now", Owner::new("Jo", "Doe"), Utc::now()))
            .await
            .unwrap();
        store
            .insert(record(
                "week",
                Owner::new("Jo", "Doe"),
                Utc::now() - Duration::days(7),
            ))
            .await
            .unwrap();

        let stats = store.user_statistics().await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total_count, 2);
        assert_eq!(stats[0].today_count, 1);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_store_reconnects() {
        let (store, _guard) = temp_store();
        store
            .insert(record("keep", Owner::default(), Utc::now()))
            .await
            .unwrap();

        store.close().await;
        store.close().await;

        assert!(store.get_by_id("keep").await.unwrap().is_some());
        store
            .insert(record("after", Owner::default(), Utc::now()))
            .await
            .unwrap();
        assert_eq!(store.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn clones_share_one_connection() {
        let (store, _guard) = temp_store();
        let other = store.clone();
        store
            .insert(record("shared", Owner::default(), Utc::now()))
            .await
            .unwrap();
        assert!(other.get_by_id("shared").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn injected_in_memory_pool_is_used() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = MetadataStore::with_pool(pool.clone()).await.unwrap();
        store
            .insert(record("mem", Owner::new("Jo", "Doe"), Utc::now()))
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audio_files")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn omitted_optional_columns_read_as_defaults() {
        let (store, _guard) = temp_store();
        let pool = store.pool().await.unwrap();
        sqlx::query(
            "INSERT INTO audio_files (id, original_name, filename, file_path, size, uploaded_at)
             VALUES ('legacy', 'a.wav', 'a.wav', 'uploads/a.wav', 10, '2024-01-01T00:00:00.000Z')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let rec = store.get_by_id("legacy").await.unwrap().unwrap();
        assert_eq!(rec.owner, Owner::default());
        assert_eq!(rec.format, "");
        assert_eq!(rec.mimetype, None);
    }

    #[tokio::test]
    async fn unreadable_rows_are_left_out_of_listings() {
        let (store, _guard) = temp_store();
        store
            .insert(record("good", Owner::new("Jo", "Doe"), Utc::now()))
            .await
            .unwrap();
        let pool = store.pool().await.unwrap();
        sqlx::query(
            "INSERT INTO audio_files
                (id, original_name, filename, file_path, size, uploaded_at, owner_name, owner_surname)
             VALUES
                ('negative', 'n.wav', 'n.wav', 'uploads/n.wav', -5, '2024-01-01T00:00:00.000Z', 'Jo', 'Doe'),
                ('undated', 'u.wav', 'u.wav', 'uploads/u.wav', 5, 'yesterday', 'Jo', 'Doe')",
        )
        .execute(&pool)
        .await
        .unwrap();

        assert_eq!(ids(&store.list_all().await.unwrap()), vec!["good"]);
        assert_eq!(
            ids(&store.list_by_owner("Jo", "Doe").await.unwrap()),
            vec!["good"]
        );
        // a direct lookup still reports the damage
        assert!(matches!(
            store.get_by_id("undated").await.unwrap_err(),
            StoreError::InvalidRecord(_)
        ));
        // statistics count rows, not parsed records
        let stats = store.user_statistics().await.unwrap();
        assert_eq!(stats[0].total_count, 3);
    }

    #[test]
    fn day_starts_after_a_midnight_gap() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let midnight = day.and_time(NaiveTime::MIN);
        let gap_end = midnight + Duration::hours(1);
        // UTC-3 until local midnight, when clocks jump to 01:00 at UTC-2
        let zone = |local: &NaiveDateTime| {
            if *local < midnight {
                Some((*local + Duration::hours(3)).and_utc())
            } else if *local < gap_end {
                None
            } else {
                Some((*local + Duration::hours(2)).and_utc())
            }
        };

        let start = first_valid_instant(midnight, zone).unwrap();
        assert_eq!(start, (midnight + Duration::hours(3)).and_utc());

        // no gap: midnight itself
        let plain = first_valid_instant(midnight, |local| Some(local.and_utc())).unwrap();
        assert_eq!(plain, midnight.and_utc());
    }
}
