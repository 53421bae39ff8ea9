//! SQLite Artifact Repository
//!
//! Durable, append-only storage for artifact metadata.
//! Records are inserted once and never updated.
//!
//! # Schema Design
//!
//! ```sql
//! CREATE TABLE artifacts (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     url TEXT NOT NULL UNIQUE,
//!     file_type TEXT NOT NULL,
//!     -- RFC 3339, fixed nanosecond width so text order is time order
//!     upload_date_time TEXT NOT NULL
//! );
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, types::Type, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::artifact::models::ArtifactRecord;
use crate::artifact::repository::{
    clamp_page_size, page_offset, ArtifactRepository, RepositoryError,
};

/// Schema version for migrations.
/// Version history:
/// - v1: Initial schema
const SCHEMA_VERSION: u32 = 1;

/// Artifact metadata stored in SQLite.
pub struct SqliteArtifactRepository {
    conn: Arc<Mutex<Connection>>,
    page_size: usize,
}

impl SqliteArtifactRepository {
    /// Open (or create) the database at `path`.
    pub fn new<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self, RepositoryError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn, page_size)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory(page_size: usize) -> Result<Self, RepositoryError> {
        Self::with_connection(Connection::open_in_memory()?, page_size)
    }

    fn with_connection(conn: Connection, page_size: usize) -> Result<Self, RepositoryError> {
        let repo = Self {
            conn: Arc::new(Mutex::new(conn)),
            page_size: clamp_page_size(page_size),
        };
        repo.initialize_schema()?;
        Ok(repo)
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    fn initialize_schema(&self) -> Result<(), RepositoryError> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        "#,
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
            [],
        )?;

        let current_version: Option<u32> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        match current_version {
            None => {
                Self::create_schema_v1(&conn)?;
                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?)",
                    [SCHEMA_VERSION],
                )?;
                info!("Created artifact repository schema v{}", SCHEMA_VERSION);
            }
            Some(v) if v == SCHEMA_VERSION => {
                debug!("Artifact repository schema at v{}", SCHEMA_VERSION);
            }
            Some(v) => {
                warn!(
                    "Artifact repository schema version mismatch: expected {}, got {}",
                    SCHEMA_VERSION, v
                );
            }
        }

        Ok(())
    }

    fn create_schema_v1(conn: &Connection) -> Result<(), RepositoryError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS artifacts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE,
                file_type TEXT NOT NULL,
                upload_date_time TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_artifacts_uploaded
                ON artifacts(upload_date_time DESC, id DESC);
        "#,
        )?;
        Ok(())
    }
}

fn encode_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|at| at.with_timezone(&Utc))
}

impl ArtifactRepository for SqliteArtifactRepository {
    fn retrieve_list(&self, page: u64) -> Result<Vec<ArtifactRecord>, RepositoryError> {
        let offset = i64::try_from(page_offset(page, self.page_size)).unwrap_or(i64::MAX);

        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT url, file_type, upload_date_time FROM artifacts
             ORDER BY upload_date_time DESC, id DESC
             LIMIT ? OFFSET ?",
        )?;

        let records = stmt
            .query_map(params![self.page_size as i64, offset], |row| {
                let raw: String = row.get(2)?;
                let upload_date_time = decode_timestamp(&raw).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
                })?;
                Ok(ArtifactRecord {
                    url: row.get(0)?,
                    file_type: row.get(1)?,
                    upload_date_time,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| match e {
                rusqlite::Error::FromSqlConversionFailure(_, _, inner) => {
                    RepositoryError::Corrupt(inner.to_string())
                }
                other => RepositoryError::Sqlite(other),
            })?;

        Ok(records)
    }

    fn create(&self, record: &ArtifactRecord) -> Result<(), RepositoryError> {
        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO artifacts (url, file_type, upload_date_time) VALUES (?1, ?2, ?3)",
            params![
                record.url,
                record.file_type,
                encode_timestamp(&record.upload_date_time),
            ],
        );

        match result {
            Ok(_) => {
                debug!("Recorded artifact: {}", record.url);
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(RepositoryError::AlreadyExists(record.url.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn count(&self) -> Result<usize, RepositoryError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM artifacts", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
