//! Metadata repository contract and an in-memory implementation.

use parking_lot::RwLock;
use thiserror::Error;

use crate::artifact::models::ArtifactRecord;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("artifact already recorded: {0}")]
    AlreadyExists(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Storage for [`ArtifactRecord`]s.
///
/// Pages are 1-based. Ordering is newest upload first, ties broken by
/// insertion order (later first), and is stable while no records are added.
pub trait ArtifactRepository: Send + Sync {
    fn retrieve_list(&self, page: u64) -> Result<Vec<ArtifactRecord>, RepositoryError>;

    /// Append one record. Records are immutable once created.
    fn create(&self, record: &ArtifactRecord) -> Result<(), RepositoryError>;

    fn count(&self) -> Result<usize, RepositoryError>;
}

pub fn clamp_page_size(page_size: usize) -> usize {
    page_size.clamp(1, MAX_PAGE_SIZE)
}

/// Number of records preceding `page`.
pub fn page_offset(page: u64, page_size: usize) -> u64 {
    page.max(1)
        .saturating_sub(1)
        .saturating_mul(page_size as u64)
}

/// Repository held entirely in memory. Contents are lost on restart.
#[derive(Debug)]
pub struct InMemoryArtifactRepository {
    records: RwLock<Vec<ArtifactRecord>>,
    page_size: usize,
}

impl InMemoryArtifactRepository {
    pub fn new(page_size: usize) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            page_size: clamp_page_size(page_size),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

impl Default for InMemoryArtifactRepository {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl ArtifactRepository for InMemoryArtifactRepository {
    fn retrieve_list(&self, page: u64) -> Result<Vec<ArtifactRecord>, RepositoryError> {
        let records = self.records.read();
        let offset = usize::try_from(page_offset(page, self.page_size)).unwrap_or(usize::MAX);
        if offset >= records.len() {
            return Ok(Vec::new());
        }

        let mut ordered: Vec<(usize, &ArtifactRecord)> = records.iter().enumerate().collect();
        ordered.sort_by(|(ia, a), (ib, b)| {
            b.upload_date_time
                .cmp(&a.upload_date_time)
                .then(ib.cmp(ia))
        });

        Ok(ordered
            .into_iter()
            .skip(offset)
            .take(self.page_size)
            .map(|(_, r)| r.clone())
            .collect())
    }

    fn create(&self, record: &ArtifactRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write();
        if records.iter().any(|r| r.url == record.url) {
            return Err(RepositoryError::AlreadyExists(record.url.clone()));
        }
        records.push(record.clone());
        Ok(())
    }

    fn count(&self) -> Result<usize, RepositoryError> {
        Ok(self.records.read().len())
    }
}
