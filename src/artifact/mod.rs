//! Artifact Ingestion
//!
//! Accepts base64 JPEG payloads, stores them under a timestamp-derived name
//! and records their metadata for paginated listing.
//!
//! # Pipeline
//!
//! ```text
//! ArtifactInput ──▶ decode base64 ──▶ decode JPEG ──▶ FileSystem (re-encoded, q=100)
//!                                                          │
//!                                                          ▼
//!                                   ArtifactRepository ◀── ArtifactRecord
//! ```
//!
//! Each collaborator sits behind a trait so tests can swap in
//! [`MemFs`], [`InMemoryArtifactRepository`] and [`FixedClock`].

pub mod clock;
pub mod codec;
pub mod error;
pub mod fs;
pub mod models;
pub mod naming;
pub mod repository;
pub mod service;
pub mod sqlite_store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ImageAccessError, IngestError};
pub use fs::{FileSystem, MemFs, OsFs};
pub use models::{ArtifactInput, ArtifactRecord, IngestedArtifact};
pub use repository::{
    ArtifactRepository, InMemoryArtifactRepository, RepositoryError, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};
pub use service::{ArtifactService, DEFAULT_STORAGE_PREFIX};
pub use sqlite_store::SqliteArtifactRepository;
