//! Artifact Service
//!
//! Orchestrates ingestion (decode → validate → write → record) and listing.
//! Holds no state of its own beyond its collaborators; every call is
//! processed end to end and independently of any other.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::artifact::clock::{Clock, SystemClock};
use crate::artifact::codec::{self, JPEG_EXTENSION};
use crate::artifact::error::{ImageAccessError, IngestError};
use crate::artifact::fs::{FileSystem, FileWriter};
use crate::artifact::models::{ArtifactInput, ArtifactRecord, IngestedArtifact};
use crate::artifact::naming;
use crate::artifact::repository::{ArtifactRepository, RepositoryError};

/// Directory, relative to the filesystem root, that holds stored images.
pub const DEFAULT_STORAGE_PREFIX: &str = "containerFiles/artifacts";

/// Permission bits for stored images.
pub const FILE_MODE: u32 = 0o644;

/// How many suffixed names to try when the timestamp name is taken.
const MAX_NAME_ATTEMPTS: u32 = 16;

pub struct ArtifactService {
    fs: Arc<dyn FileSystem>,
    repository: Arc<dyn ArtifactRepository>,
    clock: Arc<dyn Clock>,
    storage_prefix: PathBuf,
}

impl ArtifactService {
    pub fn new(fs: Arc<dyn FileSystem>, repository: Arc<dyn ArtifactRepository>) -> Self {
        Self {
            fs,
            repository,
            clock: Arc::new(SystemClock),
            storage_prefix: PathBuf::from(DEFAULT_STORAGE_PREFIX),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_storage_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.storage_prefix = prefix.into();
        self
    }

    pub fn storage_prefix(&self) -> &Path {
        &self.storage_prefix
    }

    fn stored_path(&self, file_name: &str) -> PathBuf {
        self.storage_prefix.join(file_name)
    }

    /// Decode, validate and store one image. Nothing is recorded.
    ///
    /// On any error no file is left behind.
    pub fn ingest(&self, input: &ArtifactInput) -> Result<IngestedArtifact, IngestError> {
        let bytes = codec::decode_base64(&input.file)?;
        let image = codec::decode_jpeg(&bytes)?;

        let ingested_at = self.clock.now();
        let (file_name, mut writer) = self.create_file(ingested_at)?;

        let written = codec::encode_jpeg(&image, &mut writer)
            .map_err(IngestError::from_encode)
            .and_then(|()| writer.flush().map_err(IngestError::Storage));
        drop(writer);

        if let Err(err) = written {
            self.discard(&file_name);
            return Err(err);
        }

        debug!(
            file = %file_name,
            declared_type = %input.declared_type,
            width = image.width(),
            height = image.height(),
            "Saved artifact to filesystem"
        );

        Ok(IngestedArtifact {
            url: naming::access_url(&file_name),
            file_type: JPEG_EXTENSION.to_string(),
            file_name,
            ingested_at,
        })
    }

    /// Open the first free name for `at`, stepping through suffixes on collision.
    fn create_file(
        &self,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(String, FileWriter), IngestError> {
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let file_name = naming::file_name(at, JPEG_EXTENSION, attempt);
            match self.fs.create_new(&self.stored_path(&file_name), FILE_MODE) {
                Ok(writer) => return Ok((file_name, writer)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(file = %file_name, "File name taken, trying next suffix");
                }
                Err(e) => return Err(IngestError::Storage(e)),
            }
        }

        Err(IngestError::Storage(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free file name after {MAX_NAME_ATTEMPTS} attempts"),
        )))
    }

    fn discard(&self, file_name: &str) {
        if let Err(e) = self.fs.remove(&self.stored_path(file_name)) {
            warn!(file = %file_name, error = %e, "Failed to remove partial artifact");
        }
    }

    /// Persist a record produced from a successful [`ingest`](Self::ingest).
    pub fn record(&self, entry: &ArtifactRecord) -> Result<(), RepositoryError> {
        self.repository.create(entry)
    }

    /// Ingest then record. If the repository rejects the record the stored
    /// file is removed again.
    pub fn upload(&self, input: &ArtifactInput) -> Result<ArtifactRecord, IngestError> {
        let ingested = self.ingest(input)?;
        let record = ingested.to_record();

        if let Err(err) = self.record(&record) {
            self.discard(&ingested.file_name);
            return Err(err.into());
        }

        info!(url = %record.url, "Artifact stored");
        Ok(record)
    }

    /// One page of records. Pages below 1 are treated as page 1.
    pub fn list(&self, page: i64) -> Result<Vec<ArtifactRecord>, RepositoryError> {
        let page = u64::try_from(page).unwrap_or(0).max(1);
        self.repository.retrieve_list(page)
    }

    /// Bytes of a stored image, by the file name from its access URL.
    pub fn open(&self, source: &str) -> Result<Vec<u8>, ImageAccessError> {
        if !naming::is_valid_source(source) {
            return Err(ImageAccessError::InvalidSource(source.to_string()));
        }

        self.fs
            .read(&self.stored_path(source))
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => ImageAccessError::NotFound(source.to_string()),
                _ => ImageAccessError::Storage(e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::clock::FixedClock;
    use crate::artifact::fs::MemFs;
    use crate::artifact::repository::InMemoryArtifactRepository;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use chrono::{TimeZone, Utc};
    use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

    fn jpeg_payload(width: u32, height: u32) -> String {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([12, 140, 220])));
        let mut out = Vec::new();
        codec::encode_jpeg(&img, &mut out).unwrap();
        BASE64.encode(out)
    }

    struct Harness {
        fs: MemFs,
        repo: Arc<InMemoryArtifactRepository>,
        clock: Arc<FixedClock>,
        service: ArtifactService,
    }

    fn harness() -> Harness {
        let fs = MemFs::new();
        let repo = Arc::new(InMemoryArtifactRepository::new(20));
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap(),
        ));
        let service = ArtifactService::new(Arc::new(fs.clone()), repo.clone())
            .with_clock(clock.clone());
        Harness {
            fs,
            repo,
            clock,
            service,
        }
    }

    #[test]
    fn test_ingest_writes_decodable_jpeg() {
        let h = harness();
        let ingested = h
            .service
            .ingest(&ArtifactInput::new(jpeg_payload(3, 2), "image/jpeg"))
            .unwrap();

        assert_eq!(ingested.file_name, "2024-02-29 23:59:59.000000000.jpeg");
        assert_eq!(ingested.url, "/image?source=2024-02-29 23:59:59.000000000.jpeg");
        assert_eq!(ingested.file_type, ".jpeg");

        let path = Path::new(DEFAULT_STORAGE_PREFIX).join(&ingested.file_name);
        assert_eq!(h.fs.mode(&path), Some(FILE_MODE));

        let stored = codec::decode_jpeg(&h.fs.read(&path).unwrap()).unwrap();
        assert_eq!(stored.dimensions(), (3, 2));
        let px = stored.to_rgb8().get_pixel(1, 1).0;
        for (got, want) in px.iter().zip([12u8, 140, 220]) {
            assert!((*got as i16 - want as i16).abs() <= 8);
        }

        // Ingest alone never records.
        assert_eq!(h.repo.count().unwrap(), 0);
    }

    #[test]
    fn test_invalid_base64_has_no_side_effects() {
        let h = harness();
        let err = h
            .service
            .upload(&ArtifactInput::new("%%%not-base64%%%", "image/jpeg"))
            .unwrap_err();

        assert!(matches!(err, IngestError::Decode(_)));
        assert!(h.fs.is_empty());
        assert_eq!(h.repo.count().unwrap(), 0);
    }

    #[test]
    fn test_non_image_has_no_side_effects() {
        let h = harness();
        let payload = BASE64.encode(b"plain text, not a picture");
        let err = h
            .service
            .upload(&ArtifactInput::new(payload, "image/jpeg"))
            .unwrap_err();

        assert!(matches!(err, IngestError::ImageFormat(_)));
        assert!(h.fs.is_empty());
        assert_eq!(h.repo.count().unwrap(), 0);
    }

    #[test]
    fn test_upload_records_once() {
        let h = harness();
        let record = h
            .service
            .upload(&ArtifactInput::new(jpeg_payload(1, 1), ""))
            .unwrap();

        assert_eq!(record.file_type, ".jpeg");
        assert!(record.url.starts_with(naming::ACCESS_PATH));
        assert_eq!(record.upload_date_time, h.clock.now());
        assert_eq!(h.service.list(1).unwrap(), vec![record]);
    }

    #[test]
    fn test_same_timestamp_gets_distinct_names() {
        let h = harness();
        let first = h
            .service
            .upload(&ArtifactInput::new(jpeg_payload(1, 1), ""))
            .unwrap();
        let second = h
            .service
            .upload(&ArtifactInput::new(jpeg_payload(1, 1), ""))
            .unwrap();

        assert_ne!(first.url, second.url);
        assert!(second.url.ends_with("23:59:59.000000000-1.jpeg"));
        assert_eq!(h.fs.len(), 2);
        assert_eq!(h.repo.count().unwrap(), 2);
    }

    #[test]
    fn test_sequential_uploads_distinct_urls() {
        let h = harness();
        let first = h
            .service
            .upload(&ArtifactInput::new(jpeg_payload(1, 1), ""))
            .unwrap();
        h.clock.advance(chrono::Duration::nanoseconds(1));
        let second = h
            .service
            .upload(&ArtifactInput::new(jpeg_payload(1, 1), ""))
            .unwrap();

        assert_ne!(first.url, second.url);
        assert!(second.url.ends_with("23:59:59.000000001.jpeg"));
    }

    #[test]
    fn test_list_normalizes_page() {
        let h = harness();
        for _ in 0..3 {
            h.service
                .upload(&ArtifactInput::new(jpeg_payload(1, 1), ""))
                .unwrap();
            h.clock.advance(chrono::Duration::milliseconds(1));
        }

        let first = h.service.list(1).unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(h.service.list(0).unwrap(), first);
        assert_eq!(h.service.list(-5).unwrap(), first);
        assert_eq!(h.service.list(i64::MIN).unwrap(), first);
        assert!(h.service.list(2).unwrap().is_empty());
    }

    #[test]
    fn test_list_orders_by_upload_time_not_arrival() {
        let h = harness();
        let later = h
            .service
            .upload(&ArtifactInput::new(jpeg_payload(1, 1), ""))
            .unwrap();

        // A second upload stamped earlier than the first.
        h.clock.set(Utc.with_ymd_and_hms(2024, 2, 28, 8, 0, 0).unwrap());
        let earlier = h
            .service
            .upload(&ArtifactInput::new(jpeg_payload(1, 1), ""))
            .unwrap();

        assert!(earlier.url.ends_with("2024-02-28 08:00:00.000000000.jpeg"));
        assert_eq!(h.service.list(1).unwrap(), vec![later, earlier]);
    }

    struct BrokenFs;

    impl FileSystem for BrokenFs {
        fn create_new(&self, _path: &Path, _mode: u32) -> io::Result<FileWriter> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only volume"))
        }

        fn read(&self, _path: &Path) -> io::Result<Vec<u8>> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only volume"))
        }

        fn remove(&self, _path: &Path) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_storage_failure_records_nothing() {
        let repo = Arc::new(InMemoryArtifactRepository::default());
        let service = ArtifactService::new(Arc::new(BrokenFs), repo.clone());

        let err = service
            .upload(&ArtifactInput::new(jpeg_payload(1, 1), ""))
            .unwrap_err();
        assert!(matches!(err, IngestError::Storage(_)));
        assert_eq!(repo.count().unwrap(), 0);

        let err = service.open("a.jpeg").unwrap_err();
        assert!(matches!(err, ImageAccessError::Storage(_)));
    }

    struct RejectingRepository;

    impl ArtifactRepository for RejectingRepository {
        fn retrieve_list(&self, _page: u64) -> Result<Vec<ArtifactRecord>, RepositoryError> {
            Ok(Vec::new())
        }

        fn create(&self, record: &ArtifactRecord) -> Result<(), RepositoryError> {
            Err(RepositoryError::AlreadyExists(record.url.clone()))
        }

        fn count(&self) -> Result<usize, RepositoryError> {
            Ok(0)
        }
    }

    #[test]
    fn test_rejected_record_removes_file() {
        let fs = MemFs::new();
        let service = ArtifactService::new(Arc::new(fs.clone()), Arc::new(RejectingRepository));

        let err = service
            .upload(&ArtifactInput::new(jpeg_payload(1, 1), ""))
            .unwrap_err();
        assert!(matches!(err, IngestError::Repository(_)));
        assert!(fs.is_empty());
    }

    #[test]
    fn test_open_round_trip_and_errors() {
        let h = harness();
        let ingested = h
            .service
            .ingest(&ArtifactInput::new(jpeg_payload(2, 2), ""))
            .unwrap();

        let bytes = h.service.open(&ingested.file_name).unwrap();
        assert!(codec::decode_jpeg(&bytes).is_ok());

        assert!(matches!(
            h.service.open("../mural_artifacts.db"),
            Err(ImageAccessError::InvalidSource(_))
        ));
        assert!(matches!(
            h.service.open(""),
            Err(ImageAccessError::InvalidSource(_))
        ));
        assert!(matches!(
            h.service.open("missing.jpeg"),
            Err(ImageAccessError::NotFound(_))
        ));
    }

    #[test]
    fn test_custom_storage_prefix() {
        let h = harness();
        let service = ArtifactService::new(Arc::new(h.fs.clone()), h.repo.clone())
            .with_clock(h.clock.clone())
            .with_storage_prefix("uploads");

        let ingested = service
            .ingest(&ArtifactInput::new(jpeg_payload(1, 1), ""))
            .unwrap();
        assert_eq!(
            h.fs.paths(),
            vec![Path::new("uploads").join(&ingested.file_name)]
        );
    }
}
