use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upload payload as posted to `POST /artifact`.
///
/// Field names follow the wire format (`File`, `Type`). Missing fields
/// default to empty strings and fail later during decoding.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtifactInput {
    /// Base64 (standard alphabet, padded) encoded image bytes.
    #[serde(rename = "File", alias = "file", default)]
    pub file: String,
    /// Client-declared type. Informational only; JPEG is the only accepted format.
    #[serde(rename = "Type", alias = "type", default)]
    pub declared_type: String,
}

impl ArtifactInput {
    pub fn new(file: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            declared_type: declared_type.into(),
        }
    }
}

/// Persisted metadata for one stored image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRecord {
    /// Access path, always `/image?source=<file name>`.
    pub url: String,
    /// File extension including the leading dot (`.jpeg`).
    pub file_type: String,
    pub upload_date_time: DateTime<Utc>,
}

/// Result of a successful ingest: the file is on disk, nothing is recorded yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedArtifact {
    pub url: String,
    pub file_type: String,
    pub file_name: String,
    pub ingested_at: DateTime<Utc>,
}

impl IngestedArtifact {
    pub fn to_record(&self) -> ArtifactRecord {
        ArtifactRecord {
            url: self.url.clone(),
            file_type: self.file_type.clone(),
            upload_date_time: self.ingested_at,
        }
    }
}
