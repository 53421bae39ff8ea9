//! Server configuration from command-line flags and environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::artifact::repository::clamp_page_size;

/// Which metadata repository backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RepositoryKind {
    /// SQLite database file under the data directory.
    Sqlite,
    /// Process memory; records are lost on restart.
    Memory,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "mural")]
#[command(about = "Image upload service - stores JPEG artifacts and lists them newest first")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "MURAL_BIND", default_value = "0.0.0.0:8090")]
    pub bind: SocketAddr,

    /// Root directory for stored images and the database
    #[arg(long, env = "MURAL_DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Directory for images, relative to the data directory
    #[arg(long, env = "MURAL_STORAGE_PREFIX", default_value = "containerFiles/artifacts")]
    pub storage_prefix: PathBuf,

    /// Metadata repository backend
    #[arg(long, env = "MURAL_REPOSITORY", value_enum, default_value = "sqlite")]
    pub repository: RepositoryKind,

    /// SQLite database file (relative paths resolve against the data directory)
    #[arg(long, env = "MURAL_DB_PATH", default_value = "mural_artifacts.db")]
    pub db_path: PathBuf,

    /// Records per listing page (1-100)
    #[arg(long, env = "MURAL_PAGE_SIZE", default_value = "20")]
    pub page_size: usize,

    /// Largest accepted request body in bytes
    #[arg(long, env = "MURAL_MAX_UPLOAD_BYTES", default_value = "16777216")]
    pub max_upload_bytes: usize,

    /// Upload page served at `/` (relative paths resolve against the data directory)
    #[arg(long, env = "MURAL_INDEX_PAGE", default_value = "artifact.html")]
    pub index_page: PathBuf,
}

impl Config {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_path)
    }

    pub fn page_size(&self) -> usize {
        clamp_page_size(self.page_size)
    }

    /// Resolved index page, if the file exists.
    pub fn index_page(&self) -> Option<PathBuf> {
        let path = self.data_dir.join(&self.index_page);
        path.is_file().then_some(path)
    }
}
