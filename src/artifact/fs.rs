//! Filesystem abstraction for stored images.
//!
//! The [`FileSystem`] trait is the only way the service touches storage.
//! [`OsFs`] writes below a root directory on disk; [`MemFs`] keeps everything
//! in a shared map and is what tests inject.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

/// Writable handle returned by [`FileSystem::create_new`].
pub type FileWriter = Box<dyn Write + Send>;

pub trait FileSystem: Send + Sync {
    /// Open `path` write-only, creating it with permission bits `mode`.
    ///
    /// Fails with [`io::ErrorKind::AlreadyExists`] if the path is taken.
    /// Missing parent directories are created.
    fn create_new(&self, path: &Path, mode: u32) -> io::Result<FileWriter>;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// Local disk, relative paths resolved against `root`.
#[derive(Debug, Clone)]
pub struct OsFs {
    root: PathBuf,
}

impl OsFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl FileSystem for OsFs {
    fn create_new(&self, path: &Path, mode: u32) -> io::Result<FileWriter> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = mode;

        let file = options.open(&full)?;
        debug!(path = %full.display(), "Created file");
        Ok(Box::new(BufWriter::new(file)))
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(self.resolve(path))
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(self.resolve(path))
    }
}

#[derive(Debug, Default)]
struct MemFile {
    data: Arc<Mutex<Vec<u8>>>,
    mode: u32,
}

/// In-memory filesystem. Clones share the same files.
#[derive(Debug, Clone, Default)]
pub struct MemFs {
    files: Arc<Mutex<HashMap<PathBuf, MemFile>>>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.files.lock().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }

    /// Permission bits a file was created with.
    pub fn mode(&self, path: &Path) -> Option<u32> {
        self.files.lock().get(path).map(|f| f.mode)
    }
}

struct MemWriter {
    data: Arc<Mutex<Vec<u8>>>,
}

impl Write for MemWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    )
}

impl FileSystem for MemFs {
    fn create_new(&self, path: &Path, mode: u32) -> io::Result<FileWriter> {
        let mut files = self.files.lock();
        if files.contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            ));
        }

        let data = Arc::new(Mutex::new(Vec::new()));
        files.insert(
            path.to_path_buf(),
            MemFile {
                data: data.clone(),
                mode,
            },
        );
        Ok(Box::new(MemWriter { data }))
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .lock()
            .get(path)
            .map(|f| f.data.lock().clone())
            .ok_or_else(|| not_found(path))
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_fs_write_read_remove() {
        let fs = MemFs::new();
        let path = Path::new("containerFiles/artifacts/a.jpeg");

        let mut w = fs.create_new(path, 0o644).unwrap();
        w.write_all(b"hello").unwrap();
        w.flush().unwrap();
        drop(w);

        assert_eq!(fs.read(path).unwrap(), b"hello");
        assert_eq!(fs.mode(path), Some(0o644));
        assert_eq!(fs.paths(), vec![path.to_path_buf()]);

        fs.remove(path).unwrap();
        assert!(fs.is_empty());
        assert_eq!(fs.read(path).unwrap_err().kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_mem_fs_create_is_exclusive() {
        let fs = MemFs::new();
        let path = Path::new("a.jpeg");
        fs.create_new(path, 0o644).unwrap();

        let err = fs.create_new(path, 0o644).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_os_fs_creates_parents_and_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let fs = OsFs::new(dir.path());
        let path = Path::new("containerFiles/artifacts/b.jpeg");

        let mut w = fs.create_new(path, 0o644).unwrap();
        w.write_all(b"bytes").unwrap();
        w.flush().unwrap();
        drop(w);

        assert!(dir.path().join(path).exists());
        assert_eq!(fs.read(path).unwrap(), b"bytes");

        let err = fs.create_new(path, 0o644).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);

        fs.remove(path).unwrap();
        assert!(!dir.path().join(path).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_os_fs_applies_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let fs = OsFs::new(dir.path());
        let path = Path::new("c.jpeg");
        drop(fs.create_new(path, 0o600).unwrap());

        let mode = std::fs::metadata(dir.path().join(path))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
