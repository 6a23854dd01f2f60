//! Blob storage for uploaded registry files.
//!
//! Locations are relative keys of the form `<owner>/<file>`. The pipeline only
//! needs `download` and `open`; uploads go through `create` + `rename` so the
//! final name can be derived from the content hash.

use crate::error::{ImportError, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};

pub trait SourceStorage: Send + Sync {
    /// Fetch the whole object.
    fn download(&self, location: &str) -> Result<Vec<u8>>;

    /// Open the object for sequential reading.
    fn open(&self, location: &str) -> Result<Box<dyn Read + Send>>;

    /// Create (or truncate) an object for writing.
    fn create(&self, location: &str) -> Result<Box<dyn Write + Send>>;

    fn rename(&self, from: &str, to: &str) -> Result<()>;

    fn remove(&self, location: &str) -> Result<()>;
}

/// Check that `location` lives under the owner's prefix.
pub fn authorize_location(owner_id: &str, location: &str) -> Result<()> {
    let prefix = format!("{}/", owner_id);
    if location.starts_with(&prefix) && location.len() > prefix.len() {
        Ok(())
    } else {
        Err(ImportError::Forbidden(format!(
            "source {} is outside the caller's storage scope",
            location
        )))
    }
}

/// Filesystem storage rooted at a directory.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Resolve a location, refusing anything that could escape the root.
    fn path_for(&self, location: &str) -> Result<PathBuf> {
        let relative = Path::new(location);
        let safe = !location.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(ImportError::InvalidRequest(format!(
                "invalid storage location: {}",
                location
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl SourceStorage for LocalStorage {
    fn download(&self, location: &str) -> Result<Vec<u8>> {
        let path = self.path_for(location)?;
        Ok(fs::read(path)?)
    }

    fn open(&self, location: &str) -> Result<Box<dyn Read + Send>> {
        let path = self.path_for(location)?;
        Ok(Box::new(File::open(path)?))
    }

    fn create(&self, location: &str) -> Result<Box<dyn Write + Send>> {
        let path = self.path_for(location)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Box::new(BufWriter::new(File::create(path)?)))
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from = self.path_for(from)?;
        let to = self.path_for(to)?;
        fs::rename(from, to)?;
        Ok(())
    }

    fn remove(&self, location: &str) -> Result<()> {
        let path = self.path_for(location)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_rename_and_read_back() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf());

        {
            let mut w = storage.create("owner-1/upload.part").unwrap();
            w.write_all(b"Orgnr;Selskap\n").unwrap();
            w.flush().unwrap();
        }
        storage.rename("owner-1/upload.part", "owner-1/abc.csv").unwrap();

        assert_eq!(storage.download("owner-1/abc.csv").unwrap(), b"Orgnr;Selskap\n");
        let mut buf = String::new();
        storage.open("owner-1/abc.csv").unwrap().read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "Orgnr;Selskap\n");

        storage.remove("owner-1/abc.csv").unwrap();
        storage.remove("owner-1/abc.csv").unwrap();
        assert!(matches!(
            storage.download("owner-1/abc.csv"),
            Err(ImportError::SourceNotFound(_))
        ));
    }

    #[test]
    fn traversal_is_rejected() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf());
        assert!(matches!(
            storage.download("../etc/passwd"),
            Err(ImportError::InvalidRequest(_))
        ));
        assert!(matches!(
            storage.download("/etc/passwd"),
            Err(ImportError::InvalidRequest(_))
        ));
    }

    #[test]
    fn locations_are_scoped_by_owner() {
        assert!(authorize_location("o1", "o1/file.csv").is_ok());
        assert!(authorize_location("o1", "o2/file.csv").is_err());
        assert!(authorize_location("o1", "o1/").is_err());
        assert!(authorize_location("o1", "o10/file.csv").is_err());
    }
}
