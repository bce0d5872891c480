//! Destination for generated documents.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use log::debug;

use crate::error::{Error, Result};

/// Accepts generated bytes and returns a URL they can be fetched from.
pub trait DocumentStore {
    fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<String>;
}

/// Stores documents as files below a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DocumentStore for DirectoryStore {
    fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<String> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || escapes {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("refusing to store outside the output directory: {path}"),
            )));
        }

        let target = self.root.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, bytes)?;
        debug!("stored {} bytes of {content_type} at {}", bytes.len(), target.display());

        let absolute = fs::canonicalize(&target)?;
        Ok(format!("file://{}", absolute.display()))
    }
}
