//! The loaded configuration file.
//!
//! A [`FileStore`] is immutable once loaded: reloading builds a new store and
//! the reader swaps it in. Two views are exposed over the same document:
//! [`FileStore::lookup`] interpolates placeholders, while
//! [`FileStore::lookup_raw`] and [`FileStore::section_keys`] do not, so a whole
//! section can be enumerated without resolving any value first.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    time::SystemTime,
};

use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    ini::IniDocument,
    interpolate::interpolate,
};

#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    modified: SystemTime,
    document: IniDocument,
}

impl FileStore {
    /// Read and parse `path`, recording its modification time.
    ///
    /// The timestamp is taken before the content is read, so a write racing
    /// with the load is picked up by the next reload check.
    pub fn load(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), "config file does not exist");
            }
            Error::from_io(path, e)
        })?;
        let modified = metadata.modified().map_err(|e| Error::from_io(path, e))?;
        let text = std::fs::read_to_string(path).map_err(|e| Error::from_io(path, e))?;
        let document = IniDocument::parse(&text, path)?;

        debug!(
            path = %path.display(),
            sections = document.section_names().count(),
            "config file loaded"
        );

        Ok(Self {
            path: path.to_path_buf(),
            modified,
            document,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Modification time of the file when it was loaded.
    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    pub fn document(&self) -> &IniDocument {
        &self.document
    }

    pub fn sections(&self) -> Vec<String> {
        self.document.section_names().map(str::to_string).collect()
    }

    #[must_use]
    pub fn has_section(&self, section: &str) -> bool {
        self.document.has_section(section)
    }

    /// Interpolated value of `key`. `None` when the key has no value.
    pub fn lookup(&self, section: &str, key: &str) -> Result<Option<String>> {
        let Some(raw) = self.document.raw_value(section, key)? else {
            return Ok(None);
        };
        interpolate(&self.document, section, raw)
            .map(Some)
            .map_err(|reason| Error::Interpolation {
                section: section.to_string(),
                key: key.to_lowercase(),
                reason,
            })
    }

    /// Value of `key` as written in the file.
    pub fn lookup_raw(&self, section: &str, key: &str) -> Result<Option<&str>> {
        self.document.raw_value(section, key)
    }

    /// Every key of `section` (own and inherited from `[DEFAULT]`), uninterpolated.
    pub fn section_keys(&self, section: &str) -> Result<BTreeSet<String>> {
        self.document.keys(section)
    }
}
