use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("config file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("no section: '{0}'")]
    NoSuchSection(String),

    #[error("no option '{key}' in section '{section}'")]
    NoSuchKey { section: String, key: String },

    #[error("bad interpolation in [{section}] {key}: {reason}")]
    Interpolation {
        section: String,
        key: String,
        reason: String,
    },

    #[error("malformed literal {raw:?}: {reason}")]
    MalformedLiteral { raw: String, reason: String },

    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("config reader not initialized")]
    NotInitialized,
}

impl Error {
    #[must_use]
    pub fn malformed(raw: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedLiteral {
            raw: raw.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn no_such_key(section: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NoSuchKey {
            section: section.into(),
            key: key.into(),
        }
    }

    /// Map an I/O failure on `path` to [`Error::FileNotFound`] when the file is
    /// missing, [`Error::Io`] otherwise.
    #[must_use]
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound { path }
        } else {
            Self::Io { path, source }
        }
    }

    /// `true` for lookup misses (`NoSuchSection` / `NoSuchKey`).
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NoSuchSection(_) | Self::NoSuchKey { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
