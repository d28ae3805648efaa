//! Error kinds for a normalization run.
//!
//! Configuration errors are fatal and checked once before discovery; document
//! errors are scoped to one file and never abort the batch.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal problems detected before any document is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("anchor directory not found at {0}")]
    AnchorMissing(PathBuf),

    #[error("base directory not found at {0}")]
    BaseMissing(PathBuf),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("load config {path}: {message}")]
    Load { path: PathBuf, message: String },
}

/// Per-document failure; the document ends in the `FAILED` state.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path} is not valid UTF-8")]
    Decode { path: PathBuf },

    #[error("backup {path}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DocumentError {
    pub fn path(&self) -> &PathBuf {
        match self {
            DocumentError::Read { path, .. }
            | DocumentError::Decode { path }
            | DocumentError::Backup { path, .. }
            | DocumentError::Write { path, .. } => path,
        }
    }
}

/// Why a run stopped before completing normally.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Writing the report or reading the confirmation failed.
    #[error("console I/O: {0}")]
    Console(#[from] io::Error),
}
