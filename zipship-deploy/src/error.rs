//! Error types for zipship-deploy.

use std::path::PathBuf;

use thiserror::Error;

use zipship_core::error::MetadataError;

/// All errors that can arise while synchronising a deploy folder.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The archive could not be opened as a zip, or lacks its metadata entry.
    #[error("cannot read archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// The archive's embedded metadata record is unusable.
    #[error("invalid metadata in {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: MetadataError,
    },

    /// `deploy.folder` is not a plain relative directory name.
    #[error("refusing to deploy into {folder:?}: the folder must be a relative path inside the base directory")]
    InvalidFolder { folder: String },

    /// Extraction into the staging directory failed. Nothing was swapped in.
    #[error("failed to extract {archive} into {folder}: {source}")]
    ExtractFailed {
        archive: PathBuf,
        folder: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DeployError {
    /// Process exit status for any deploy failure.
    pub fn exit_code(&self) -> u8 {
        6
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DeployError {
    DeployError::Io {
        path: path.into(),
        source,
    }
}
