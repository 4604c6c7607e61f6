//! Error types for zipship-build.

use std::path::PathBuf;

use thiserror::Error;

use zipship_core::error::{MetadataError, ProjectError};
use zipship_renderer::RenderError;

use crate::lock::LockError;

/// All errors that can arise while building an archive.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The project descriptor or one of its derived locations was unusable.
    #[error(transparent)]
    Project(#[from] ProjectError),

    /// The entry-point script failed to render.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// The output path is held by another builder, or the lock could not be taken.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// The dependency resolver could not be run or exited non-zero.
    #[error("dependency resolution failed ({command}): {reason}")]
    ResolutionFailed { command: String, reason: String },

    /// Bytecode precompilation could not be run or exited non-zero.
    #[error("bytecode precompilation of {dir} failed: {reason}")]
    PrecompileFailed { dir: PathBuf, reason: String },

    /// An error while assembling a new archive. The partial artifact has been removed.
    #[error("failed to build {archive}: {source}")]
    PartialBuild {
        archive: PathBuf,
        #[source]
        source: Box<BuildError>,
    },

    /// An existing archive carried an unreadable metadata record.
    #[error("invalid metadata in {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: MetadataError,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The zip container could not be read or written.
    #[error("zip error at {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

impl BuildError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            BuildError::ResolutionFailed { .. } => 3,
            BuildError::Lock(LockError::Contention { .. } | LockError::ContentionUnknown { .. }) => 4,
            BuildError::PartialBuild { .. } => 5,
            BuildError::PrecompileFailed { .. } => 99,
            _ => 1,
        }
    }
}

/// Convenience constructor for [`BuildError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> BuildError {
    BuildError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn zip_err(path: impl Into<PathBuf>, source: zip::result::ZipError) -> BuildError {
    BuildError::Zip {
        path: path.into(),
        source,
    }
}
