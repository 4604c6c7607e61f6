//! Error types for zipship-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading a project descriptor.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// Underlying I/O failure, annotated with the path being read.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parse error on load — includes file path and line context from toml.
    #[error("failed to parse project descriptor at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Neither the given path nor its directory contained a `pyproject.toml`.
    #[error("project descriptor not found at {path}")]
    DescriptorNotFound { path: PathBuf },

    /// A required `[project]` field was absent.
    #[error("project descriptor {path} is missing required field `{field}`")]
    MissingField { path: PathBuf, field: &'static str },

    /// No `site-packages` directory exists inside the project's virtual environment.
    #[error("no site-packages directory found in virtual environment {path}")]
    VirtualEnvNotFound { path: PathBuf },

    /// No package source directory could be located for the project.
    #[error("could not find source directory for project '{name}' under {root}")]
    SourceDirNotFound { name: String, root: PathBuf },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ProjectError {
    ProjectError::Io {
        path: path.into(),
        source,
    }
}

/// Errors from decoding an embedded metadata record.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The metadata bytes were not valid UTF-8 text.
    #[error("metadata is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// A required section was absent.
    #[error("malformed metadata: missing section [{section}]")]
    MissingSection { section: String },

    /// A required key was absent from a present section.
    #[error("malformed metadata: missing key `{key}` in section [{section}]")]
    MissingKey { section: String, key: String },

    /// A line could not be parsed as a section header, comment or key/value pair.
    #[error("malformed metadata at line {line}: {content:?}")]
    Syntax { line: usize, content: String },
}

impl MetadataError {
    /// `true` for the structural failures grouped as "malformed metadata".
    pub fn is_malformed(&self) -> bool {
        !matches!(self, MetadataError::Encoding(_))
    }
}
