//! zipship core library — project descriptor, fingerprint, metadata codec.
//!
//! Public API surface:
//! - [`project`] — `pyproject.toml` loading and derived locations
//! - [`fingerprint`] — CRC-32 fingerprint of a dependency manifest
//! - [`metadata`] — the INI-style build record and its codec
//! - [`keys`] — entry names and metadata keys shared with the script template
//! - [`report`] — the injected [`Reporter`] capability
//! - [`error`] — [`ProjectError`], [`MetadataError`]

pub mod error;
pub mod fingerprint;
pub mod keys;
pub mod metadata;
pub mod project;
pub mod report;
pub mod types;

pub use error::{MetadataError, ProjectError};
pub use fingerprint::Fingerprint;
pub use metadata::{
    BuildInfo, BuildMetadata, DeployInfo, IniDocument, ProjectInfo, PythonInfo, SourceMetadata,
};
pub use project::Project;
pub use report::{Level, NullReporter, RecordingReporter, Reporter, TracingReporter};
pub use types::{ProjectName, ToolSettings};
