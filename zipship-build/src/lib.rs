//! zipship-build — dependency and source-tree archive construction.
//!
//! Entry points:
//! - [`ArchiveBuilder::build`] — checksum-gated dependency archive
//! - [`ArchiveBuilder::compile_tree`] — bytecode archive of the project's own package
//! - [`archive::read_metadata_document`] — read back an archive's record
//!
//! External tools are reached through the [`Resolver`] and [`Precompiler`]
//! capabilities; [`UvResolver`] and [`PythonPrecompiler`] spawn the real ones.

pub mod archive;
pub mod builder;
pub mod compile;
pub mod error;
pub mod lock;
pub mod staleness;
pub mod toolchain;

pub use builder::{default_archive_name, ArchiveBuilder, BuildOptions, BuildOutcome};
pub use compile::{default_source_archive_name, CompileOptions, SourceArchive};
pub use error::BuildError;
pub use lock::{LockError, OutputLock};
pub use staleness::ArchiveState;
pub use toolchain::{BytecodeLayout, Precompiler, PythonPrecompiler, Resolver, UvResolver};
