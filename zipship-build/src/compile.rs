//! Source-tree archive: the project's own package, shipped as bytecode.
//!
//! Unlike the dependency archive this is rebuilt on every run. `.py` sources
//! are compiled beside themselves (legacy layout) and only the resulting
//! `.pyc` files plus non-Python resources are packaged. The compiled files
//! are swept from the source tree afterwards, whether or not the build
//! succeeded.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use zipship_core::keys::{CACHE_DIR, METADATA_FILE};
use zipship_core::types::DEFAULT_SOURCE_OPTIMIZE;
use zipship_core::{BuildInfo, Project, SourceMetadata};

use crate::archive::{assemble, collect_files};
use crate::builder::{artifact_paths, ensure_parent, file_name, resolve_output, ArchiveBuilder};
use crate::error::{io_err, BuildError};
use crate::lock::OutputLock;
use crate::toolchain::BytecodeLayout;

/// Per-invocation overrides for [`ArchiveBuilder::compile_tree`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub output: Option<PathBuf>,
    pub optimize: Option<u8>,
}

/// A freshly written source archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceArchive {
    pub archive: PathBuf,
    pub files: usize,
}

/// `<name>.zip`
pub fn default_source_archive_name(project: &Project) -> String {
    format!("{}.zip", project.name)
}

impl ArchiveBuilder<'_> {
    /// Compile the project's package directory and archive the bytecode.
    pub fn compile_tree(&self, project: &Project, options: &CompileOptions) -> Result<SourceArchive, BuildError> {
        let output = resolve_output(
            project,
            options.output.as_deref(),
            default_source_archive_name(project),
        )?;
        let package_dir = project.package_dir()?;

        ensure_parent(&output)?;
        let _lock = OutputLock::acquire(&output, "zipship compile")?;

        let removed = remove_caches(&package_dir)?;
        self.reporter.debug(&format!(
            "removed {removed} {CACHE_DIR} directories under {}",
            package_dir.display()
        ));

        let optimize = options
            .optimize
            .or(project.settings.optimize)
            .unwrap_or(DEFAULT_SOURCE_OPTIMIZE);
        let packaged = self
            .precompiler
            .precompile(&package_dir, optimize, BytecodeLayout::Legacy)
            .and_then(|()| {
                self.reporter.info(&format!(
                    "compiled {} (optimisation level {optimize})",
                    package_dir.display()
                ));
                self.package_compiled(project, &package_dir, &output)
            });
        let swept = remove_legacy_bytecode(&package_dir);
        let files = packaged?;
        self.reporter
            .debug(&format!("removed {} compiled files beside their sources", swept?));

        self.reporter.info(&format!(
            "built {} ({files} packaged files)",
            output.display()
        ));
        Ok(SourceArchive {
            archive: output,
            files,
        })
    }

    /// Archive the compiled tree; returns how many files were packaged.
    fn package_compiled(&self, project: &Project, package_dir: &Path, output: &Path) -> Result<usize, BuildError> {
        let files = collect_files(
            package_dir,
            |dir| dir.file_name().is_some_and(|n| n == CACHE_DIR),
            |file| is_shipped(package_dir, file),
            &artifact_paths(output),
        )?;

        let metadata = SourceMetadata {
            project: project.info(),
            python: project.python_info(),
            archive: file_name(output),
            build: BuildInfo::capture(self.runtime_version(project)),
        };

        assemble(output, |archive| {
            for file in &files {
                archive.add_file(&file.source, &file.entry)?;
            }
            archive.add_bytes(METADATA_FILE, metadata.encode().as_bytes())
        })?;
        Ok(files.len())
    }
}

/// Compiled bytecode and resources ship; Python sources and a top-level
/// metadata file do not.
fn is_shipped(root: &Path, file: &Path) -> bool {
    if file.extension().is_some_and(|e| e == "py") {
        return false;
    }
    !(file.parent() == Some(root) && file.file_name().is_some_and(|n| n == METADATA_FILE))
}

/// Delete every `__pycache__` directory beneath `dir`. Returns how many went.
fn remove_caches(dir: &Path) -> Result<usize, BuildError> {
    let mut caches = Vec::new();
    let mut walker = WalkDir::new(dir).min_depth(1).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| io_err(dir, std::io::Error::other(e)))?;
        if entry.file_type().is_dir() && entry.file_name() == CACHE_DIR {
            caches.push(entry.into_path());
            walker.skip_current_dir();
        }
    }
    for cache in &caches {
        std::fs::remove_dir_all(cache).map_err(|e| io_err(cache, e))?;
    }
    Ok(caches.len())
}

/// Delete each `<name>.pyc` that sits beside a `<name>.py` under `dir`.
fn remove_legacy_bytecode(dir: &Path) -> Result<usize, BuildError> {
    let mut removed = 0;
    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry.map_err(|e| io_err(dir, std::io::Error::other(e)))?;
        let path = entry.path();
        if !entry.file_type().is_file() || !path.extension().is_some_and(|e| e == "pyc") {
            continue;
        }
        if !path.with_extension("py").is_file() {
            continue;
        }
        std::fs::remove_file(path).map_err(|e| io_err(path, e))?;
        removed += 1;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn sources_are_not_shipped() {
        let root = Path::new("/pkg");
        assert!(!is_shipped(root, Path::new("/pkg/app/main.py")));
        assert!(is_shipped(root, Path::new("/pkg/app/main.pyc")));
        assert!(is_shipped(root, Path::new("/pkg/app/data.json")));
        assert!(!is_shipped(root, Path::new("/pkg/environment.ini")));
        assert!(is_shipped(root, Path::new("/pkg/app/environment.ini")));
    }

    #[test]
    fn nested_caches_are_removed() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/__pycache__/__pycache__")).unwrap();
        fs::create_dir_all(dir.path().join("b/c/__pycache__")).unwrap();
        fs::write(dir.path().join("b/c/__pycache__/m.cpython-312.pyc"), b"").unwrap();
        fs::write(dir.path().join("b/c/m.py"), b"").unwrap();

        assert_eq!(remove_caches(dir.path()).unwrap(), 2);
        assert!(!dir.path().join("a/__pycache__").exists());
        assert!(!dir.path().join("b/c/__pycache__").exists());
        assert!(dir.path().join("b/c/m.py").exists());
    }

    #[test]
    fn only_bytecode_beside_a_source_is_swept() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("pkg")).unwrap();
        fs::write(dir.path().join("pkg/m.py"), b"").unwrap();
        fs::write(dir.path().join("pkg/m.pyc"), b"").unwrap();
        fs::write(dir.path().join("pkg/vendored.pyc"), b"").unwrap();

        assert_eq!(remove_legacy_bytecode(dir.path()).unwrap(), 1);
        assert!(!dir.path().join("pkg/m.pyc").exists());
        assert!(dir.path().join("pkg/m.py").exists());
        assert!(dir.path().join("pkg/vendored.pyc").exists());
    }
}
