//! Checksum-gated dependency archive builder.
//!
//! ## `build` protocol
//!
//! 1. Resolve the output path (`<root>/<name>.bin.<os>.zip` by default).
//! 2. Optionally sync the virtual environment, then resolve the dependency
//!    manifest and fingerprint it.
//! 3. Lock the output path and classify any archive already there; a current
//!    archive ends the build with [`BuildOutcome::Unchanged`].
//! 4. Delete a stale or corrupt archive.
//! 5. Precompile `site-packages`.
//! 6. Walk `site-packages` (minus its top-level `__pycache__`).
//! 7. Write every file, the entry point, `requirements.txt` and
//!    `environment.ini` through [`assemble`].

use std::path::{Path, PathBuf};

use zipship_core::keys::{CACHE_DIR, ENTRY_POINT_FILE, METADATA_FILE, REQUIREMENTS_FILE};
use zipship_core::types::DEFAULT_DEPENDENCY_OPTIMIZE;
use zipship_core::{BuildInfo, BuildMetadata, DeployInfo, Fingerprint, Project, Reporter};
use zipship_renderer::Renderer;

use crate::archive::{assemble, collect_files, staging_path};
use crate::error::{io_err, BuildError};
use crate::lock::{lock_path_for, OutputLock};
use crate::staleness::{self, ArchiveState};
use crate::toolchain::{BytecodeLayout, Precompiler, Resolver};

/// Entry names the builder writes itself at the archive root.
pub(crate) const RESERVED_ENTRIES: &[&str] = &[ENTRY_POINT_FILE, REQUIREMENTS_FILE, METADATA_FILE];

const UNKNOWN_RUNTIME: &str = "unknown";

// ---------------------------------------------------------------------------
// Options and outcome
// ---------------------------------------------------------------------------

/// Per-invocation overrides. `None` falls back to `[tool.zipship]`, then defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub output: Option<PathBuf>,
    pub deploy_folder: Option<String>,
    pub sync_environment: Option<bool>,
    pub optimize: Option<u8>,
}

/// What a successful [`ArchiveBuilder::build`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// A new archive was written.
    Built {
        archive: PathBuf,
        files: usize,
        fingerprint: Fingerprint,
    },
    /// The archive at the output path was already current and was left alone.
    Unchanged {
        archive: PathBuf,
        fingerprint: Fingerprint,
    },
}

impl BuildOutcome {
    pub fn archive(&self) -> &Path {
        match self {
            BuildOutcome::Built { archive, .. } | BuildOutcome::Unchanged { archive, .. } => archive,
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        match self {
            BuildOutcome::Built { fingerprint, .. } | BuildOutcome::Unchanged { fingerprint, .. } => {
                *fingerprint
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builds archives with injected external tools and reporting.
pub struct ArchiveBuilder<'a> {
    pub(crate) resolver: &'a dyn Resolver,
    pub(crate) precompiler: &'a dyn Precompiler,
    pub(crate) reporter: &'a dyn Reporter,
}

impl<'a> ArchiveBuilder<'a> {
    pub fn new(
        resolver: &'a dyn Resolver,
        precompiler: &'a dyn Precompiler,
        reporter: &'a dyn Reporter,
    ) -> Self {
        ArchiveBuilder {
            resolver,
            precompiler,
            reporter,
        }
    }

    /// Build the dependency archive for `project`, or leave a current one alone.
    pub fn build(&self, project: &Project, options: &BuildOptions) -> Result<BuildOutcome, BuildError> {
        let output = resolve_output(project, options.output.as_deref(), default_archive_name(project))?;
        let deploy_folder = options
            .deploy_folder
            .clone()
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| project.settings.deploy_folder.clone());

        if options
            .sync_environment
            .unwrap_or(project.settings.sync_environment)
        {
            self.reporter.info("synchronising virtual environment");
            self.resolver.sync_environment(project)?;
        }

        self.reporter.info("comparing dependencies");
        let manifest = self.resolver.resolve(project)?;
        let fingerprint = Fingerprint::of(&manifest);
        self.reporter
            .debug(&format!("dependency checksum is {fingerprint}"));

        ensure_parent(&output)?;
        let _lock = OutputLock::acquire(&output, "zipship build")?;

        match staleness::check(&output, fingerprint)? {
            ArchiveState::Current => {
                self.reporter.info(&format!(
                    "no new vendored dependencies, {} is current",
                    output.display()
                ));
                return Ok(BuildOutcome::Unchanged {
                    archive: output,
                    fingerprint,
                });
            }
            ArchiveState::Missing => {
                self.reporter
                    .debug(&format!("no archive at {}", output.display()));
            }
            ArchiveState::Stale { reason } => {
                self.reporter
                    .info(&format!("dependencies or version have changed: {reason}"));
                remove_archive(&output)?;
            }
            ArchiveState::Corrupt { reason } => {
                self.reporter.warn(&format!(
                    "existing archive {} is unreadable ({reason}), rebuilding",
                    output.display()
                ));
                remove_archive(&output)?;
            }
        }

        let site_packages = project.site_packages()?;
        let optimize = options
            .optimize
            .or(project.settings.optimize)
            .unwrap_or(DEFAULT_DEPENDENCY_OPTIMIZE);
        self.precompiler
            .precompile(&site_packages, optimize, BytecodeLayout::Cache)?;
        self.reporter.info(&format!(
            "compiled bytecode in {} (optimisation level {optimize})",
            site_packages.display()
        ));

        let python_version = self.runtime_version(project);
        let top_cache = site_packages.join(CACHE_DIR);
        let files = collect_files(
            &site_packages,
            |dir| dir == top_cache,
            |file| !self.shadows_reserved(&site_packages, file),
            &artifact_paths(&output),
        )?;

        let entry_point = Renderer::new()?.render_entry_point(&python_version)?;
        let metadata = BuildMetadata {
            project: project.info(),
            python: Some(project.python_info()),
            build: BuildInfo::capture(python_version),
            deploy: DeployInfo::new(deploy_folder, fingerprint, file_name(&output)),
        };

        assemble(&output, |archive| {
            for file in &files {
                archive.add_file(&file.source, &file.entry)?;
            }
            archive.add_bytes(ENTRY_POINT_FILE, entry_point.as_bytes())?;
            archive.add_bytes(REQUIREMENTS_FILE, &manifest)?;
            archive.add_bytes(METADATA_FILE, metadata.encode().as_bytes())
        })?;

        self.reporter.info(&format!(
            "built {} ({} packaged files)",
            output.display(),
            files.len()
        ));
        Ok(BuildOutcome::Built {
            archive: output,
            files: files.len(),
            fingerprint,
        })
    }

    pub(crate) fn runtime_version(&self, project: &Project) -> String {
        self.precompiler
            .runtime_version()
            .or_else(|| project.requires_python.clone())
            .unwrap_or_else(|| UNKNOWN_RUNTIME.to_string())
    }

    /// A top-level file whose name the builder writes itself is dropped with a warning.
    pub(crate) fn shadows_reserved(&self, root: &Path, file: &Path) -> bool {
        let at_root = file.parent() == Some(root);
        let reserved = file
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| RESERVED_ENTRIES.contains(&n));
        if at_root && reserved {
            self.reporter.warn(&format!(
                "skipping {}: the name is reserved for archive metadata",
                file.display()
            ));
            return true;
        }
        false
    }
}

// ---------------------------------------------------------------------------
// Output paths
// ---------------------------------------------------------------------------

/// `<name>.bin.<os>.zip`
pub fn default_archive_name(project: &Project) -> String {
    format!("{}.bin.{}.zip", project.name, std::env::consts::OS)
}

/// An explicit output path (with `~` expanded, made absolute), else
/// `default_name` in the project root.
pub(crate) fn resolve_output(
    project: &Project,
    explicit: Option<&Path>,
    default_name: String,
) -> Result<PathBuf, BuildError> {
    let Some(path) = explicit else {
        return Ok(project.root.join(default_name));
    };
    let expanded = expand_home(path);
    std::path::absolute(&expanded).map_err(|e| io_err(&expanded, e))
}

fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// The output archive and the files the build keeps beside it.
pub(crate) fn artifact_paths(output: &Path) -> Vec<PathBuf> {
    vec![output.to_path_buf(), staging_path(output), lock_path_for(output)]
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub(crate) fn ensure_parent(path: &Path) -> Result<(), BuildError> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e)),
        None => Ok(()),
    }
}

fn remove_archive(path: &Path) -> Result<(), BuildError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project(dir: &Path) -> Project {
        fs::write(
            dir.join("pyproject.toml"),
            "[project]\nname = \"demo-app\"\nversion = \"1.0\"\n",
        )
        .unwrap();
        Project::load(dir).unwrap()
    }

    #[test]
    fn default_name_carries_platform() {
        let dir = TempDir::new().unwrap();
        let name = default_archive_name(&project(dir.path()));
        assert_eq!(name, format!("demo-app.bin.{}.zip", std::env::consts::OS));
    }

    #[test]
    fn output_defaults_to_project_root() {
        let dir = TempDir::new().unwrap();
        let p = project(dir.path());
        let out = resolve_output(&p, None, "x.zip".into()).unwrap();
        assert_eq!(out, p.root.join("x.zip"));
    }

    #[test]
    fn explicit_output_is_absolute() {
        let dir = TempDir::new().unwrap();
        let p = project(dir.path());
        let out = resolve_output(&p, Some(Path::new("dist/x.zip")), "unused".into()).unwrap();
        assert!(out.is_absolute());
        assert!(out.ends_with("dist/x.zip"));
    }

    #[test]
    fn home_prefix_is_expanded() {
        let expanded = expand_home(Path::new("~/out.zip"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("out.zip"));
        }
        assert_eq!(expand_home(Path::new("/abs/out.zip")), PathBuf::from("/abs/out.zip"));
    }

    #[test]
    fn artifacts_cover_temp_and_lock() {
        let paths = artifact_paths(Path::new("/o/a.zip"));
        assert_eq!(paths.len(), 3);
        assert!(paths.contains(&PathBuf::from("/o/a.zip.lock")));
        assert!(paths.contains(&PathBuf::from("/o/a.zip.zipship.tmp")));
    }

    #[test]
    fn removing_a_missing_archive_is_fine() {
        let dir = TempDir::new().unwrap();
        assert!(remove_archive(&dir.path().join("gone.zip")).is_ok());
    }
}
