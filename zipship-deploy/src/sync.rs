//! Checksum-driven deploy folder synchronisation.
//!
//! State machine, keyed on `deploy.checksum`:
//!
//! ```text
//! absent  --extract-->            current   (FreshInstall)
//! current --checksum match-->     current   (Unchanged)
//! current --checksum mismatch-->  current   (Replaced, full re-extract)
//! ```
//!
//! Extraction always lands in `.<folder>.zipship-staging` first and is renamed
//! into place, so the folder is never observed half-written.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use zip::ZipArchive;

use zipship_core::keys::{CHECKSUM_KEY, DEPLOY_SECTION, METADATA_FILE, RETIRED_SUFFIX, STAGING_SUFFIX};
use zipship_core::{BuildMetadata, IniDocument, Reporter};

use crate::error::{io_err, DeployError};

/// What a deploy run did to the folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// The folder did not exist and was populated from the archive.
    FreshInstall { folder: PathBuf },
    /// The folder's saved checksum matched; nothing was touched.
    Unchanged { folder: PathBuf },
    /// The folder was stale and has been replaced wholesale.
    Replaced { folder: PathBuf },
}

impl DeployOutcome {
    pub fn folder(&self) -> &Path {
        match self {
            DeployOutcome::FreshInstall { folder }
            | DeployOutcome::Unchanged { folder }
            | DeployOutcome::Replaced { folder } => folder,
        }
    }
}

/// Synchronise the deploy folder named in `archive`'s metadata, resolved
/// relative to `base_dir`.
pub fn deploy(archive: &Path, base_dir: &Path, reporter: &dyn Reporter) -> Result<DeployOutcome, DeployError> {
    let file = File::open(archive).map_err(|e| io_err(archive, e))?;
    let mut zip = ZipArchive::new(file).map_err(|source| DeployError::Archive {
        path: archive.to_path_buf(),
        source,
    })?;
    let metadata = read_metadata(archive, &mut zip)?;
    let layout = FolderLayout::new(base_dir, &metadata.deploy.folder)?;

    for leftover in layout.clear_leftovers()? {
        reporter.warn(&format!(
            "removed leftover {} from an interrupted deploy",
            leftover.display()
        ));
    }

    if !layout.target.exists() {
        reporter.info(&format!("installing into {}", layout.target.display()));
        layout.stage(archive, &mut zip)?;
        rename(&layout.staging, &layout.target)?;
        return Ok(DeployOutcome::FreshInstall {
            folder: layout.target,
        });
    }

    match saved_checksum(&layout.target) {
        Some(saved) if saved == metadata.deploy.checksum => {
            reporter.info(&format!(
                "{} is current (checksum {saved})",
                layout.target.display()
            ));
            return Ok(DeployOutcome::Unchanged {
                folder: layout.target,
            });
        }
        Some(saved) => reporter.info(&format!(
            "dependencies changed (checksum {saved} -> {}), replacing {}",
            metadata.deploy.checksum,
            layout.target.display()
        )),
        None => reporter.warn(&format!(
            "{} has no readable {METADATA_FILE}, replacing it",
            layout.target.display()
        )),
    }

    layout.stage(archive, &mut zip)?;
    layout.swap(reporter)?;
    Ok(DeployOutcome::Replaced {
        folder: layout.target,
    })
}

fn read_metadata(archive: &Path, zip: &mut ZipArchive<File>) -> Result<BuildMetadata, DeployError> {
    let mut bytes = Vec::new();
    zip.by_name(METADATA_FILE)
        .and_then(|mut entry| entry.read_to_end(&mut bytes).map_err(Into::into))
        .map_err(|source| DeployError::Archive {
            path: archive.to_path_buf(),
            source,
        })?;
    BuildMetadata::decode(&bytes).map_err(|source| DeployError::Metadata {
        path: archive.to_path_buf(),
        source,
    })
}

/// `deploy.checksum` recorded by a previous run, if it can be read at all.
fn saved_checksum(folder: &Path) -> Option<String> {
    let bytes = fs::read(folder.join(METADATA_FILE)).ok()?;
    let doc = IniDocument::from_bytes(&bytes).ok()?;
    doc.get(DEPLOY_SECTION, CHECKSUM_KEY).map(str::to_string)
}

fn rename(from: &Path, to: &Path) -> Result<(), DeployError> {
    fs::rename(from, to).map_err(|e| io_err(to, e))
}

/// Remove whatever sits at `path`: a directory tree, or a plain file or
/// symlink left where a directory was expected.
fn remove_path(path: &Path) -> Result<bool, DeployError> {
    let removed = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) => Err(e),
    };
    match removed {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(io_err(path, e)),
    }
}

// ---------------------------------------------------------------------------
// Folder layout
// ---------------------------------------------------------------------------

/// The deploy folder and its hidden siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FolderLayout {
    target: PathBuf,
    staging: PathBuf,
    retired: PathBuf,
}

impl FolderLayout {
    fn new(base_dir: &Path, folder: &str) -> Result<Self, DeployError> {
        let relative = Path::new(folder);
        let plain = !folder.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        let name = relative.file_name().filter(|_| plain).ok_or_else(|| {
            DeployError::InvalidFolder {
                folder: folder.to_string(),
            }
        })?;

        let target = base_dir.join(relative);
        let parent = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| base_dir.to_path_buf());
        let sibling = |suffix: &str| {
            let mut hidden = std::ffi::OsString::from(".");
            hidden.push(name);
            hidden.push(suffix);
            parent.join(hidden)
        };

        Ok(FolderLayout {
            staging: sibling(STAGING_SUFFIX),
            retired: sibling(RETIRED_SUFFIX),
            target,
        })
    }

    fn clear_leftovers(&self) -> Result<Vec<PathBuf>, DeployError> {
        let mut removed = Vec::new();
        for dir in [&self.staging, &self.retired] {
            if remove_path(dir)? {
                removed.push(dir.clone());
            }
        }
        Ok(removed)
    }

    /// Extract the whole archive into the staging directory.
    fn stage(&self, archive: &Path, zip: &mut ZipArchive<File>) -> Result<(), DeployError> {
        fs::create_dir_all(&self.staging).map_err(|e| io_err(&self.staging, e))?;
        if let Err(source) = zip.extract(&self.staging) {
            let _ = fs::remove_dir_all(&self.staging);
            return Err(DeployError::ExtractFailed {
                archive: archive.to_path_buf(),
                folder: self.target.clone(),
                source,
            });
        }
        Ok(())
    }

    /// Retire the current folder, move the staged one in, drop the retired one.
    fn swap(&self, reporter: &dyn Reporter) -> Result<(), DeployError> {
        rename(&self.target, &self.retired)?;
        if let Err(err) = rename(&self.staging, &self.target) {
            if fs::rename(&self.retired, &self.target).is_err() {
                reporter.warn(&format!(
                    "could not restore {} from {}",
                    self.target.display(),
                    self.retired.display()
                ));
            }
            let _ = fs::remove_dir_all(&self.staging);
            return Err(err);
        }
        if let Err(err) = remove_path(&self.retired) {
            reporter.warn(&format!("{err}; it will be removed on the next deploy"));
        }
        Ok(())
    }
}
