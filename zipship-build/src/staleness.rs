//! Is the archive already at the output path still good?
//!
//! Signal precedence:
//! 1. `Missing` (nothing at the output path)
//! 2. `Corrupt` (not a zip, no metadata entry, metadata unreadable)
//! 3. `Stale` (checksum differs, or built by a different tool version)
//! 4. `Current`

use std::path::Path;

use zipship_core::keys::{BUILDER_VERSION, METADATA_FILE};
use zipship_core::{BuildMetadata, Fingerprint};

use crate::archive::read_entry;
use crate::error::{io_err, BuildError};

/// Classification of a prior archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveState {
    Missing,
    Current,
    Stale { reason: String },
    Corrupt { reason: String },
}

/// Compare the archive at `archive` against a freshly computed fingerprint.
///
/// Only a failure to look at the output path at all is an error; any problem
/// with the archive's contents is reported as [`ArchiveState::Corrupt`].
pub fn check(archive: &Path, fingerprint: Fingerprint) -> Result<ArchiveState, BuildError> {
    match archive.try_exists() {
        Ok(false) => return Ok(ArchiveState::Missing),
        Ok(true) => {}
        Err(e) => return Err(io_err(archive, e)),
    }

    let bytes = match read_entry(archive, METADATA_FILE) {
        Ok(bytes) => bytes,
        Err(BuildError::Zip { source, .. }) => {
            return Ok(ArchiveState::Corrupt {
                reason: source.to_string(),
            })
        }
        Err(e) => return Err(e),
    };
    let recorded = match BuildMetadata::decode(&bytes) {
        Ok(metadata) => metadata,
        Err(e) => {
            return Ok(ArchiveState::Corrupt {
                reason: e.to_string(),
            })
        }
    };

    Ok(compare(&recorded, fingerprint))
}

fn compare(recorded: &BuildMetadata, fingerprint: Fingerprint) -> ArchiveState {
    if !fingerprint.matches(&recorded.deploy.checksum) {
        return ArchiveState::Stale {
            reason: format!(
                "dependency checksum changed (recorded {}, now {fingerprint})",
                recorded.deploy.checksum
            ),
        };
    }
    if recorded.build.builder_version != BUILDER_VERSION {
        return ArchiveState::Stale {
            reason: format!(
                "built by zipship {}, current version is {BUILDER_VERSION}",
                recorded.build.builder_version
            ),
        };
    }
    ArchiveState::Current
}

#[cfg(test)]
mod tests {
    use super::*;
    use zipship_core::{BuildInfo, DeployInfo, ProjectInfo};

    fn recorded(checksum: Fingerprint, builder_version: &str) -> BuildMetadata {
        let mut build = BuildInfo::capture("3.12.1");
        build.builder_version = builder_version.to_string();
        BuildMetadata {
            project: ProjectInfo {
                name: "demo".into(),
                version: "1.0".into(),
                description: None,
            },
            python: None,
            build,
            deploy: DeployInfo::new("deploy", checksum, "demo.zip"),
        }
    }

    #[test]
    fn matching_checksum_and_version_is_current() {
        let fp = Fingerprint::of(b"flask==2.0\n");
        assert_eq!(compare(&recorded(fp, BUILDER_VERSION), fp), ArchiveState::Current);
    }

    #[test]
    fn checksum_change_is_stale() {
        let old = Fingerprint::of(b"flask==2.0\n");
        let new = Fingerprint::of(b"flask==3.0\n");
        let state = compare(&recorded(old, BUILDER_VERSION), new);
        assert!(matches!(state, ArchiveState::Stale { ref reason } if reason.contains("checksum")));
    }

    #[test]
    fn version_change_is_stale_even_with_same_checksum() {
        let fp = Fingerprint::of(b"flask==2.0\n");
        let state = compare(&recorded(fp, "0.0.1-old"), fp);
        assert!(matches!(state, ArchiveState::Stale { ref reason } if reason.contains("0.0.1-old")));
    }

    #[test]
    fn missing_output_is_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = check(&dir.path().join("none.zip"), Fingerprint::of(b"")).unwrap();
        assert_eq!(state, ArchiveState::Missing);
    }

    #[test]
    fn garbage_output_is_corrupt() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("demo.zip");
        std::fs::write(&path, b"PK\x03\x04 truncated").unwrap();
        let state = check(&path, Fingerprint::of(b"")).unwrap();
        assert!(matches!(state, ArchiveState::Corrupt { .. }));
    }
}
