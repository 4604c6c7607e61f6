//! Deploy folder scenarios against archives written on the fly.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use rstest::rstest;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use zipship_core::{
    BuildInfo, BuildMetadata, DeployInfo, Fingerprint, Level, NullReporter, ProjectInfo, RecordingReporter,
};
use zipship_deploy::{deploy, DeployError, DeployOutcome};

fn metadata(folder: &str, manifest: &[u8]) -> BuildMetadata {
    BuildMetadata {
        project: ProjectInfo {
            name: "demo-app".into(),
            version: "1.0".into(),
            description: None,
        },
        python: None,
        build: BuildInfo::capture("3.12.1"),
        deploy: DeployInfo::new(folder, Fingerprint::of(manifest), "demo.zip"),
    }
}

/// Archive holding `files` plus an `environment.ini` for `manifest`.
fn write_archive(dir: &Path, name: &str, folder: &str, manifest: &[u8], files: &[(&str, &str)]) -> PathBuf {
    let path = dir.join(name);
    let mut zip = ZipWriter::new(File::create(&path).unwrap());
    let options = SimpleFileOptions::default();
    for (entry, body) in files {
        zip.start_file(*entry, options).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.start_file("requirements.txt", options).unwrap();
    zip.write_all(manifest).unwrap();
    zip.start_file("environment.ini", options).unwrap();
    zip.write_all(metadata(folder, manifest).encode().as_bytes()).unwrap();
    zip.finish().unwrap();
    path
}

fn saved_checksum(folder: &Path) -> String {
    let saved = BuildMetadata::decode(&fs::read(folder.join("environment.ini")).unwrap()).unwrap();
    saved.deploy.checksum
}

#[test]
fn absent_folder_is_installed() {
    let dir = TempDir::new().unwrap();
    let archive = write_archive(
        dir.path(),
        "v1.zip",
        "deploy",
        b"flask==2.0\n",
        &[("flask/__init__.py", "v1"), ("six.py", "six")],
    );

    let outcome = deploy(&archive, dir.path(), &NullReporter).unwrap();
    let folder = dir.path().join("deploy");
    assert_eq!(outcome, DeployOutcome::FreshInstall { folder: folder.clone() });

    assert_eq!(fs::read_to_string(folder.join("flask/__init__.py")).unwrap(), "v1");
    assert_eq!(fs::read_to_string(folder.join("six.py")).unwrap(), "six");
    assert_eq!(fs::read(folder.join("requirements.txt")).unwrap(), b"flask==2.0\n");
    assert_eq!(saved_checksum(&folder), Fingerprint::of(b"flask==2.0\n").to_string());
    assert!(!dir.path().join(".deploy.zipship-staging").exists());
}

#[test]
fn current_folder_is_left_untouched() {
    let dir = TempDir::new().unwrap();
    let archive = write_archive(dir.path(), "v1.zip", "deploy", b"flask==2.0\n", &[("six.py", "six")]);
    deploy(&archive, dir.path(), &NullReporter).unwrap();

    let folder = dir.path().join("deploy");
    let pinned = FileTime::from_unix_time(1_600_000_000, 0);
    filetime::set_file_mtime(folder.join("six.py"), pinned).unwrap();
    fs::write(folder.join("local.cfg"), "user data").unwrap();

    let reporter = RecordingReporter::new();
    let outcome = deploy(&archive, dir.path(), &reporter).unwrap();

    assert!(matches!(outcome, DeployOutcome::Unchanged { .. }));
    let mtime = FileTime::from_last_modification_time(&fs::metadata(folder.join("six.py")).unwrap());
    assert_eq!(mtime, pinned, "no file may be rewritten");
    assert!(folder.join("local.cfg").exists(), "no file may be removed");
    assert!(reporter.contains(Level::Info, "is current"));
}

#[test]
fn stale_folder_is_replaced_without_leftovers() {
    let dir = TempDir::new().unwrap();
    let v1 = write_archive(
        dir.path(),
        "v1.zip",
        "deploy",
        b"flask==2.0\n",
        &[("flask/__init__.py", "v1"), ("flask/compat.py", "gone in v2")],
    );
    deploy(&v1, dir.path(), &NullReporter).unwrap();

    let v2 = write_archive(
        dir.path(),
        "v2.zip",
        "deploy",
        b"flask==3.0\n",
        &[("flask/__init__.py", "v2")],
    );
    let outcome = deploy(&v2, dir.path(), &NullReporter).unwrap();

    let folder = dir.path().join("deploy");
    assert!(matches!(outcome, DeployOutcome::Replaced { .. }));
    assert_eq!(fs::read_to_string(folder.join("flask/__init__.py")).unwrap(), "v2");
    assert!(!folder.join("flask/compat.py").exists());
    assert_eq!(saved_checksum(&folder), Fingerprint::of(b"flask==3.0\n").to_string());
    assert!(!dir.path().join(".deploy.zipship-old").exists());
    assert!(!dir.path().join(".deploy.zipship-staging").exists());
}

#[rstest]
#[case::no_metadata(None)]
#[case::garbage_metadata(Some(&b"\xff\xfe\x00"[..]))]
#[case::no_checksum(Some(&b"[deploy]\nfolder = deploy\n"[..]))]
fn folder_without_readable_checksum_is_replaced(#[case] saved: Option<&[u8]>) {
    let dir = TempDir::new().unwrap();
    let folder = dir.path().join("deploy");
    fs::create_dir_all(&folder).unwrap();
    fs::write(folder.join("orphan.py"), "old").unwrap();
    if let Some(bytes) = saved {
        fs::write(folder.join("environment.ini"), bytes).unwrap();
    }

    let archive = write_archive(dir.path(), "v1.zip", "deploy", b"flask==2.0\n", &[("six.py", "six")]);
    let reporter = RecordingReporter::new();
    let outcome = deploy(&archive, dir.path(), &reporter).unwrap();

    assert!(matches!(outcome, DeployOutcome::Replaced { .. }));
    assert!(reporter.contains(Level::Warn, "no readable"));
    assert!(!folder.join("orphan.py").exists());
    assert!(folder.join("six.py").exists());
}

#[test]
fn leftovers_from_interrupted_runs_are_cleared() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join(".deploy.zipship-staging/half")).unwrap();
    fs::create_dir_all(dir.path().join(".deploy.zipship-old")).unwrap();

    let archive = write_archive(dir.path(), "v1.zip", "deploy", b"", &[("six.py", "six")]);
    let reporter = RecordingReporter::new();
    let outcome = deploy(&archive, dir.path(), &reporter).unwrap();

    assert!(matches!(outcome, DeployOutcome::FreshInstall { .. }));
    assert!(!dir.path().join(".deploy.zipship-old").exists());
    assert!(!dir.path().join("deploy/half").exists());
    assert!(reporter.contains(Level::Warn, "leftover"));
}

#[test]
fn plain_file_at_the_folder_path_is_replaced_and_later_runs_converge() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("deploy"), "not a folder").unwrap();
    let archive = write_archive(dir.path(), "v1.zip", "deploy", b"flask==2.0\n", &[("six.py", "six")]);

    let first = deploy(&archive, dir.path(), &NullReporter).unwrap();
    assert!(matches!(first, DeployOutcome::Replaced { .. }));
    assert!(!dir.path().join(".deploy.zipship-old").exists());

    for _ in 0..2 {
        let again = deploy(&archive, dir.path(), &NullReporter).unwrap();
        assert!(matches!(again, DeployOutcome::Unchanged { .. }));
    }
    assert_eq!(fs::read_to_string(dir.path().join("deploy/six.py")).unwrap(), "six");
}

#[rstest]
#[case::staging(".deploy.zipship-staging")]
#[case::retired(".deploy.zipship-old")]
fn plain_file_leftover_is_cleared(#[case] leftover: &str) {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(leftover), "stray").unwrap();

    let archive = write_archive(dir.path(), "v1.zip", "deploy", b"", &[("six.py", "six")]);
    let reporter = RecordingReporter::new();
    let outcome = deploy(&archive, dir.path(), &reporter).unwrap();

    assert!(matches!(outcome, DeployOutcome::FreshInstall { .. }));
    assert!(!dir.path().join(leftover).exists());
    assert!(reporter.contains(Level::Warn, "leftover"));
}

#[test]
fn nested_folder_is_created() {
    let dir = TempDir::new().unwrap();
    let archive = write_archive(dir.path(), "v1.zip", "vendor/py", b"", &[("six.py", "six")]);
    let outcome = deploy(&archive, dir.path(), &NullReporter).unwrap();
    assert_eq!(outcome.folder(), dir.path().join("vendor/py"));
    assert!(dir.path().join("vendor/py/six.py").exists());
}

#[test]
fn escaping_folder_is_refused() {
    let dir = TempDir::new().unwrap();
    let archive = write_archive(dir.path(), "evil.zip", "../outside", b"", &[("six.py", "six")]);
    let err = deploy(&archive, dir.path(), &NullReporter).unwrap_err();
    assert!(matches!(err, DeployError::InvalidFolder { .. }));
    assert_eq!(err.exit_code(), 6);
}

#[test]
fn non_archive_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("junk.zip");
    fs::write(&path, "not a zip").unwrap();
    let err = deploy(&path, dir.path(), &NullReporter).unwrap_err();
    assert!(matches!(err, DeployError::Archive { .. }));
    assert!(!dir.path().join("deploy").exists());
}
