//! Project descriptor error-message and layout integration tests.

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use zipship_core::{Project, ProjectError};

const DESCRIPTOR: &str = r#"
[project]
name = "copnow-api"
version = "2.3.1"
description = "Order intake service"
requires-python = ">=3.11"
dependencies = ["flask==2.0", "requests>=2.31"]

[tool.zipship]
deploy-folder = "copnow"
python = "python3.12"
"#;

#[test]
fn load_full_descriptor() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("pyproject.toml").write_str(DESCRIPTOR).expect("write");

    let project = Project::load(root.path()).expect("load");
    assert_eq!(project.name.0, "copnow-api");
    assert_eq!(project.description.as_deref(), Some("Order intake service"));
    assert_eq!(project.dependencies.len(), 2);
    assert_eq!(project.settings.deploy_folder, "copnow");
    assert_eq!(project.settings.python, "python3.12");
    assert!(project.settings.sync_environment);
}

#[test]
fn corrupt_toml_returns_parse_error_with_path() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("pyproject.toml")
        .write_str("[project\nname = ")
        .expect("write");

    let err = Project::load(root.path()).unwrap_err();
    assert!(matches!(err, ProjectError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("pyproject.toml"));
}

#[test]
fn missing_name_mentions_field() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("pyproject.toml")
        .write_str("[project]\nversion = \"1\"\n")
        .expect("write");

    let err = Project::load(root.path()).unwrap_err();
    assert!(err.to_string().contains("`name`"), "got: {err}");
}

#[test]
fn nonexistent_path_is_not_found() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let err = Project::load(&root.path().join("nope")).unwrap_err();
    assert!(matches!(err, ProjectError::DescriptorNotFound { .. }));
}

#[test]
fn source_dir_not_found_names_project() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("pyproject.toml").write_str(DESCRIPTOR).expect("write");

    let project = Project::load(root.path()).expect("load");
    let err = project.package_dir().unwrap_err();
    assert!(err.to_string().contains("copnow-api"));
}

#[test]
fn src_layout_is_detected() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("pyproject.toml").write_str(DESCRIPTOR).expect("write");
    root.child("src/copnow_api/__init__.py").touch().expect("touch");

    let project = Project::load(root.path()).expect("load");
    let dir = project.package_dir().expect("package dir");
    assert!(dir.ends_with("src"));
    root.child("src").assert(predicate::path::is_dir());
}
