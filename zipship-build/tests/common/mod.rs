//! Shared fixtures: a fake project tree and in-process stand-ins for the
//! resolver and the precompiler.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use walkdir::WalkDir;
use zip::ZipArchive;

use zipship_build::{BuildError, BytecodeLayout, Precompiler, Resolver};
use zipship_core::Project;

pub const RUNTIME: &str = "3.12.1";
const BYTECODE_TAG: &str = "cpython-312";

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

pub struct FakeResolver {
    manifest: RefCell<Vec<u8>>,
    fail: bool,
    pub syncs: Cell<usize>,
}

impl FakeResolver {
    pub fn new(manifest: &[u8]) -> Self {
        FakeResolver {
            manifest: RefCell::new(manifest.to_vec()),
            fail: false,
            syncs: Cell::new(0),
        }
    }

    pub fn failing() -> Self {
        FakeResolver {
            fail: true,
            ..Self::new(b"")
        }
    }

    pub fn set_manifest(&self, manifest: &[u8]) {
        *self.manifest.borrow_mut() = manifest.to_vec();
    }
}

impl Resolver for FakeResolver {
    fn resolve(&self, _project: &Project) -> Result<Vec<u8>, BuildError> {
        if self.fail {
            return Err(BuildError::ResolutionFailed {
                command: "fake-resolver".into(),
                reason: "exit status: 1".into(),
            });
        }
        Ok(self.manifest.borrow().clone())
    }

    fn sync_environment(&self, _project: &Project) -> Result<(), BuildError> {
        self.syncs.set(self.syncs.get() + 1);
        Ok(())
    }
}

/// Writes an empty `.pyc` for every `.py` it finds, in the requested layout.
#[derive(Default)]
pub struct FakePrecompiler {
    fail: bool,
    pub calls: RefCell<Vec<(PathBuf, u8, BytecodeLayout)>>,
}

impl FakePrecompiler {
    pub fn failing() -> Self {
        FakePrecompiler {
            fail: true,
            ..Self::default()
        }
    }
}

impl Precompiler for FakePrecompiler {
    fn precompile(&self, dir: &Path, optimize: u8, layout: BytecodeLayout) -> Result<(), BuildError> {
        self.calls
            .borrow_mut()
            .push((dir.to_path_buf(), optimize, layout));
        if self.fail {
            return Err(BuildError::PrecompileFailed {
                dir: dir.to_path_buf(),
                reason: "exit status: 1".into(),
            });
        }

        let sources: Vec<PathBuf> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.extension().is_some_and(|x| x == "py"))
            .collect();
        for source in sources {
            let stem = source.file_stem().unwrap().to_string_lossy().into_owned();
            let parent = source.parent().unwrap();
            let target = match layout {
                BytecodeLayout::Legacy => parent.join(format!("{stem}.pyc")),
                BytecodeLayout::Cache => {
                    let suffix = if optimize > 0 {
                        format!(".opt-{optimize}")
                    } else {
                        String::new()
                    };
                    parent
                        .join("__pycache__")
                        .join(format!("{stem}.{BYTECODE_TAG}{suffix}.pyc"))
                }
            };
            fs::create_dir_all(target.parent().unwrap()).unwrap();
            fs::write(target, b"\x00bytecode").unwrap();
        }
        Ok(())
    }

    fn runtime_version(&self) -> Option<String> {
        Some(RUNTIME.to_string())
    }
}

// ---------------------------------------------------------------------------
// Project fixture
// ---------------------------------------------------------------------------

pub struct Fixture {
    pub dir: TempDir,
    pub project: Project,
}

impl Fixture {
    /// A `demo-app` project with a small POSIX virtualenv and a `src/` package.
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(
            &root.join("pyproject.toml"),
            "[project]\nname = \"demo-app\"\nversion = \"1.2.0\"\n\
             description = \"Demo application\"\nrequires-python = \">=3.11\"\n\
             dependencies = [\"flask>=2\"]\n",
        );

        let sp = root.join(".venv/lib/python3.12/site-packages");
        write(&sp.join("flask/__init__.py"), "from .app import Flask\n");
        write(&sp.join("flask/app.py"), "class Flask: ...\n");
        write(&sp.join("six.py"), "PY3 = True\n");
        write(&sp.join("flask-2.0.dist-info/METADATA"), "Name: flask\n");

        let pkg = root.join("src/demo_app");
        write(&pkg.join("__init__.py"), "");
        write(&pkg.join("core.py"), "def run(): ...\n");
        write(&pkg.join("data/config.json"), "{}\n");
        write(&pkg.join("__pycache__/core.cpython-311.pyc"), "stale");

        let project = Project::load(root).unwrap();
        Fixture { dir, project }
    }

    pub fn site_packages(&self) -> PathBuf {
        self.project.site_packages().unwrap()
    }

    pub fn output(&self) -> PathBuf {
        self.project
            .root
            .join(zipship_build::default_archive_name(&self.project))
    }
}

pub fn write(path: &Path, body: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

// ---------------------------------------------------------------------------
// Archive inspection
// ---------------------------------------------------------------------------

pub fn entry_names(archive: &Path) -> Vec<String> {
    let zip = ZipArchive::new(File::open(archive).unwrap()).unwrap();
    let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
    names.sort();
    names
}

pub fn entry_bytes(archive: &Path, name: &str) -> Vec<u8> {
    zipship_build::archive::read_entry(archive, name).unwrap()
}
