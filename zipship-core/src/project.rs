//! Project descriptor — `pyproject.toml` loading and derived locations.
//!
//! # Layout assumed
//!
//! ```text
//! <root>/
//!   pyproject.toml
//!   .venv/
//!     Lib/site-packages/              (Windows)
//!     lib/python3.X/site-packages/    (POSIX)
//!   src/ | <module_name>/             (package source)
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{io_err, ProjectError};
use crate::metadata::{ProjectInfo, PythonInfo};
use crate::types::{ProjectName, ToolSettings};

const DESCRIPTOR_FILE: &str = "pyproject.toml";
const VENV_DIR: &str = ".venv";

// ---------------------------------------------------------------------------
// Raw descriptor shape
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct Descriptor {
    #[serde(default)]
    project: ProjectTable,
    #[serde(default)]
    tool: ToolTable,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ProjectTable {
    name: Option<String>,
    version: Option<String>,
    description: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
    requires_python: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolTable {
    #[serde(default)]
    zipship: ToolSettings,
    #[serde(default)]
    setuptools: SetuptoolsTable,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SetuptoolsTable {
    #[serde(default)]
    package_dir: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// A loaded project descriptor. Read-only for the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub name: ProjectName,
    pub version: String,
    pub description: Option<String>,
    pub dependencies: Vec<String>,
    pub requires_python: Option<String>,
    /// Absolute path of the descriptor file.
    pub project_file: PathBuf,
    /// Directory containing the descriptor.
    pub root: PathBuf,
    pub settings: ToolSettings,
    package_dir: Option<String>,
}

impl Project {
    /// Load from a descriptor file, or from a directory containing `pyproject.toml`
    /// (file name matched case-insensitively).
    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        let project_file = locate_descriptor(path)?;
        let project_file = std::path::absolute(&project_file).map_err(|e| io_err(&project_file, e))?;
        let contents =
            std::fs::read_to_string(&project_file).map_err(|e| io_err(&project_file, e))?;
        let descriptor: Descriptor = toml::from_str(&contents).map_err(|e| ProjectError::Parse {
            path: project_file.clone(),
            source: e,
        })?;

        let missing = |field| ProjectError::MissingField {
            path: project_file.clone(),
            field,
        };
        let table = descriptor.project;
        let name = table.name.ok_or_else(|| missing("name"))?;
        let version = table.version.ok_or_else(|| missing("version"))?;
        let root = project_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Project {
            name: ProjectName::from(name),
            version,
            description: table.description,
            dependencies: table.dependencies,
            requires_python: table.requires_python,
            project_file,
            root,
            settings: descriptor.tool.zipship,
            package_dir: descriptor.tool.setuptools.package_dir.get("").cloned(),
        })
    }

    /// `<root>/.venv` — pure, no I/O.
    pub fn virtualenv(&self) -> PathBuf {
        self.root.join(VENV_DIR)
    }

    /// The virtual environment's `site-packages` directory.
    ///
    /// Prefers the Windows layout, then the first `lib/python*/site-packages`.
    pub fn site_packages(&self) -> Result<PathBuf, ProjectError> {
        let venv = self.virtualenv();
        let windows = venv.join("Lib").join("site-packages");
        if windows.is_dir() {
            return Ok(windows);
        }

        let lib = venv.join("lib");
        if lib.is_dir() {
            let mut candidates: Vec<PathBuf> = std::fs::read_dir(&lib)
                .map_err(|e| io_err(&lib, e))?
                .filter_map(|e| e.ok())
                .filter(|e| e.file_name().to_string_lossy().starts_with("python"))
                .map(|e| e.path().join("site-packages"))
                .filter(|p| p.is_dir())
                .collect();
            candidates.sort();
            if let Some(found) = candidates.into_iter().next() {
                return Ok(found);
            }
        }

        Err(ProjectError::VirtualEnvNotFound { path: venv })
    }

    /// Directory holding the package sources.
    ///
    /// `[tool.setuptools.package-dir]` root entry, else `src/`, else `<module_name>/`.
    pub fn package_dir(&self) -> Result<PathBuf, ProjectError> {
        let mut candidates = Vec::new();
        if let Some(declared) = &self.package_dir {
            candidates.push(self.root.join(declared));
        }
        candidates.push(self.root.join("src"));
        candidates.push(self.root.join(self.name.module_name()));

        candidates
            .into_iter()
            .find(|p| p.is_dir())
            .ok_or_else(|| ProjectError::SourceDirNotFound {
                name: self.name.0.clone(),
                root: self.root.clone(),
            })
    }

    /// `[project]` metadata section for this project.
    pub fn info(&self) -> ProjectInfo {
        ProjectInfo {
            name: self.name.0.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
        }
    }

    /// `[python]` metadata section for this project.
    pub fn python_info(&self) -> PythonInfo {
        PythonInfo::new(
            self.requires_python.clone().unwrap_or_default(),
            &self.dependencies,
        )
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn locate_descriptor(path: &Path) -> Result<PathBuf, ProjectError> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    if !path.is_dir() {
        return Err(ProjectError::DescriptorNotFound {
            path: path.to_path_buf(),
        });
    }
    let mut found: Vec<PathBuf> = std::fs::read_dir(path)
        .map_err(|e| io_err(path, e))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().eq_ignore_ascii_case(DESCRIPTOR_FILE))
        .map(|e| e.path())
        .collect();
    found.sort();
    found
        .into_iter()
        .next()
        .ok_or_else(|| ProjectError::DescriptorNotFound {
            path: path.join(DESCRIPTOR_FILE),
        })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
