//! Domain types shared across zipship crates.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed project name, as declared in `[project] name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectName(pub String);

impl ProjectName {
    /// Importable module name: `-` mapped to `_`.
    pub fn module_name(&self) -> String {
        self.0.replace('-', "_")
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ProjectName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProjectName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Tool settings
// ---------------------------------------------------------------------------

pub const DEFAULT_DEPLOY_FOLDER: &str = "deploy";
pub const DEFAULT_PYTHON: &str = "python";
pub const DEFAULT_DEPENDENCY_OPTIMIZE: u8 = 2;
pub const DEFAULT_SOURCE_OPTIMIZE: u8 = 1;

/// The optional `[tool.zipship]` table of a project descriptor.
///
/// CLI flags override these; absent keys fall back to built-in defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ToolSettings {
    pub deploy_folder: String,
    /// Resolver argv. `None` means `uv pip compile <project file>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolver: Option<Vec<String>>,
    pub python: String,
    /// Bytecode optimisation level. `None` means the per-archive default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimize: Option<u8>,
    pub sync_environment: bool,
}

impl Default for ToolSettings {
    fn default() -> Self {
        ToolSettings {
            deploy_folder: DEFAULT_DEPLOY_FOLDER.to_string(),
            resolver: None,
            python: DEFAULT_PYTHON.to_string(),
            optimize: None,
            sync_environment: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
