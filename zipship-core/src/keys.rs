//! Well-known archive entry names and metadata section/key names.
//!
//! This table is the single source of truth shared by the metadata codec and
//! the entry-point script template. The renderer builds its template context
//! from [`SCRIPT_KEYS`], so a key renamed here is renamed in both places.

use serde::Serialize;

/// Metadata record file name, both inside the archive and at the deploy-folder root.
pub const METADATA_FILE: &str = "environment.ini";
/// Entry-point script executed when the archive is run.
pub const ENTRY_POINT_FILE: &str = "__main__.py";
/// Resolved dependency manifest.
pub const REQUIREMENTS_FILE: &str = "requirements.txt";
/// Reserved bytecode cache directory name.
pub const CACHE_DIR: &str = "__pycache__";
/// Suffix of the hidden sibling a deploy folder is extracted into before the swap.
pub const STAGING_SUFFIX: &str = ".zipship-staging";
/// Suffix of the hidden sibling a replaced deploy folder is moved to before removal.
pub const RETIRED_SUFFIX: &str = ".zipship-old";

pub const PROJECT_SECTION: &str = "project";
pub const BUILD_SECTION: &str = "build";
pub const DEPLOY_SECTION: &str = "deploy";
pub const PYTHON_SECTION: &str = "python";
pub const ARCHIVE_SECTION: &str = "archive";

pub const NAME_KEY: &str = "name";
pub const VERSION_KEY: &str = "version";
pub const DESCRIPTION_KEY: &str = "description";

pub const CREATED_KEY: &str = "created";
pub const MACHINE_KEY: &str = "machine";
pub const USER_KEY: &str = "user";
pub const BUILDER_VERSION_KEY: &str = "builder_version";
pub const PYTHON_VERSION_KEY: &str = "python_version";

pub const FOLDER_KEY: &str = "folder";
pub const CHECKSUM_KEY: &str = "checksum";
pub const ARCHIVE_KEY: &str = "archive";

pub const PYTHON_KEY: &str = "python";
pub const DEPENDENCIES_KEY: &str = "dependencies";

/// Names the entry-point template may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScriptKeys {
    pub metadata_file: &'static str,
    pub deploy_section: &'static str,
    pub folder_key: &'static str,
    pub checksum_key: &'static str,
    pub staging_suffix: &'static str,
    pub retired_suffix: &'static str,
}

pub const SCRIPT_KEYS: ScriptKeys = ScriptKeys {
    metadata_file: METADATA_FILE,
    deploy_section: DEPLOY_SECTION,
    folder_key: FOLDER_KEY,
    checksum_key: CHECKSUM_KEY,
    staging_suffix: STAGING_SUFFIX,
    retired_suffix: RETIRED_SUFFIX,
};

/// Version of this tool, recorded as `build.builder_version`.
pub const BUILDER_VERSION: &str = env!("CARGO_PKG_VERSION");
