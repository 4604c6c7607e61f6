//! Metadata codec — the flat, INI-style build record embedded in every archive.
//!
//! # Format
//!
//! ```text
//! [project]
//! name = demo
//! version = 1.0.0
//!
//! [build]
//! created = 2024-05-01T12:00:00+00:00
//! ...
//!
//! [deploy]
//! folder = deploy
//! checksum = 3632233996
//! archive = demo.bin.linux.zip
//! ```
//!
//! Keys are case-sensitive. The reader accepts `=` or `:` separators,
//! `#`/`;` comment lines, indented continuation lines and unknown
//! sections/keys. Leading and trailing whitespace inside a value is kept.
//! Values are single-line on write; embedded newlines are folded to spaces,
//! so multi-line text does not round-trip.
//!
//! Structured values (the dependency list, the runtime version) are stored
//! in their canonical string form and decode back to that string only.

use std::collections::BTreeMap;
use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::MetadataError;
use crate::fingerprint::Fingerprint;
use crate::keys::{
    ARCHIVE_KEY, ARCHIVE_SECTION, BUILDER_VERSION, BUILDER_VERSION_KEY, BUILD_SECTION,
    CHECKSUM_KEY, CREATED_KEY, DEPENDENCIES_KEY, DEPLOY_SECTION, DESCRIPTION_KEY, FOLDER_KEY,
    MACHINE_KEY, NAME_KEY, PROJECT_SECTION, PYTHON_KEY, PYTHON_SECTION, PYTHON_VERSION_KEY,
    USER_KEY, VERSION_KEY,
};

// ---------------------------------------------------------------------------
// IniDocument
// ---------------------------------------------------------------------------

type Entries = Vec<(String, String)>;

/// Ordered section → key/value document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    sections: Vec<(String, Entries)>,
}

impl IniDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `key` in `section`, creating the section if needed.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        let value = value.into();
        let entries = self.section_mut(section);
        match entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => entries.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section)?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn section(&self, name: &str) -> Option<&[(String, String)]> {
        self.sections
            .iter()
            .find(|(s, _)| s == name)
            .map(|(_, entries)| entries.as_slice())
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.section(name).is_some()
    }

    /// Sections in document order.
    pub fn sections(&self) -> impl Iterator<Item = (&str, &[(String, String)])> {
        self.sections
            .iter()
            .map(|(name, entries)| (name.as_str(), entries.as_slice()))
    }

    /// Value of `section.key`, or the matching [`MetadataError`].
    pub fn require(&self, section: &str, key: &str) -> Result<&str, MetadataError> {
        let entries = self
            .section(section)
            .ok_or_else(|| MetadataError::MissingSection {
                section: section.to_string(),
            })?;
        entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .ok_or_else(|| MetadataError::MissingKey {
                section: section.to_string(),
                key: key.to_string(),
            })
    }

    /// Parse raw bytes; non-UTF-8 input is an [`MetadataError::Encoding`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MetadataError> {
        Self::parse(std::str::from_utf8(bytes)?)
    }

    pub fn parse(text: &str) -> Result<Self, MetadataError> {
        let mut doc = IniDocument::new();
        let mut current: Option<String> = None;
        let mut last_key: Option<String> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            // Continuation of the previous value.
            if raw.starts_with([' ', '\t']) {
                if let (Some(section), Some(key)) = (current.as_deref(), last_key.as_deref()) {
                    let joined = match doc.get(section, key) {
                        Some(prev) if !prev.is_empty() => format!("{prev}\n{line}"),
                        _ => line.to_string(),
                    };
                    doc.set(section, key, joined);
                    continue;
                }
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let name = name.trim().to_string();
                doc.section_mut(&name);
                current = Some(name);
                last_key = None;
                continue;
            }

            let syntax = || MetadataError::Syntax {
                line: idx + 1,
                content: raw.to_string(),
            };
            let Some(section) = current.as_deref() else {
                return Err(syntax());
            };
            let Some(split) = raw.find(['=', ':']) else {
                return Err(syntax());
            };
            let key = raw[..split].trim();
            if key.is_empty() {
                return Err(syntax());
            }
            doc.set(section, key, value_text(&raw[split + 1..]));
            last_key = Some(key.to_string());
        }
        Ok(doc)
    }

    /// Nested map view, used for JSON output.
    pub fn to_map(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        self.sections
            .iter()
            .map(|(name, entries)| (name.clone(), entries.iter().cloned().collect()))
            .collect()
    }

    fn section_mut(&mut self, name: &str) -> &mut Entries {
        let pos = match self.sections.iter().position(|(s, _)| s == name) {
            Some(pos) => pos,
            None => {
                self.sections.push((name.to_string(), Vec::new()));
                self.sections.len() - 1
            }
        };
        &mut self.sections[pos].1
    }
}

impl fmt::Display for IniDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, entries) in &self.sections {
            writeln!(f, "[{name}]")?;
            for (key, value) in entries {
                writeln!(f, "{key} = {}", single_line(value))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Drop the one separator space the writer emits; the rest is the value.
fn value_text(rest: &str) -> &str {
    rest.strip_prefix([' ', '\t']).unwrap_or(rest)
}

fn single_line(value: &str) -> String {
    value.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// `[project]` — identity of the packaged project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// `[build]` — when, where and with what the archive was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub created: String,
    pub machine: String,
    pub user: String,
    pub builder_version: String,
    pub python_version: String,
}

impl BuildInfo {
    /// Snapshot of the current host, clock and tool version.
    pub fn capture(python_version: impl Into<String>) -> Self {
        BuildInfo {
            created: Utc::now().to_rfc3339(),
            machine: whoami::fallible::hostname().unwrap_or_else(|_| "unknown".to_string()),
            user: whoami::username(),
            builder_version: BUILDER_VERSION.to_string(),
            python_version: python_version.into(),
        }
    }
}

/// `[deploy]` — the fields the deployment synchronizer consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployInfo {
    pub folder: String,
    pub checksum: String,
    pub archive: String,
}

impl DeployInfo {
    pub fn new(folder: impl Into<String>, checksum: Fingerprint, archive: impl Into<String>) -> Self {
        DeployInfo {
            folder: folder.into(),
            checksum: checksum.to_string(),
            archive: archive.into(),
        }
    }
}

/// `[python]` — target runtime requirement and the declared dependency list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PythonInfo {
    pub python: String,
    /// Canonical JSON array text of the declared dependencies.
    pub dependencies: String,
}

impl PythonInfo {
    pub fn new(python: impl Into<String>, dependencies: &[String]) -> Self {
        PythonInfo {
            python: python.into(),
            dependencies: serde_json::to_string(dependencies).unwrap_or_else(|_| "[]".to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// BuildMetadata
// ---------------------------------------------------------------------------

/// The record embedded in a dependency archive and copied into its deploy folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildMetadata {
    pub project: ProjectInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python: Option<PythonInfo>,
    pub build: BuildInfo,
    pub deploy: DeployInfo,
}

impl BuildMetadata {
    pub fn to_document(&self) -> IniDocument {
        let mut doc = IniDocument::new();
        write_project(&mut doc, &self.project);
        if let Some(python) = &self.python {
            write_python(&mut doc, python);
        }
        write_build(&mut doc, &self.build);
        doc.set(DEPLOY_SECTION, FOLDER_KEY, &self.deploy.folder);
        doc.set(DEPLOY_SECTION, CHECKSUM_KEY, &self.deploy.checksum);
        doc.set(DEPLOY_SECTION, ARCHIVE_KEY, &self.deploy.archive);
        doc
    }

    pub fn from_document(doc: &IniDocument) -> Result<Self, MetadataError> {
        Ok(BuildMetadata {
            project: read_project(doc)?,
            python: read_python(doc)?,
            build: read_build(doc)?,
            deploy: DeployInfo {
                folder: doc.require(DEPLOY_SECTION, FOLDER_KEY)?.to_string(),
                checksum: doc.require(DEPLOY_SECTION, CHECKSUM_KEY)?.to_string(),
                archive: doc.require(DEPLOY_SECTION, ARCHIVE_KEY)?.to_string(),
            },
        })
    }

    pub fn encode(&self) -> String {
        self.to_document().to_string()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, MetadataError> {
        Self::from_document(&IniDocument::from_bytes(bytes)?)
    }

    pub fn decode_str(text: &str) -> Result<Self, MetadataError> {
        Self::from_document(&IniDocument::parse(text)?)
    }
}

/// The record embedded in a source-tree archive. It has no `[deploy]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub project: ProjectInfo,
    pub python: PythonInfo,
    pub archive: String,
    pub build: BuildInfo,
}

impl SourceMetadata {
    pub fn to_document(&self) -> IniDocument {
        let mut doc = IniDocument::new();
        write_project(&mut doc, &self.project);
        write_python(&mut doc, &self.python);
        doc.set(ARCHIVE_SECTION, ARCHIVE_KEY, &self.archive);
        write_build(&mut doc, &self.build);
        doc
    }

    pub fn from_document(doc: &IniDocument) -> Result<Self, MetadataError> {
        let python = read_python(doc)?.ok_or_else(|| MetadataError::MissingSection {
            section: PYTHON_SECTION.to_string(),
        })?;
        Ok(SourceMetadata {
            project: read_project(doc)?,
            python,
            archive: doc.require(ARCHIVE_SECTION, ARCHIVE_KEY)?.to_string(),
            build: read_build(doc)?,
        })
    }

    pub fn encode(&self) -> String {
        self.to_document().to_string()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, MetadataError> {
        Self::from_document(&IniDocument::from_bytes(bytes)?)
    }
}

fn write_project(doc: &mut IniDocument, project: &ProjectInfo) {
    doc.set(PROJECT_SECTION, NAME_KEY, &project.name);
    doc.set(PROJECT_SECTION, VERSION_KEY, &project.version);
    if let Some(description) = &project.description {
        doc.set(PROJECT_SECTION, DESCRIPTION_KEY, description);
    }
}

fn read_project(doc: &IniDocument) -> Result<ProjectInfo, MetadataError> {
    Ok(ProjectInfo {
        name: doc.require(PROJECT_SECTION, NAME_KEY)?.to_string(),
        version: doc.require(PROJECT_SECTION, VERSION_KEY)?.to_string(),
        description: doc.get(PROJECT_SECTION, DESCRIPTION_KEY).map(str::to_string),
    })
}

fn write_python(doc: &mut IniDocument, python: &PythonInfo) {
    doc.set(PYTHON_SECTION, PYTHON_KEY, &python.python);
    doc.set(PYTHON_SECTION, DEPENDENCIES_KEY, &python.dependencies);
}

fn read_python(doc: &IniDocument) -> Result<Option<PythonInfo>, MetadataError> {
    if !doc.has_section(PYTHON_SECTION) {
        return Ok(None);
    }
    Ok(Some(PythonInfo {
        python: doc.require(PYTHON_SECTION, PYTHON_KEY)?.to_string(),
        dependencies: doc.require(PYTHON_SECTION, DEPENDENCIES_KEY)?.to_string(),
    }))
}

fn write_build(doc: &mut IniDocument, build: &BuildInfo) {
    doc.set(BUILD_SECTION, CREATED_KEY, &build.created);
    doc.set(BUILD_SECTION, MACHINE_KEY, &build.machine);
    doc.set(BUILD_SECTION, USER_KEY, &build.user);
    doc.set(BUILD_SECTION, BUILDER_VERSION_KEY, &build.builder_version);
    doc.set(BUILD_SECTION, PYTHON_VERSION_KEY, &build.python_version);
}

fn read_build(doc: &IniDocument) -> Result<BuildInfo, MetadataError> {
    Ok(BuildInfo {
        created: doc.require(BUILD_SECTION, CREATED_KEY)?.to_string(),
        machine: doc.require(BUILD_SECTION, MACHINE_KEY)?.to_string(),
        user: doc.require(BUILD_SECTION, USER_KEY)?.to_string(),
        builder_version: doc.require(BUILD_SECTION, BUILDER_VERSION_KEY)?.to_string(),
        python_version: doc.require(BUILD_SECTION, PYTHON_VERSION_KEY)?.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
