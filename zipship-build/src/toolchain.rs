//! External collaborators: the dependency resolver and the bytecode precompiler.
//!
//! Both are capabilities handed to the builder so tests can swap in fakes.
//! The command-backed implementations block until the child exits; no
//! timeout is applied.

use std::path::Path;
use std::process::{Command, Output};

use zipship_core::{Project, ToolSettings};

use crate::error::BuildError;

/// Produces the resolved dependency manifest for a project.
pub trait Resolver {
    /// Resolved lock bytes (stdout of the resolver).
    fn resolve(&self, project: &Project) -> Result<Vec<u8>, BuildError>;

    /// Bring the project's virtual environment in line with its descriptor.
    fn sync_environment(&self, _project: &Project) -> Result<(), BuildError> {
        Ok(())
    }
}

/// Where compiled bytecode lands relative to its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BytecodeLayout {
    /// `__pycache__/<name>.<tag>.pyc`
    Cache,
    /// `<name>.pyc` beside the source file.
    Legacy,
}

/// Compiles every source file under a directory in place.
pub trait Precompiler {
    fn precompile(&self, dir: &Path, optimize: u8, layout: BytecodeLayout) -> Result<(), BuildError>;

    /// Version of the target runtime, recorded as `build.python_version`.
    fn runtime_version(&self) -> Option<String> {
        None
    }
}

// ---------------------------------------------------------------------------
// uv
// ---------------------------------------------------------------------------

/// Runs `uv pip compile <project file>`, or the configured resolver argv.
#[derive(Debug, Clone, Default)]
pub struct UvResolver {
    argv: Option<Vec<String>>,
}

impl UvResolver {
    pub fn new(argv: Option<Vec<String>>) -> Self {
        UvResolver {
            argv: argv.filter(|a| !a.is_empty()),
        }
    }

    pub fn from_settings(settings: &ToolSettings) -> Self {
        Self::new(settings.resolver.clone())
    }

    fn argv(&self, project: &Project) -> Vec<String> {
        match &self.argv {
            Some(argv) => argv.clone(),
            None => vec![
                "uv".to_string(),
                "pip".to_string(),
                "compile".to_string(),
                project.project_file.to_string_lossy().into_owned(),
            ],
        }
    }
}

impl Resolver for UvResolver {
    fn resolve(&self, project: &Project) -> Result<Vec<u8>, BuildError> {
        let argv = self.argv(project);
        let output = run(&argv, &project.root).map_err(|reason| BuildError::ResolutionFailed {
            command: argv.join(" "),
            reason,
        })?;
        Ok(output.stdout)
    }

    fn sync_environment(&self, project: &Project) -> Result<(), BuildError> {
        let argv = vec!["uv".to_string(), "sync".to_string()];
        run(&argv, &project.root).map_err(|reason| BuildError::ResolutionFailed {
            command: argv.join(" "),
            reason,
        })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// compileall
// ---------------------------------------------------------------------------

/// Runs `<python> -m compileall -q -o <level> [-b] <dir>`.
#[derive(Debug, Clone)]
pub struct PythonPrecompiler {
    python: String,
}

impl PythonPrecompiler {
    pub fn new(python: impl Into<String>) -> Self {
        PythonPrecompiler {
            python: python.into(),
        }
    }

    pub fn from_settings(settings: &ToolSettings) -> Self {
        Self::new(settings.python.clone())
    }
}

impl Precompiler for PythonPrecompiler {
    fn precompile(&self, dir: &Path, optimize: u8, layout: BytecodeLayout) -> Result<(), BuildError> {
        let mut argv = vec![
            self.python.clone(),
            "-m".to_string(),
            "compileall".to_string(),
            "-q".to_string(),
            "-o".to_string(),
            optimize.to_string(),
        ];
        if layout == BytecodeLayout::Legacy {
            argv.push("-b".to_string());
        }
        argv.push(dir.to_string_lossy().into_owned());

        tracing::debug!(command = %argv.join(" "), "precompiling");
        run(&argv, dir).map_err(|reason| BuildError::PrecompileFailed {
            dir: dir.to_path_buf(),
            reason,
        })?;
        Ok(())
    }

    fn runtime_version(&self) -> Option<String> {
        let output = Command::new(&self.python).arg("--version").output().ok()?;
        if !output.status.success() {
            return None;
        }
        // Older interpreters print the banner on stderr.
        let text = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        parse_version_banner(&String::from_utf8_lossy(&text))
    }
}

fn parse_version_banner(banner: &str) -> Option<String> {
    let version = banner.trim().strip_prefix("Python ")?.trim();
    (!version.is_empty()).then(|| version.to_string())
}

/// Run `argv` in `cwd` to completion. `Err` carries a human-readable reason.
fn run(argv: &[String], cwd: &Path) -> Result<Output, String> {
    let (program, args) = argv.split_first().ok_or_else(|| "empty command".to_string())?;
    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .output()
        .map_err(|e| format!("could not start `{program}`: {e}"))?;

    if output.status.success() {
        Ok(output)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(if stderr.is_empty() {
            output.status.to_string()
        } else {
            format!("{}: {stderr}", output.status)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_banner_parsed() {
        assert_eq!(parse_version_banner("Python 3.12.1\n"), Some("3.12.1".to_string()));
        assert_eq!(parse_version_banner("pypy"), None);
        assert_eq!(parse_version_banner("Python "), None);
    }

    #[test]
    fn empty_resolver_argv_falls_back_to_uv() {
        let resolver = UvResolver::new(Some(vec![]));
        assert!(resolver.argv.is_none());
    }

    #[test]
    fn run_rejects_empty_command() {
        assert!(run(&[], Path::new(".")).is_err());
    }

    #[test]
    fn missing_program_is_a_resolution_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("pyproject.toml"),
            "[project]\nname = \"demo\"\nversion = \"1\"\n",
        )
        .unwrap();
        let project = Project::load(dir.path()).unwrap();
        let resolver = UvResolver::new(Some(vec!["zipship-no-such-resolver".to_string()]));

        let err = resolver.resolve(&project).unwrap_err();
        assert!(matches!(err, BuildError::ResolutionFailed { .. }));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn missing_interpreter_is_a_precompile_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let precompiler = PythonPrecompiler::new("zipship-no-such-python");
        let err = precompiler
            .precompile(dir.path(), 2, BytecodeLayout::Cache)
            .unwrap_err();
        assert_eq!(err.exit_code(), 99);
        assert!(precompiler.runtime_version().is_none());
    }
}
