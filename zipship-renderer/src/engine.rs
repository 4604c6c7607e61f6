//! Tera rendering engine — [`ScriptKind`] enum and [`Renderer`].
//!
//! # Archive entries produced
//!
//! | Script     | Archive entry  | Template                    |
//! |------------|----------------|-----------------------------|
//! | EntryPoint | `__main__.py`  | `deploy/main.py.tera`       |

use tera::Tera;

use zipship_core::keys::ENTRY_POINT_FILE;

use crate::context::TemplateContext;
use crate::error::RenderError;

// ---------------------------------------------------------------------------
// Embedded templates — baked into the binary at compile time via include_str!
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[(
    "deploy/main.py.tera",
    include_str!("templates/deploy_main.py.tera"),
)];

fn build_tera() -> Result<Tera, RenderError> {
    let mut tera = Tera::default();
    tera.autoescape_on(vec![]);
    tera.add_raw_templates(TPLS.iter().map(|(name, content)| (*name, *content)))?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// ScriptKind
// ---------------------------------------------------------------------------

/// Generated scripts embedded in an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    /// The deployment synchronizer run when the archive is executed.
    EntryPoint,
}

impl ScriptKind {
    /// All script variants in a stable order.
    pub fn all() -> &'static [ScriptKind] {
        &[ScriptKind::EntryPoint]
    }

    pub fn template_name(&self) -> &'static str {
        match self {
            ScriptKind::EntryPoint => "deploy/main.py.tera",
        }
    }

    /// Entry name inside the archive.
    pub fn archive_entry(&self) -> &'static str {
        match self {
            ScriptKind::EntryPoint => ENTRY_POINT_FILE,
        }
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Tera-based renderer for archive scripts.
///
/// Uses embedded templates only. Create once with [`Renderer::new`] and reuse.
/// Templates referencing a name absent from the context fail to render.
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// Construct a new [`Renderer`] with embedded templates.
    pub fn new() -> Result<Self, RenderError> {
        Ok(Renderer { tera: build_tera()? })
    }

    /// Render `kind` with the given context. Line endings are normalised to LF.
    pub fn render(&self, ctx: &TemplateContext, kind: ScriptKind) -> Result<String, RenderError> {
        let tera_ctx = ctx.to_tera_context()?;
        let content = self.tera.render(kind.template_name(), &tera_ctx)?;
        Ok(content.replace("\r\n", "\n"))
    }

    /// Render the deployment entry point for an archive built against `python_version`.
    pub fn render_entry_point(&self, python_version: &str) -> Result<String, RenderError> {
        self.render(&TemplateContext::new(python_version), ScriptKind::EntryPoint)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
