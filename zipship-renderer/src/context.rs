//! Template context — the serializable rendering payload for the entry point.

use serde::{Deserialize, Serialize};

use zipship_core::keys::{self, ScriptKeys, SCRIPT_KEYS};

use crate::error::RenderError;

/// Rendering payload for the entry-point script.
///
/// `keys` comes straight from [`zipship_core::keys::SCRIPT_KEYS`]; the template
/// never spells a metadata key itself.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateContext {
    pub keys: ScriptKeys,
    pub meta: MetaCtx,
}

/// Provenance stamped into the script header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaCtx {
    pub builder_version: String,
    pub python_version: String,
}

impl TemplateContext {
    /// Context for an archive built against `python_version`.
    ///
    /// The version lands inside a comment line, so it is collapsed to a
    /// single line first.
    pub fn new(python_version: &str) -> Self {
        TemplateContext {
            keys: SCRIPT_KEYS,
            meta: MetaCtx {
                builder_version: keys::BUILDER_VERSION.to_string(),
                python_version: python_version.split_whitespace().collect::<Vec<_>>().join(" "),
            },
        }
    }

    /// Convert to a [`tera::Context`] for rendering.
    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(RenderError::from)
    }
}
