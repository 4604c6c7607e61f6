//! Error types for zipship-renderer.

use thiserror::Error;

/// Failures while instantiating an embedded script.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The template failed to parse, referenced a name missing from the
    /// context, or the context itself could not be serialized.
    #[error("script template error: {0}")]
    Tera(#[from] tera::Error),
}
