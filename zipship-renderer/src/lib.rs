//! # zipship-renderer
//!
//! Tera-based template engine that renders the scripts embedded in an archive,
//! driven by the shared key table in [`zipship_core::keys`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use zipship_renderer::Renderer;
//!
//! fn entry_point() -> Option<String> {
//!     let renderer = Renderer::new().ok()?;
//!     renderer.render_entry_point("3.12.1").ok()
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::TemplateContext;
pub use engine::{Renderer, ScriptKind};
pub use error::RenderError;
