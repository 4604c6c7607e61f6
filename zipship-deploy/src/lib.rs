//! zipship-deploy — the deployment synchronizer.
//!
//! [`deploy`] brings a deploy folder in line with a dependency archive: fresh
//! install when absent, nothing when the saved checksum matches, full
//! replacement otherwise. The same protocol ships inside every archive as its
//! `__main__.py`.

pub mod error;
pub mod sync;

pub use error::DeployError;
pub use sync::{deploy, DeployOutcome};
