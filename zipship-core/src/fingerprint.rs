//! Dependency-manifest fingerprint — CRC-32 of the resolved lock bytes.
//!
//! Used as the sole rebuild/redeploy signal. Not a cryptographic digest;
//! collisions are accepted.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use flate2::Crc;
use serde::{Deserialize, Serialize};

/// CRC-32 of a dependency manifest, embedded in metadata as its decimal form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub u32);

impl Fingerprint {
    /// Fingerprint `manifest`. Total over any byte sequence, including empty input.
    pub fn of(manifest: &[u8]) -> Self {
        let mut crc = Crc::new();
        crc.update(manifest);
        Fingerprint(crc.sum())
    }

    /// Exact comparison against the string form stored in metadata.
    pub fn matches(&self, recorded: &str) -> bool {
        recorded.trim() == self.to_string()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Fingerprint {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Fingerprint)
    }
}

/// Free-function form of [`Fingerprint::of`].
pub fn fingerprint(manifest: &[u8]) -> Fingerprint {
    Fingerprint::of(manifest)
}

/// Exact equality of two fingerprints.
pub fn equal(a: Fingerprint, b: Fingerprint) -> bool {
    a == b
}
