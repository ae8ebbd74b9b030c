use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// blake3 digest of everything a cached record was derived from.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn short(&self) -> String {
        self.0[..6].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

/// Accumulates stage inputs into a [`Fingerprint`].
///
/// Every field is length- or width-prefixed so that adjacent values
/// cannot run into each other.
pub struct FingerprintBuilder {
    hasher: blake3::Hasher,
}

impl FingerprintBuilder {
    /// `domain` separates fingerprints of different stages.
    pub fn new(domain: &str) -> Self {
        let mut builder = Self {
            hasher: blake3::Hasher::new(),
        };
        builder.push_bytes(domain.as_bytes());
        builder
    }

    pub fn bytes(mut self, value: &[u8]) -> Self {
        self.push_bytes(value);
        self
    }

    pub fn str(self, value: &str) -> Self {
        self.bytes(value.as_bytes())
    }

    pub fn path(self, value: &Path) -> Self {
        let text = value.to_string_lossy();
        self.str(&text)
    }

    pub fn u64(mut self, value: u64) -> Self {
        self.hasher.update(&value.to_le_bytes());
        self
    }

    pub fn f64(mut self, value: f64) -> Self {
        self.hasher.update(&value.to_bits().to_le_bytes());
        self
    }

    pub fn fingerprint(mut self, value: &Fingerprint) -> Self {
        self.hasher.update(value.as_bytes());
        self
    }

    pub fn finish(self) -> Fingerprint {
        Fingerprint(*self.hasher.finalize().as_bytes())
    }

    fn push_bytes(&mut self, value: &[u8]) {
        self.hasher.update(&(value.len() as u64).to_le_bytes());
        self.hasher.update(value);
    }
}
