//! Content-derived node addresses.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Deterministic fingerprint of a node's position in its tree.
///
/// The root's address is the SHA-256 of the empty string. Every other node's
/// address is the SHA-256 of its parent's hex address followed by its step
/// name. Addresses depend on nothing but step names, so they survive process
/// restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Address of a tree root.
    #[must_use]
    pub fn root() -> Self {
        Self(digest(""))
    }

    /// Address of the child named `name` under this address.
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        Self(digest(&format!("{}{name}", self.0)))
    }

    /// Hex representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Address {
    fn from(hex: String) -> Self {
        Self(hex)
    }
}

fn digest(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}
