//! Content fingerprints for declarations
//!
//! Provides [`Checksum`], a strongly-typed 32-byte Blake3 digest of the raw
//! declaration bytes. Used to tell a re-declared artefact with new content
//! apart from an unchanged one.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A 32-byte content checksum (Blake3)
///
/// Immutable and cheap to clone (Copy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Checksum([u8; 32]);

impl Checksum {
    /// Create a checksum from raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get reference to the underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Compute the checksum of arbitrary content
    #[inline]
    #[must_use]
    pub fn compute(content: &[u8]) -> Self {
        Self::new(*blake3::hash(content).as_bytes())
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for Checksum {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Errors when decoding a checksum from its hex form
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChecksumError {
    /// Input is not valid hex
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// Input does not decode to 32 bytes
    #[error("invalid length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

impl FromStr for Checksum {
    type Err = ChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| ChecksumError::InvalidHex(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| ChecksumError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

impl serde::Serialize for Checksum {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Checksum {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_deterministic() {
        assert_eq!(Checksum::compute(b"abc"), Checksum::compute(b"abc"));
        assert_ne!(Checksum::compute(b"abc"), Checksum::compute(b"abd"));
    }

    #[test]
    fn checksum_hex_roundtrip() {
        let sum = Checksum::compute(b"{\"name\":\"orders\"}");
        let parsed: Checksum = sum.to_string().parse().unwrap();
        assert_eq!(parsed, sum);
        assert_eq!(sum.short().len(), 16);
    }

    #[test]
    fn checksum_rejects_bad_input() {
        assert!(matches!(
            "zz".parse::<Checksum>(),
            Err(ChecksumError::InvalidHex(_))
        ));
        assert!(matches!(
            "abcd".parse::<Checksum>(),
            Err(ChecksumError::InvalidLength(2))
        ));
    }
}
