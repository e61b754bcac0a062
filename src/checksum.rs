//! Checksum utilities for store and backup integrity

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA256 checksum of store bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute checksum of a rendered store document
    pub fn of_text(content: &str) -> Self {
        Self::from_bytes(content.as_bytes())
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form used in reports
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }

    /// Verify that bytes match this checksum
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::from_bytes(data) == *self
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_consistency() {
        let content = r##"{"color": {"brand": {"value": "#FFFFFF"}}}"##;
        assert_eq!(Checksum::of_text(content), Checksum::of_text(content));
    }

    #[test]
    fn test_checksum_different_content() {
        assert_ne!(Checksum::of_text("{}"), Checksum::of_text("{ }"));
    }

    #[test]
    fn test_checksum_verification() {
        let checksum = Checksum::from_bytes(b"tokens");
        assert!(checksum.verify(b"tokens"));
        assert!(!checksum.verify(b"tokens\n"));
        assert_eq!(checksum.short().len(), 12);
    }
}
