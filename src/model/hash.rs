//! Tree fingerprint type

use serde::{Deserialize, Serialize};
use std::fmt;

/// A normalized 32-bit tree fingerprint
///
/// Produced by the rolling hash over a bracketed walk of the tree. Only
/// meaningful for cheap equality/change checks, not for content addressing.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(u32);

impl Fingerprint {
    /// Create a fingerprint from a raw value
    pub fn from_u32(value: u32) -> Self {
        Fingerprint(value)
    }

    /// Normalize a signed accumulator to its unsigned bit pattern
    pub fn from_accumulator(acc: i32) -> Self {
        Fingerprint(acc as u32)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Convert to a big-endian hex string (always 8 chars)
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_be_bytes())
    }

    /// Parse from hex string
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 4] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Fingerprint(u32::from_be_bytes(arr)))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl From<Fingerprint> for u32 {
    fn from(fp: Fingerprint) -> Self {
        fp.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_accumulator_normalizes() {
        assert_eq!(Fingerprint::from_accumulator(-1).as_u32(), u32::MAX);
        assert_eq!(Fingerprint::from_accumulator(5381).as_u32(), 5381);
    }

    #[test]
    fn test_hex_is_fixed_width() {
        let fp = Fingerprint::from_u32(0xab);
        assert_eq!(fp.to_hex(), "000000ab");
        assert_eq!(Fingerprint::from_hex("000000ab").unwrap(), fp);
    }

    #[test]
    fn test_from_hex_rejects_wrong_length() {
        assert!(Fingerprint::from_hex("abcd").is_err());
    }
}
