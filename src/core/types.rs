// Basic types for the simulated chain

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Width of a block hash in bytes (SHA-1, 160 bits)
pub const HASH_LEN: usize = 20;

/// 160-bit block hash
/// Used both as a block's identity and as the parent link of its children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct BlockHash(pub [u8; HASH_LEN]);

impl BlockHash {
    /// Create a new BlockHash from a byte array
    pub fn new(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Create a BlockHash from a slice
    pub fn from_slice(slice: &[u8]) -> Result<Self, String> {
        if slice.len() != HASH_LEN {
            return Err(format!(
                "Invalid hash length: expected {}, got {}",
                HASH_LEN,
                slice.len()
            ));
        }
        let mut bytes = [0u8; HASH_LEN];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Zero hash (the genesis block's prev_hash sentinel)
    pub fn zero() -> Self {
        Self([0u8; HASH_LEN])
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, String> {
        let bytes = hex::decode(hex_str).map_err(|e| format!("Invalid hex string: {}", e))?;
        Self::from_slice(&bytes)
    }

    /// First 8 hex characters, for compact display
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Number of leading zero bits when the digest is read as a binary string
    pub fn leading_zero_bits(&self) -> u32 {
        let mut zeros = 0;

        for byte in &self.0 {
            if *byte == 0 {
                zeros += 8;
            } else {
                zeros += byte.leading_zeros();
                break;
            }
        }

        zeros
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for BlockHash {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s.trim())
    }
}

impl Serialize for BlockHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for BlockHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_hash_zero() {
        let zero = BlockHash::zero();
        assert_eq!(zero.as_bytes(), &[0u8; HASH_LEN]);
        assert!(zero.is_zero());
        assert_eq!(zero.leading_zero_bits(), 160);
    }

    #[test]
    fn test_block_hash_hex() {
        let mut bytes = [0u8; HASH_LEN];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = (i as u8) * 13;
        }
        let hash = BlockHash::new(bytes);
        let hex = hash.to_hex();
        assert_eq!(hex.len(), 40);
        assert_eq!(BlockHash::from_hex(&hex).unwrap(), hash);
        assert_eq!(hex.parse::<BlockHash>().unwrap(), hash);
    }

    #[test]
    fn test_from_hex_rejects_wrong_length() {
        assert!(BlockHash::from_hex("abcd").is_err());
        assert!(BlockHash::from_hex("zz").is_err());
    }

    #[test]
    fn test_leading_zero_bits() {
        let mut bytes = [0xffu8; HASH_LEN];
        assert_eq!(BlockHash::new(bytes).leading_zero_bits(), 0);

        bytes[0] = 0x0f; // 00001111
        assert_eq!(BlockHash::new(bytes).leading_zero_bits(), 4);

        bytes[0] = 0x00;
        bytes[1] = 0x80; // 00000000 10000000
        assert_eq!(BlockHash::new(bytes).leading_zero_bits(), 8);

        bytes[1] = 0x01;
        assert_eq!(BlockHash::new(bytes).leading_zero_bits(), 15);
    }

    #[test]
    fn test_serde_as_hex_string() {
        let hash = BlockHash::new([0xab; HASH_LEN]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(HASH_LEN)));

        let back: BlockHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
