//! Object identifiers
//!
//! An `ObjectId` is the 20-byte SHA-1 digest of an object's framed byte
//! form, rendered as 40 lowercase hex characters. Identifiers are
//! write-once: two objects are identical iff their ids match.

use crate::artifacts::core::errors::GitError;
use crate::artifacts::core::hasher::DIGEST_SIZE;
use std::io::{Read, Write};
use std::path::PathBuf;

/// Length of the hex rendering
pub const HEX_SIZE: usize = 2 * DIGEST_SIZE;

/// Number of hex characters shown in abbreviated output
const SHORT_SIZE: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ObjectId([u8; DIGEST_SIZE]);

impl ObjectId {
    pub fn from_raw(raw: [u8; DIGEST_SIZE]) -> Self {
        ObjectId(raw)
    }

    pub fn as_raw(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    /// The all-zeros id used by reflog entries for creation and deletion
    pub fn zero() -> Self {
        ObjectId::default()
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; DIGEST_SIZE]
    }

    /// Parse a 40-character lowercase hex rendering
    pub fn try_parse(id: &str) -> anyhow::Result<Self> {
        if id.len() != HEX_SIZE {
            return Err(
                GitError::InvalidArgument(format!("invalid object id length: {}", id.len())).into(),
            );
        }

        let mut raw = [0u8; DIGEST_SIZE];
        for (i, byte) in raw.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&id[2 * i..2 * i + 2], 16).map_err(|_| {
                GitError::InvalidArgument(format!("invalid object id characters: {id}"))
            })?;
        }

        Ok(ObjectId(raw))
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn to_short_oid(&self) -> String {
        self.to_hex()[..SHORT_SIZE].to_string()
    }

    /// Relative storage path under the objects directory (`ab/cdef...`)
    pub fn to_path(&self) -> PathBuf {
        let hex = self.to_hex();
        PathBuf::from(&hex[..2]).join(&hex[2..])
    }

    /// Read the 20 raw digest bytes from a reader
    pub fn read_raw_from(reader: &mut impl Read) -> anyhow::Result<Self> {
        let mut raw = [0u8; DIGEST_SIZE];
        reader
            .read_exact(&mut raw)
            .map_err(|_| GitError::MalformedObject("truncated object id".to_string()))?;
        Ok(ObjectId(raw))
    }

    /// Write the 20 raw digest bytes to a writer
    pub fn write_raw_to(&self, writer: &mut impl Write) -> anyhow::Result<()> {
        writer.write_all(&self.0)?;
        Ok(())
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for ObjectId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::proptest;

    #[test]
    fn test_parse_and_render_round_trip() {
        let hex = "da39a3ee5e6b4b0d3255bfef95601890afd80709";
        let oid = ObjectId::try_parse(hex).unwrap();

        assert_eq!(oid.to_hex(), hex);
        assert_eq!(oid.to_short_oid(), "da39a3e");
        assert_eq!(
            oid.to_path(),
            PathBuf::from("da").join("39a3ee5e6b4b0d3255bfef95601890afd80709")
        );
    }

    #[test]
    fn test_binary_round_trip() {
        let oid = ObjectId::try_parse("2aae6c35c94fcfb415dbe95f408b9ce91ee846ed").unwrap();

        let mut bytes = Vec::new();
        oid.write_raw_to(&mut bytes).unwrap();
        assert_eq!(bytes.len(), DIGEST_SIZE);

        let read = ObjectId::read_raw_from(&mut std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(read, oid);
    }

    #[test]
    fn test_zero_sentinel() {
        assert!(ObjectId::zero().is_zero());
        assert_eq!(
            ObjectId::zero().to_hex(),
            "0000000000000000000000000000000000000000"
        );
    }

    proptest! {
        #[test]
        fn test_rejects_wrong_lengths(id in "[0-9a-f]{0,39}") {
            assert!(ObjectId::try_parse(&id).is_err());
        }

        #[test]
        fn test_rejects_non_hex(id in "[g-z]{40}") {
            assert!(ObjectId::try_parse(&id).is_err());
        }
    }
}
