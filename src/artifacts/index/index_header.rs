use crate::artifacts::index::{SIGNATURE, VERSION};
use byteorder::{ByteOrder, WriteBytesExt};
use bytes::Bytes;
use derive_new::new;

use crate::artifacts::core::errors::GitError;
use crate::artifacts::index::HEADER_SIZE;

/// Index file header: signature, version, entry count
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct IndexHeader {
    pub marker: String,
    pub version: u32,
    pub entries_count: u32,
}

impl IndexHeader {
    pub fn empty() -> Self {
        IndexHeader::new(SIGNATURE.to_string(), VERSION, 0)
    }

    pub fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE);
        bytes.extend_from_slice(self.marker.as_bytes());
        bytes.write_u32::<byteorder::NetworkEndian>(self.version)?;
        bytes.write_u32::<byteorder::NetworkEndian>(self.entries_count)?;
        Ok(Bytes::from(bytes))
    }

    pub fn deserialize(bytes: &[u8]) -> anyhow::Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(GitError::corrupt("index", "truncated header").into());
        }

        let marker = std::str::from_utf8(&bytes[0..4])
            .map_err(|_| GitError::corrupt("index", "invalid signature"))?
            .to_string();
        let version = byteorder::NetworkEndian::read_u32(&bytes[4..8]);
        let entries_count = byteorder::NetworkEndian::read_u32(&bytes[8..12]);

        Ok(IndexHeader::new(marker, version, entries_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip() {
        let header = IndexHeader::new(SIGNATURE.to_string(), VERSION, 42);
        let bytes = header.serialize().unwrap();

        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(IndexHeader::deserialize(&bytes).unwrap(), header);
    }
}
