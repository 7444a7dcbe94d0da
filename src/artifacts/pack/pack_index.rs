//! Pack index files (`.idx`, version 2)
//!
//! ## Layout
//!
//! ```text
//! \xfftOc2 | version(4) | fanout: 256 x u32 cumulative counts
//! N x 20-byte oid (sorted) | N x u32 crc32 | N x u32 offset
//! large offsets: u64 each (offsets with the MSB set index this table)
//! pack checksum (20) | index checksum (20)
//! ```

use crate::artifacts::core::errors::GitError;
use crate::artifacts::core::hasher::{DIGEST_SIZE, Hasher};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::pack::{IDX_SIGNATURE, PACK_VERSION};
use anyhow::Context;
use byteorder::{ByteOrder, WriteBytesExt};
use std::io::Write;
use std::path::Path;

const FANOUT_ENTRIES: usize = 256;
const LARGE_OFFSET_FLAG: u32 = 0x8000_0000;

/// An `(oid, crc32, offset)` row of the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackIndexEntry {
    pub oid: ObjectId,
    pub crc32: u32,
    pub offset: u64,
}

/// In-memory view of a pack's index, sorted by oid
#[derive(Debug, Default)]
pub struct PackIndex {
    entries: Vec<PackIndexEntry>,
}

impl PackIndex {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("unable to read pack index {}", path.display()))?;
        Self::parse(&bytes)
    }

    fn parse(bytes: &[u8]) -> anyhow::Result<Self> {
        let header_size = 8 + 4 * FANOUT_ENTRIES;
        if bytes.len() < header_size + 2 * DIGEST_SIZE {
            return Err(GitError::CorruptPack("truncated pack index".to_string()).into());
        }
        if bytes[0..4] != IDX_SIGNATURE {
            return Err(GitError::CorruptPack("bad pack index signature".to_string()).into());
        }
        if byteorder::NetworkEndian::read_u32(&bytes[4..8]) != PACK_VERSION {
            return Err(GitError::CorruptPack("unsupported pack index version".to_string()).into());
        }

        let fanout_base = 8;
        let count = byteorder::NetworkEndian::read_u32(
            &bytes[fanout_base + 4 * (FANOUT_ENTRIES - 1)..fanout_base + 4 * FANOUT_ENTRIES],
        ) as usize;

        let oids_base = header_size;
        let crcs_base = oids_base + DIGEST_SIZE * count;
        let offsets_base = crcs_base + 4 * count;
        let large_base = offsets_base + 4 * count;
        if bytes.len() < large_base + 2 * DIGEST_SIZE {
            return Err(GitError::CorruptPack("truncated pack index tables".to_string()).into());
        }

        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            let oid_start = oids_base + DIGEST_SIZE * i;
            let mut raw = [0u8; DIGEST_SIZE];
            raw.copy_from_slice(&bytes[oid_start..oid_start + DIGEST_SIZE]);
            let oid = ObjectId::from_raw(raw);

            let crc32 = byteorder::NetworkEndian::read_u32(&bytes[crcs_base + 4 * i..]);
            let offset_word = byteorder::NetworkEndian::read_u32(&bytes[offsets_base + 4 * i..]);

            let offset = if offset_word & LARGE_OFFSET_FLAG == 0 {
                u64::from(offset_word)
            } else {
                let slot = (offset_word & !LARGE_OFFSET_FLAG) as usize;
                let start = large_base + 8 * slot;
                if bytes.len() < start + 8 + 2 * DIGEST_SIZE {
                    return Err(
                        GitError::CorruptPack("truncated large offset table".to_string()).into(),
                    );
                }
                byteorder::NetworkEndian::read_u64(&bytes[start..])
            };

            entries.push(PackIndexEntry { oid, crc32, offset });
        }

        if !entries.is_sorted_by_key(|entry| entry.oid) {
            return Err(GitError::CorruptPack("pack index oids not sorted".to_string()).into());
        }

        Ok(PackIndex { entries })
    }

    pub fn find_offset(&self, oid: &ObjectId) -> Option<u64> {
        self.entries
            .binary_search_by_key(oid, |entry| entry.oid)
            .ok()
            .map(|i| self.entries[i].offset)
    }

    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.find_offset(oid).is_some()
    }

    pub fn oids(&self) -> impl Iterator<Item = &ObjectId> {
        self.entries.iter().map(|entry| &entry.oid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize an index for `entries`, which need not be pre-sorted
    pub fn write(
        path: &Path,
        entries: &[PackIndexEntry],
        pack_checksum: &[u8; DIGEST_SIZE],
    ) -> anyhow::Result<()> {
        let mut sorted: Vec<PackIndexEntry> = entries.to_vec();
        sorted.sort_by_key(|entry| entry.oid);

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&IDX_SIGNATURE);
        bytes.write_u32::<byteorder::NetworkEndian>(PACK_VERSION)?;

        // cumulative fanout over the first oid byte
        let mut fanout = [0u32; FANOUT_ENTRIES];
        for entry in &sorted {
            fanout[entry.oid.as_raw()[0] as usize] += 1;
        }
        let mut cumulative = 0u32;
        for bucket in fanout.iter_mut() {
            cumulative += *bucket;
            *bucket = cumulative;
        }
        for bucket in fanout {
            bytes.write_u32::<byteorder::NetworkEndian>(bucket)?;
        }

        for entry in &sorted {
            bytes.write_all(entry.oid.as_raw())?;
        }
        for entry in &sorted {
            bytes.write_u32::<byteorder::NetworkEndian>(entry.crc32)?;
        }

        let mut large_offsets = Vec::new();
        for entry in &sorted {
            if entry.offset < u64::from(LARGE_OFFSET_FLAG) {
                bytes.write_u32::<byteorder::NetworkEndian>(entry.offset as u32)?;
            } else {
                let slot = large_offsets.len() as u32;
                bytes.write_u32::<byteorder::NetworkEndian>(slot | LARGE_OFFSET_FLAG)?;
                large_offsets.push(entry.offset);
            }
        }
        for offset in large_offsets {
            bytes.write_u64::<byteorder::NetworkEndian>(offset)?;
        }

        bytes.write_all(pack_checksum)?;
        let index_checksum = Hasher::hash_all(&bytes);
        bytes.write_all(&index_checksum)?;

        std::fs::write(path, &bytes)
            .with_context(|| format!("unable to write pack index {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(hex: &str, offset: u64) -> PackIndexEntry {
        PackIndexEntry {
            oid: ObjectId::try_parse(hex).unwrap(),
            crc32: 0xDEAD_BEEF,
            offset,
        }
    }

    #[test]
    fn test_write_then_load_round_trip() {
        let dir = assert_fs::TempDir::new().unwrap();
        let path = dir.path().join("pack-test.idx");

        let entries = vec![
            entry("ce013625030ba8dba906f756967f9e9ca394464a", 12),
            entry("2aae6c35c94fcfb415dbe95f408b9ce91ee846ed", 99),
            entry("da39a3ee5e6b4b0d3255bfef95601890afd80709", 310),
        ];
        PackIndex::write(&path, &entries, &[0u8; DIGEST_SIZE]).unwrap();

        let index = PackIndex::load(&path).unwrap();
        assert_eq!(index.len(), 3);
        for entry in &entries {
            assert_eq!(index.find_offset(&entry.oid), Some(entry.offset));
        }
        assert!(
            index
                .find_offset(
                    &ObjectId::try_parse("0000000000000000000000000000000000000001").unwrap()
                )
                .is_none()
        );
    }

    #[test]
    fn test_large_offsets_round_trip() {
        let dir = assert_fs::TempDir::new().unwrap();
        let path = dir.path().join("pack-large.idx");

        let big = entry("ce013625030ba8dba906f756967f9e9ca394464a", 1 << 33);
        PackIndex::write(&path, &[big], &[0u8; DIGEST_SIZE]).unwrap();

        let index = PackIndex::load(&path).unwrap();
        assert_eq!(index.find_offset(&big.oid), Some(1 << 33));
    }

    #[test]
    fn test_rejects_bad_signature() {
        let dir = assert_fs::TempDir::new().unwrap();
        let path = dir.path().join("pack-bad.idx");
        std::fs::write(&path, b"nope").unwrap();

        assert!(PackIndex::load(&path).is_err());
    }
}
