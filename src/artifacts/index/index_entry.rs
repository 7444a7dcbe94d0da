//! Index entries
//!
//! Each entry pairs a working-tree path with a blob id, a conflict stage,
//! and the file metadata used for fast change detection.
//!
//! ## Entry format
//!
//! ```text
//! ctime(32+32) | mtime(32+32) | dev(32) | ino(32) | mode(32) | uid(32)
//! gid(32) | size(32) | oid(20 raw) | flags(16) | name | NUL padding to 8
//! ```
//!
//! The 16-bit flags word packs `stage << 12 | min(name_length, 0xFFF)`.

use crate::artifacts::core::errors::GitError;
use crate::artifacts::objects::entry_mode::EntryMode;
use crate::artifacts::objects::object_id::ObjectId;
use byteorder::{ByteOrder, WriteBytesExt};
use bytes::Bytes;
use derive_new::new;
use std::fs::Metadata;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Longest path length representable in the flags word
const MAX_PATH_SIZE: usize = 0xFFF;

/// Entries are padded to this block size
pub const ENTRY_BLOCK: usize = 8;

/// Smallest possible serialized entry
pub const ENTRY_MIN_SIZE: usize = 64;

/// Conflict stage slot for a path
///
/// Stage 0 is the merged (normal) state; stages 1/2/3 hold the base, ours,
/// and theirs versions of a conflicted path after a failed merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Stage {
    #[default]
    Merged,
    Base,
    Ours,
    Theirs,
}

impl Stage {
    pub fn as_u16(&self) -> u16 {
        match self {
            Stage::Merged => 0,
            Stage::Base => 1,
            Stage::Ours => 2,
            Stage::Theirs => 3,
        }
    }

    pub fn try_from_u16(value: u16) -> anyhow::Result<Self> {
        match value {
            0 => Ok(Stage::Merged),
            1 => Ok(Stage::Base),
            2 => Ok(Stage::Ours),
            3 => Ok(Stage::Theirs),
            _ => Err(GitError::corrupt("index", format!("invalid stage: {value}")).into()),
        }
    }
}

/// A tracked path in the staging area
#[derive(Debug, Clone, Default, new)]
pub struct IndexEntry {
    /// Path relative to the repository root
    pub name: PathBuf,
    /// Blob id of the staged content
    pub oid: ObjectId,
    pub stage: Stage,
    pub metadata: EntryMetadata,
}

impl IndexEntry {
    pub fn basename(&self) -> anyhow::Result<&str> {
        self.name
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow::anyhow!("invalid entry name: {:?}", self.name))
    }

    /// Ancestor directories of the entry, outermost first
    pub fn parent_dirs(&self) -> Vec<&Path> {
        let mut dirs: Vec<&Path> = self
            .name
            .ancestors()
            .skip(1)
            .filter(|dir| !dir.as_os_str().is_empty())
            .collect();
        dirs.reverse();
        dirs
    }

    /// True when the cheap stat identity matches: the file can be assumed
    /// unchanged without re-hashing
    pub fn stat_identity_matches(&self, other: &EntryMetadata) -> bool {
        self.metadata.ctime == other.ctime
            && self.metadata.mtime == other.mtime
            && self.metadata.dev == other.dev
            && self.metadata.ino == other.ino
            && self.metadata.size == other.size
    }
}

impl PartialEq for IndexEntry {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.stage == other.stage
    }
}

impl Eq for IndexEntry {}

impl PartialOrd for IndexEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexEntry {
    /// Index order: ascending by `(path, stage)`
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (&self.name, self.stage).cmp(&(&other.name, other.stage))
    }
}

/// File metadata captured from the working tree
///
/// Timestamps, device/inode identity, and size let the index decide that a
/// file is unchanged without reading its content. Fields the platform
/// cannot supply are zero, which forces re-hashing on modification checks.
#[derive(Debug, Clone, Default)]
pub struct EntryMetadata {
    pub ctime: i64,
    pub ctime_nsec: i64,
    pub mtime: i64,
    pub mtime_nsec: i64,
    pub dev: u64,
    pub ino: u64,
    pub mode: EntryMode,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
}

impl IndexEntry {
    pub fn serialize(&self) -> anyhow::Result<Bytes> {
        let name = self
            .name
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("non UTF-8 entry name: {:?}", self.name))?;
        let flags = (self.stage.as_u16() << 12) | (name.len().min(MAX_PATH_SIZE) as u16);

        let mut bytes = Vec::new();
        bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.ctime as u32)?;
        bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.ctime_nsec as u32)?;
        bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.mtime as u32)?;
        bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.mtime_nsec as u32)?;
        bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.dev as u32)?;
        bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.ino as u32)?;
        bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.mode.as_u32())?;
        bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.uid)?;
        bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.gid)?;
        bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.size as u32)?;
        self.oid.write_raw_to(&mut bytes)?;
        bytes.write_u16::<byteorder::NetworkEndian>(flags)?;
        bytes.write_all(name.as_bytes())?;

        // at least one NUL terminator, then pad to the block boundary
        bytes.push(0);
        while bytes.len() % ENTRY_BLOCK != 0 {
            bytes.push(0);
        }

        Ok(Bytes::from(bytes))
    }

    pub fn deserialize(bytes: &[u8]) -> anyhow::Result<Self> {
        if bytes.len() < ENTRY_MIN_SIZE {
            return Err(GitError::corrupt("index", "truncated entry").into());
        }

        let ctime = byteorder::NetworkEndian::read_u32(&bytes[0..4]) as i64;
        let ctime_nsec = byteorder::NetworkEndian::read_u32(&bytes[4..8]) as i64;
        let mtime = byteorder::NetworkEndian::read_u32(&bytes[8..12]) as i64;
        let mtime_nsec = byteorder::NetworkEndian::read_u32(&bytes[12..16]) as i64;
        let dev = byteorder::NetworkEndian::read_u32(&bytes[16..20]) as u64;
        let ino = byteorder::NetworkEndian::read_u32(&bytes[20..24]) as u64;
        let mode = EntryMode::try_from_u32(byteorder::NetworkEndian::read_u32(&bytes[24..28]))?;
        let uid = byteorder::NetworkEndian::read_u32(&bytes[28..32]);
        let gid = byteorder::NetworkEndian::read_u32(&bytes[32..36]);
        let size = byteorder::NetworkEndian::read_u32(&bytes[36..40]) as u64;
        let oid = ObjectId::read_raw_from(&mut std::io::Cursor::new(&bytes[40..60]))?;
        let flags = byteorder::NetworkEndian::read_u16(&bytes[60..62]);
        let stage = Stage::try_from_u16(flags >> 12)?;

        let name_end = bytes[62..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| GitError::corrupt("index", "entry name missing NUL terminator"))?;
        let name = std::str::from_utf8(&bytes[62..62 + name_end])
            .map_err(|_| GitError::corrupt("index", "invalid UTF-8 in entry name"))?;

        Ok(IndexEntry {
            name: PathBuf::from(name),
            oid,
            stage,
            metadata: EntryMetadata {
                ctime,
                ctime_nsec,
                mtime,
                mtime_nsec,
                dev,
                ino,
                mode,
                uid,
                gid,
                size,
            },
        })
    }
}

impl TryFrom<(&Path, Metadata)> for EntryMetadata {
    type Error = anyhow::Error;

    fn try_from((file_path, metadata): (&Path, Metadata)) -> anyhow::Result<Self> {
        let mode = EntryMode::from_workspace(file_path, &metadata);

        #[cfg(unix)]
        {
            use std::os::unix::prelude::MetadataExt;
            Ok(EntryMetadata {
                ctime: metadata.ctime(),
                ctime_nsec: metadata.ctime_nsec(),
                mtime: metadata.mtime(),
                mtime_nsec: metadata.mtime_nsec(),
                dev: metadata.dev(),
                ino: metadata.ino(),
                mode,
                uid: metadata.uid(),
                gid: metadata.gid(),
                size: metadata.size(),
            })
        }

        #[cfg(not(unix))]
        {
            Ok(EntryMetadata {
                mode,
                size: metadata.len(),
                ..EntryMetadata::default()
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn oid() -> ObjectId {
        ObjectId::try_parse("ce013625030ba8dba906f756967f9e9ca394464a").unwrap()
    }

    #[rstest]
    fn test_serialize_round_trip(oid: ObjectId) {
        let entry = IndexEntry::new(
            PathBuf::from("a/b/hello.txt"),
            oid,
            Stage::Ours,
            EntryMetadata {
                ctime: 1700000000,
                mtime: 1700000001,
                dev: 64,
                ino: 1234,
                mode: EntryMode::Executable,
                uid: 1000,
                gid: 1000,
                size: 6,
                ..EntryMetadata::default()
            },
        );

        let bytes = entry.serialize().unwrap();
        assert_eq!(bytes.len() % ENTRY_BLOCK, 0);

        let decoded = IndexEntry::deserialize(&bytes).unwrap();
        assert_eq!(decoded.name, entry.name);
        assert_eq!(decoded.oid, entry.oid);
        assert_eq!(decoded.stage, Stage::Ours);
        assert_eq!(decoded.metadata.mode, EntryMode::Executable);
        assert_eq!(decoded.metadata.size, 6);
    }

    #[rstest]
    fn test_entries_order_by_path_then_stage(oid: ObjectId) {
        let merged = IndexEntry::new(
            PathBuf::from("a.txt"),
            oid,
            Stage::Merged,
            EntryMetadata::default(),
        );
        let theirs = IndexEntry::new(
            PathBuf::from("a.txt"),
            oid,
            Stage::Theirs,
            EntryMetadata::default(),
        );
        let later_path = IndexEntry::new(
            PathBuf::from("b.txt"),
            oid,
            Stage::Base,
            EntryMetadata::default(),
        );

        let mut entries = vec![later_path.clone(), theirs.clone(), merged.clone()];
        entries.sort();
        assert_eq!(entries, vec![merged, theirs, later_path]);
    }

    #[rstest]
    fn test_parent_dirs(oid: ObjectId) {
        let entry = IndexEntry::new(
            PathBuf::from("a/b/c"),
            oid,
            Stage::Merged,
            EntryMetadata::default(),
        );

        assert_eq!(entry.parent_dirs(), vec![Path::new("a"), Path::new("a/b")]);
        assert_eq!(entry.basename().unwrap(), "c");
    }

    #[rstest]
    fn test_root_entry_has_no_parent_dirs(oid: ObjectId) {
        let entry = IndexEntry::new(
            PathBuf::from("a"),
            oid,
            Stage::Merged,
            EntryMetadata::default(),
        );

        assert_eq!(entry.parent_dirs(), Vec::<&Path>::new());
    }
}
