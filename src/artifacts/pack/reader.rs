//! Pack reading
//!
//! Two access patterns:
//!
//! - [`Packfile`]: random access by oid through the companion `.idx`, with
//!   OFS_DELTA / REF_DELTA resolution. Delta chains must terminate at a
//!   non-delta base within a bounded depth.
//! - [`explode`]: sequential decoding of a received pack stream (no index
//!   yet), used by the object-set exchange to turn a pack into stored
//!   objects.

use crate::artifacts::core::errors::GitError;
use crate::artifacts::core::hasher::{DIGEST_SIZE, Hasher};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::pack::pack_index::PackIndex;
use crate::artifacts::pack::{
    MAX_DELTA_DEPTH, PACK_SIGNATURE, PACK_VERSION, PackObjectType, delta,
};
use anyhow::Context;
use byteorder::ByteOrder;
use bytes::Bytes;
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// A `.pack` / `.idx` pair opened for random access
#[derive(Debug)]
pub struct Packfile {
    pack_path: PathBuf,
    index: PackIndex,
}

impl Packfile {
    /// Open `pack-<name>.pack` given the path of either half of the pair
    pub fn open(pack_path: &Path) -> anyhow::Result<Self> {
        let index = PackIndex::load(&pack_path.with_extension("idx"))?;
        Ok(Packfile {
            pack_path: pack_path.to_path_buf(),
            index,
        })
    }

    pub fn pack_path(&self) -> &Path {
        &self.pack_path
    }

    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.index.contains(oid)
    }

    pub fn oids(&self) -> impl Iterator<Item = &ObjectId> {
        self.index.oids()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Extract an object's kind and unframed payload
    pub fn get(&self, oid: &ObjectId) -> anyhow::Result<Option<(ObjectType, Bytes)>> {
        let Some(offset) = self.index.find_offset(oid) else {
            return Ok(None);
        };

        let mut file = std::fs::File::open(&self.pack_path)
            .with_context(|| format!("unable to open {}", self.pack_path.display()))?;
        let (object_type, payload) = self.read_at(&mut file, offset, 0)?;
        Ok(Some((object_type, Bytes::from(payload))))
    }

    fn read_at(
        &self,
        file: &mut std::fs::File,
        offset: u64,
        depth: usize,
    ) -> anyhow::Result<(ObjectType, Vec<u8>)> {
        if depth > MAX_DELTA_DEPTH {
            return Err(GitError::CorruptPack(
                "delta chain too deep (cycle or pathological pack)".to_string(),
            )
            .into());
        }

        file.seek(SeekFrom::Start(offset))?;
        let (entry_type, size) = read_entry_header(file)?;

        match entry_type {
            PackObjectType::OfsDelta => {
                let relative = delta::read_offset_varint(file)?;
                let base_offset = offset.checked_sub(relative).ok_or_else(|| {
                    GitError::CorruptPack("ofs-delta base before start of pack".to_string())
                })?;
                let delta_data = inflate_entry(file, size)?;

                let (object_type, base) = self.read_at(file, base_offset, depth + 1)?;
                let payload = delta::apply(&base, &delta_data)?;
                Ok((object_type, payload))
            }
            PackObjectType::RefDelta => {
                let base_oid = ObjectId::read_raw_from(file)?;
                let delta_data = inflate_entry(file, size)?;

                let base_offset = self.index.find_offset(&base_oid).ok_or_else(|| {
                    GitError::CorruptPack(format!("ref-delta base {base_oid} not in pack"))
                })?;
                let (object_type, base) = self.read_at(file, base_offset, depth + 1)?;
                let payload = delta::apply(&base, &delta_data)?;
                Ok((object_type, payload))
            }
            _ => {
                let payload = inflate_entry(file, size)?;
                Ok((entry_type.as_object_type()?, payload))
            }
        }
    }
}

/// Read the varint entry header: kind in the upper bits of the first byte,
/// size continuation in the following bytes
fn read_entry_header(reader: &mut impl Read) -> anyhow::Result<(PackObjectType, usize)> {
    let mut byte = read_byte(reader)?;
    let entry_type = PackObjectType::try_from_u8((byte >> 4) & 0x07)?;
    let mut size = usize::from(byte & 0x0F);
    let mut shift = 4u32;

    while byte & 0x80 != 0 {
        byte = read_byte(reader)?;
        size |= usize::from(byte & 0x7F) << shift;
        shift += 7;
        if shift > 63 {
            return Err(GitError::CorruptPack("entry size varint overflow".to_string()).into());
        }
    }

    Ok((entry_type, size))
}

fn read_byte(reader: &mut impl Read) -> anyhow::Result<u8> {
    let mut byte = [0u8; 1];
    reader
        .read_exact(&mut byte)
        .map_err(|_| GitError::CorruptPack("unexpected end of pack".to_string()))?;
    Ok(byte[0])
}

/// Inflate one zlib stream and insist on the declared size
fn inflate_entry(reader: &mut impl Read, expected_size: usize) -> anyhow::Result<Vec<u8>> {
    let mut decoder = flate2::read::ZlibDecoder::new(reader);
    let mut payload = Vec::with_capacity(expected_size);
    decoder
        .read_to_end(&mut payload)
        .map_err(|e| GitError::CorruptPack(format!("bad zlib stream: {e}")))?;

    if payload.len() != expected_size {
        return Err(GitError::CorruptPack(format!(
            "entry inflated to {} bytes, header declared {}",
            payload.len(),
            expected_size
        ))
        .into());
    }

    Ok(payload)
}

/// Decode a full pack stream into `(oid, kind, payload)` triples
///
/// `base_lookup` resolves REF_DELTA bases that live outside the stream
/// (thin packs); bases inside the stream are resolved by offset or oid as
/// they are seen. The trailing SHA-1 is verified before anything is
/// returned.
pub fn explode(
    bytes: &Bytes,
    base_lookup: impl Fn(&ObjectId) -> Option<(ObjectType, Bytes)>,
) -> anyhow::Result<Vec<(ObjectId, ObjectType, Bytes)>> {
    if bytes.len() < 12 + DIGEST_SIZE {
        return Err(GitError::CorruptPack("pack stream too short".to_string()).into());
    }
    if &bytes[0..4] != PACK_SIGNATURE {
        return Err(GitError::CorruptPack("bad pack signature".to_string()).into());
    }
    if byteorder::NetworkEndian::read_u32(&bytes[4..8]) != PACK_VERSION {
        return Err(GitError::CorruptPack("unsupported pack version".to_string()).into());
    }
    let count = byteorder::NetworkEndian::read_u32(&bytes[8..12]) as usize;

    let body_end = bytes.len() - DIGEST_SIZE;
    let declared = &bytes[body_end..];
    let actual = Hasher::hash_all(&bytes[..body_end]);
    if declared != actual {
        return Err(GitError::CorruptPack("pack checksum mismatch".to_string()).into());
    }

    let mut objects = Vec::with_capacity(count);
    let mut by_offset: HashMap<u64, (ObjectType, Bytes)> = HashMap::new();
    let mut by_oid: HashMap<ObjectId, (ObjectType, Bytes)> = HashMap::new();

    let mut cursor = std::io::Cursor::new(&bytes[..body_end]);
    cursor.set_position(12);

    for _ in 0..count {
        let offset = cursor.position();
        let (entry_type, size) = read_entry_header(&mut cursor)?;

        let (object_type, payload) = match entry_type {
            PackObjectType::OfsDelta => {
                let relative = delta::read_offset_varint(&mut cursor)?;
                let base_offset = offset.checked_sub(relative).ok_or_else(|| {
                    GitError::CorruptPack("ofs-delta base before start of pack".to_string())
                })?;
                let delta_data = inflate_stream(&mut cursor, size)?;

                let (object_type, base) = by_offset.get(&base_offset).cloned().ok_or_else(|| {
                    GitError::CorruptPack(format!("ofs-delta base at {base_offset} not seen"))
                })?;
                (object_type, Bytes::from(delta::apply(&base, &delta_data)?))
            }
            PackObjectType::RefDelta => {
                let base_oid = ObjectId::read_raw_from(&mut cursor)?;
                let delta_data = inflate_stream(&mut cursor, size)?;

                let (object_type, base) = by_oid
                    .get(&base_oid)
                    .cloned()
                    .or_else(|| base_lookup(&base_oid))
                    .ok_or_else(|| {
                        GitError::CorruptPack(format!("ref-delta base {base_oid} missing"))
                    })?;
                (object_type, Bytes::from(delta::apply(&base, &delta_data)?))
            }
            _ => {
                let payload = inflate_stream(&mut cursor, size)?;
                (entry_type.as_object_type()?, Bytes::from(payload))
            }
        };

        let framed = crate::artifacts::objects::object::frame(object_type, &payload)?;
        let oid = ObjectId::from_raw(Hasher::hash_all(&framed));

        by_offset.insert(offset, (object_type, payload.clone()));
        by_oid.insert(oid, (object_type, payload.clone()));
        objects.push((oid, object_type, payload));
    }

    Ok(objects)
}

/// Inflate one entry from the stream cursor, leaving the cursor at the
/// first byte after the compressed data
fn inflate_stream(cursor: &mut std::io::Cursor<&[u8]>, expected_size: usize) -> anyhow::Result<Vec<u8>> {
    let start = cursor.position() as usize;
    let remaining = &cursor.get_ref()[start..];

    let mut decoder = flate2::read::ZlibDecoder::new(remaining);
    let mut payload = Vec::with_capacity(expected_size);
    decoder
        .read_to_end(&mut payload)
        .map_err(|e| GitError::CorruptPack(format!("bad zlib stream: {e}")))?;

    if payload.len() != expected_size {
        return Err(GitError::CorruptPack(format!(
            "entry inflated to {} bytes, header declared {}",
            payload.len(),
            expected_size
        ))
        .into());
    }

    cursor.set_position((start + decoder.total_in() as usize) as u64);
    Ok(payload)
}
