//! Pack writing
//!
//! Produces a `pack-<checksum>.pack` / `.idx` pair from a set of objects.
//! Entries are written undeltified: delta records are fully supported on
//! the read side, but the visible on-disk format does not require a writer
//! to emit them.

use crate::artifacts::core::hasher::Hasher;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::pack::pack_index::{PackIndex, PackIndexEntry};
use crate::artifacts::pack::{PACK_SIGNATURE, PACK_VERSION, PackObjectType};
use anyhow::Context;
use byteorder::WriteBytesExt;
use bytes::Bytes;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Serialize `objects` into a pack stream (header, entries, SHA-1 trailer)
pub fn build_stream(objects: &[(ObjectId, ObjectType, Bytes)]) -> anyhow::Result<Bytes> {
    let mut pack = Vec::new();
    pack.write_all(PACK_SIGNATURE)?;
    pack.write_u32::<byteorder::NetworkEndian>(PACK_VERSION)?;
    pack.write_u32::<byteorder::NetworkEndian>(objects.len() as u32)?;

    for (_, object_type, payload) in objects {
        write_entry(&mut pack, *object_type, payload)?;
    }

    let checksum = Hasher::hash_all(&pack);
    pack.write_all(&checksum)?;

    Ok(Bytes::from(pack))
}

/// Write a pack and its index under `pack_dir`, named by the pack checksum
///
/// Returns the path of the `.pack` half.
pub fn write_pack(
    pack_dir: &Path,
    objects: &[(ObjectId, ObjectType, Bytes)],
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(pack_dir)
        .with_context(|| format!("unable to create {}", pack_dir.display()))?;

    let mut pack = Vec::new();
    pack.write_all(PACK_SIGNATURE)?;
    pack.write_u32::<byteorder::NetworkEndian>(PACK_VERSION)?;
    pack.write_u32::<byteorder::NetworkEndian>(objects.len() as u32)?;

    let mut index_entries = Vec::with_capacity(objects.len());
    for (oid, object_type, payload) in objects {
        let offset = pack.len() as u64;
        let entry_start = pack.len();
        write_entry(&mut pack, *object_type, payload)?;

        let mut crc = flate2::Crc::new();
        crc.update(&pack[entry_start..]);
        index_entries.push(PackIndexEntry {
            oid: *oid,
            crc32: crc.sum(),
            offset,
        });
    }

    let checksum = Hasher::hash_all(&pack);
    pack.write_all(&checksum)?;

    let checksum_hex: String = checksum.iter().map(|b| format!("{b:02x}")).collect();
    let pack_path = pack_dir.join(format!("pack-{checksum_hex}.pack"));
    let index_path = pack_path.with_extension("idx");

    let temp_path = pack_dir.join(format!("tmp_pack_{checksum_hex}"));
    std::fs::write(&temp_path, &pack)
        .with_context(|| format!("unable to write {}", temp_path.display()))?;
    std::fs::rename(&temp_path, &pack_path)?;

    PackIndex::write(&index_path, &index_entries, &checksum)?;

    Ok(pack_path)
}

fn write_entry(pack: &mut Vec<u8>, object_type: ObjectType, payload: &Bytes) -> anyhow::Result<()> {
    write_entry_header(pack, PackObjectType::from(object_type), payload.len())?;

    let mut encoder =
        flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(payload)
        .context("unable to compress pack entry")?;
    let compressed = encoder
        .finish()
        .context("unable to finish compressing pack entry")?;
    pack.write_all(&compressed)?;

    Ok(())
}

/// Entry header: kind in bits 4-6 of the first byte, size as a varint
/// starting with the low 4 bits
fn write_entry_header(
    pack: &mut Vec<u8>,
    entry_type: PackObjectType,
    size: usize,
) -> anyhow::Result<()> {
    let mut size = size;
    let mut byte = (entry_type.as_u8() << 4) | (size & 0x0F) as u8;
    size >>= 4;

    while size > 0 {
        pack.push(byte | 0x80);
        byte = (size & 0x7F) as u8;
        size >>= 7;
    }
    pack.push(byte);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::object::frame;
    use crate::artifacts::pack::reader::{Packfile, explode};
    use pretty_assertions::assert_eq;

    fn object(content: &str) -> (ObjectId, ObjectType, Bytes) {
        let payload = Bytes::from(content.as_bytes().to_vec());
        let framed = frame(ObjectType::Blob, &payload).unwrap();
        let oid = ObjectId::from_raw(Hasher::hash_all(&framed));
        (oid, ObjectType::Blob, payload)
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let dir = assert_fs::TempDir::new().unwrap();
        let objects = vec![object("hello\n"), object("a much longer payload, still text\n")];

        let pack_path = write_pack(dir.path(), &objects).unwrap();
        let pack = Packfile::open(&pack_path).unwrap();

        assert_eq!(pack.len(), 2);
        for (oid, object_type, payload) in &objects {
            let (read_type, read_payload) = pack.get(oid).unwrap().unwrap();
            assert_eq!(read_type, *object_type);
            assert_eq!(&read_payload, payload);
        }
    }

    #[test]
    fn test_stream_explodes_to_the_same_objects() {
        let objects = vec![object("one\n"), object("two\n"), object("three\n")];
        let stream = build_stream(&objects).unwrap();

        let exploded = explode(&stream, |_| None).unwrap();
        assert_eq!(exploded, objects);
    }

    #[test]
    fn test_explode_rejects_tampered_stream() {
        let objects = vec![object("payload\n")];
        let mut stream = build_stream(&objects).unwrap().to_vec();
        stream[13] ^= 0x01;

        assert!(explode(&Bytes::from(stream), |_| None).is_err());
    }

    #[test]
    fn test_missing_object_reads_as_none() {
        let dir = assert_fs::TempDir::new().unwrap();
        let pack_path = write_pack(dir.path(), &[object("solo\n")]).unwrap();
        let pack = Packfile::open(&pack_path).unwrap();

        let absent = ObjectId::try_parse("0000000000000000000000000000000000000001").unwrap();
        assert!(pack.get(&absent).unwrap().is_none());
    }
}
