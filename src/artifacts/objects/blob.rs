//! Blob objects
//!
//! Blobs store raw file content, byte for byte, without any metadata.
//! Names and modes live in the trees that reference them.

use crate::artifacts::objects::object::{Object, Packable, Unpackable, frame};
use crate::artifacts::objects::object_type::ObjectType;
use bytes::Bytes;
use derive_new::new;
use std::io::BufRead;

/// Window scanned for NUL bytes when classifying content as binary
const BINARY_SNIFF_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Blob {
    /// Raw file bytes, verbatim
    content: Bytes,
}

impl Blob {
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn into_content(self) -> Bytes {
        self.content
    }

    /// A blob is binary if a NUL byte appears in its first 8 KiB
    pub fn is_binary(&self) -> bool {
        let window = &self.content[..self.content.len().min(BINARY_SNIFF_SIZE)];
        window.contains(&0)
    }
}

impl Packable for Blob {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        frame(ObjectType::Blob, &self.content)
    }
}

impl Unpackable for Blob {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        // the framing header has already been consumed
        let content = reader
            .bytes()
            .collect::<Result<Vec<u8>, std::io::Error>>()?;

        Ok(Blob::new(Bytes::from(content)))
    }
}

impl Object for Blob {
    fn object_type(&self) -> ObjectType {
        ObjectType::Blob
    }

    fn display(&self) -> String {
        String::from_utf8_lossy(&self.content).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_known_blob_oid() {
        // `echo hello | git hash-object --stdin`
        let blob = Blob::new(Bytes::from_static(b"hello\n"));
        assert_eq!(
            blob.object_id().unwrap().to_hex(),
            "ce013625030ba8dba906f756967f9e9ca394464a"
        );
    }

    #[test]
    fn test_binary_detection() {
        assert!(!Blob::new(Bytes::from_static(b"plain text\n")).is_binary());
        assert!(Blob::new(Bytes::from_static(b"\x89PNG\0\x1a")).is_binary());

        // a NUL past the sniff window is not detected
        let mut content = vec![b'a'; BINARY_SNIFF_SIZE];
        content.push(0);
        assert!(!Blob::new(Bytes::from(content)).is_binary());
    }

    proptest! {
        #[test]
        fn test_serialize_round_trip(content in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let blob = Blob::new(Bytes::from(content.clone()));
            let framed = blob.serialize().unwrap();

            // framing header is `blob <len>\0`
            let header_end = framed.iter().position(|&b| b == 0).unwrap();
            let header = std::str::from_utf8(&framed[..header_end]).unwrap();
            prop_assert_eq!(header, format!("blob {}", content.len()));

            let decoded = Blob::deserialize(std::io::Cursor::new(&framed[header_end + 1..])).unwrap();
            prop_assert_eq!(decoded.content().as_ref(), content.as_slice());
        }
    }
}
