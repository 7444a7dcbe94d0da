//! Checksummed index I/O
//!
//! The index file ends with a SHA-1 digest of everything before it. This
//! wrapper threads every byte read or written through a running hasher so
//! the trailing checksum can be verified (on load) or appended (on save).

use crate::artifacts::core::errors::GitError;
use crate::artifacts::core::hasher::{DIGEST_SIZE, Hasher};
use bytes::Bytes;
use std::io::{Read, Write};

#[derive(Debug)]
pub struct Checksum<T> {
    inner: T,
    hasher: Hasher,
}

impl<T> Checksum<T> {
    pub fn new(inner: T) -> Self {
        Checksum {
            inner,
            hasher: Hasher::new(),
        }
    }
}

impl<T: Read> Checksum<T> {
    /// Read exactly `size` bytes, feeding them into the running digest
    pub fn read(&mut self, size: usize) -> anyhow::Result<Bytes> {
        let mut bytes = vec![0u8; size];
        self.inner
            .read_exact(&mut bytes)
            .map_err(|_| GitError::corrupt("index", "unexpected end of file"))?;
        self.hasher.update(&bytes)?;
        Ok(Bytes::from(bytes))
    }

    /// Read the trailing digest and compare it with the bytes seen so far
    pub fn verify(mut self) -> anyhow::Result<()> {
        let mut stored = [0u8; DIGEST_SIZE];
        self.inner
            .read_exact(&mut stored)
            .map_err(|_| GitError::corrupt("index", "missing trailing checksum"))?;

        if self.hasher.finalize()? != stored {
            return Err(GitError::corrupt("index", "checksum mismatch").into());
        }
        Ok(())
    }
}

impl<T: Write> Checksum<T> {
    /// Write bytes, feeding them into the running digest
    pub fn write(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        self.inner.write_all(bytes)?;
        self.hasher.update(bytes)?;
        Ok(())
    }

    /// Append the digest of everything written so far
    pub fn write_checksum(mut self) -> anyhow::Result<T> {
        let digest = self.hasher.finalize()?;
        self.inner.write_all(&digest)?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_write_then_verify() {
        let mut writer = Checksum::new(Vec::new());
        writer.write(b"index bytes").unwrap();
        let on_disk = writer.write_checksum().unwrap();

        let mut reader = Checksum::new(Cursor::new(on_disk));
        assert_eq!(reader.read(11).unwrap().as_ref(), b"index bytes");
        assert!(reader.verify().is_ok());
    }

    #[test]
    fn test_detects_tampering() {
        let mut writer = Checksum::new(Vec::new());
        writer.write(b"index bytes").unwrap();
        let mut on_disk = writer.write_checksum().unwrap();
        on_disk[0] ^= 0x01;

        let mut reader = Checksum::new(Cursor::new(on_disk));
        reader.read(11).unwrap();
        assert!(reader.verify().is_err());
    }
}
