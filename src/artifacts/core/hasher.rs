//! SHA-1 content digests
//!
//! Every object identifier in the repository is the SHA-1 digest of the
//! object's framed byte form. This module wraps the block function behind a
//! small stateful hasher with explicit lifecycle rules: `finalize` is
//! terminal, and any use after it fails with `UsageAfterFinalize` instead of
//! silently producing a digest over the wrong bytes.

use crate::artifacts::core::errors::GitError;
use sha1::{Digest, Sha1};
use std::io::Read;
use std::path::Path;

/// Size of a raw digest in bytes
pub const DIGEST_SIZE: usize = 20;

/// Chunk size used when streaming files from disk
const FILE_CHUNK_SIZE: usize = 64 * 1024;

/// Incremental SHA-1 hasher
///
/// `update` may be called any number of times before `finalize`; afterwards
/// the hasher is spent and both operations fail.
#[derive(Debug, Default, Clone)]
pub struct Hasher {
    inner: Option<Sha1>,
}

impl Hasher {
    pub fn new() -> Self {
        Hasher {
            inner: Some(Sha1::new()),
        }
    }

    /// Feed more bytes into the running digest
    pub fn update(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        match self.inner.as_mut() {
            Some(inner) => {
                inner.update(bytes);
                Ok(())
            }
            None => Err(GitError::UsageAfterFinalize.into()),
        }
    }

    /// Produce the digest and spend the hasher
    pub fn finalize(&mut self) -> anyhow::Result<[u8; DIGEST_SIZE]> {
        match self.inner.take() {
            Some(inner) => Ok(inner.finalize().into()),
            None => Err(GitError::UsageAfterFinalize.into()),
        }
    }

    /// Digest a whole buffer in one call
    pub fn hash_all(bytes: &[u8]) -> [u8; DIGEST_SIZE] {
        let mut inner = Sha1::new();
        inner.update(bytes);
        inner.finalize().into()
    }

    /// Digest a file, streaming in fixed-size chunks to bound memory
    pub fn hash_file(path: &Path) -> anyhow::Result<[u8; DIGEST_SIZE]> {
        let mut file = std::fs::File::open(path)
            .map_err(|e| anyhow::anyhow!("unable to open {} for hashing: {}", path.display(), e))?;

        let mut hasher = Hasher::new();
        let mut chunk = vec![0u8; FILE_CHUNK_SIZE];
        loop {
            let read = file.read(&mut chunk)?;
            if read == 0 {
                break;
            }
            hasher.update(&chunk[..read])?;
        }

        hasher.finalize()
    }
}
