//! Core object traits
//!
//! All four object kinds implement the same trio of traits:
//! - `Packable`: serialization into the framed byte form that gets hashed
//!   and stored
//! - `Unpackable`: deserialization from a reader positioned after the
//!   framing header
//! - `Object`: common operations (kind, id computation, display)
//!
//! The framed form is `<kind> <decimal-length>\0<payload>`; the object id
//! is the SHA-1 digest of exactly those bytes.

use crate::artifacts::core::hasher::Hasher;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tag::Tag;
use crate::artifacts::objects::tree::Tree;
use anyhow::Result;
use bytes::Bytes;
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// Serialization to the framed byte form
pub trait Packable {
    /// Serialize the object, framing header included
    fn serialize(&self) -> Result<Bytes>;
}

/// Deserialization from the unframed payload
pub trait Unpackable {
    /// Deserialize from a reader positioned after the framing header
    fn deserialize(reader: impl BufRead) -> Result<Self>
    where
        Self: Sized;
}

/// Common object operations
pub trait Object: Packable {
    fn object_type(&self) -> ObjectType;

    /// Human-readable rendering (used by `cat-file -p`)
    fn display(&self) -> String;

    /// Compute the object id: the digest of the framed serialization
    fn object_id(&self) -> Result<ObjectId> {
        let framed = self.serialize()?;
        Ok(ObjectId::from_raw(Hasher::hash_all(&framed)))
    }

    /// Relative storage path under the objects directory
    fn object_path(&self) -> Result<PathBuf> {
        Ok(self.object_id()?.to_path())
    }
}

/// Prefix `payload` with the `<kind> <len>\0` framing header
pub fn frame(object_type: ObjectType, payload: &[u8]) -> Result<Bytes> {
    let mut framed = Vec::with_capacity(payload.len() + 16);
    write!(framed, "{} {}\0", object_type.as_str(), payload.len())?;
    framed.write_all(payload)?;
    Ok(Bytes::from(framed))
}

/// Type-erased object container
///
/// Returned when the kind is only known at runtime, e.g. when loading an
/// arbitrary id from the database.
#[derive(Debug, Clone)]
pub enum ObjectBox {
    Blob(Box<Blob>),
    Tree(Box<Tree>),
    Commit(Box<Commit>),
    Tag(Box<Tag>),
}

impl ObjectBox {
    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectBox::Blob(_) => ObjectType::Blob,
            ObjectBox::Tree(_) => ObjectType::Tree,
            ObjectBox::Commit(_) => ObjectType::Commit,
            ObjectBox::Tag(_) => ObjectType::Tag,
        }
    }

    pub fn display(&self) -> String {
        match self {
            ObjectBox::Blob(blob) => blob.display(),
            ObjectBox::Tree(tree) => tree.display(),
            ObjectBox::Commit(commit) => commit.display(),
            ObjectBox::Tag(tag) => tag.display(),
        }
    }
}
