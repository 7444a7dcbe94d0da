//! Object kinds and header framing
//!
//! The bytes actually hashed and stored are `<kind> <decimal-length>\0`
//! followed by the payload. This module knows the four kind words and how
//! to read the framing header back.

use crate::artifacts::core::errors::GitError;
use std::io::BufRead;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Blob => "blob",
            ObjectType::Tree => "tree",
            ObjectType::Commit => "commit",
            ObjectType::Tag => "tag",
        }
    }

    /// Consume `<kind> <len>\0` from the reader
    ///
    /// Returns the kind and the declared payload length so callers can
    /// verify it against the bytes that follow.
    pub fn parse_header(reader: &mut impl BufRead) -> anyhow::Result<(ObjectType, usize)> {
        let mut kind = Vec::new();
        reader.read_until(b' ', &mut kind)?;
        if kind.pop() != Some(b' ') {
            return Err(GitError::MalformedObject("missing space after kind".to_string()).into());
        }

        let kind = std::str::from_utf8(&kind)
            .map_err(|_| GitError::MalformedObject("non-ascii kind word".to_string()))?;
        let object_type = ObjectType::try_from(kind)?;

        let mut size = Vec::new();
        reader.read_until(b'\0', &mut size)?;
        if size.pop() != Some(b'\0') {
            return Err(GitError::MalformedObject("missing NUL in header".to_string()).into());
        }

        let size = std::str::from_utf8(&size)
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| GitError::MalformedObject("invalid length in header".to_string()))?;

        Ok((object_type, size))
    }
}

impl TryFrom<&str> for ObjectType {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> anyhow::Result<Self> {
        match value {
            "blob" => Ok(ObjectType::Blob),
            "tree" => Ok(ObjectType::Tree),
            "commit" => Ok(ObjectType::Commit),
            "tag" => Ok(ObjectType::Tag),
            _ => Err(GitError::MalformedObject(format!("unknown object kind: {value}")).into()),
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn test_parse_header() {
        let mut reader = Cursor::new(b"blob 11\0hello world".to_vec());
        let (object_type, size) = ObjectType::parse_header(&mut reader).unwrap();

        assert_eq!(object_type, ObjectType::Blob);
        assert_eq!(size, 11);
    }

    #[test]
    fn test_rejects_missing_nul() {
        let mut reader = Cursor::new(b"blob 11".to_vec());
        assert!(ObjectType::parse_header(&mut reader).is_err());
    }

    #[test]
    fn test_rejects_unknown_kind() {
        let mut reader = Cursor::new(b"blobby 4\0data".to_vec());
        assert!(ObjectType::parse_header(&mut reader).is_err());
    }
}
