//! Annotated tag objects
//!
//! ## Format
//!
//! ```text
//! tag <size>\0
//! object <oid>
//! type <kind>
//! tag <name>
//! tagger <person>
//!
//! <message>
//! ```

use crate::artifacts::core::errors::GitError;
use crate::artifacts::objects::object::{Object, Packable, Unpackable, frame};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::person::Person;
use bytes::Bytes;
use derive_new::new;
use std::io::{BufRead, Write};

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Tag {
    /// The tagged object
    object_oid: ObjectId,
    /// Kind of the tagged object, usually a commit
    object_type: ObjectType,
    name: String,
    tagger: Person,
    message: String,
}

impl Tag {
    pub fn object_oid(&self) -> &ObjectId {
        &self.object_oid
    }

    pub fn tagged_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tagger(&self) -> &Person {
        &self.tagger
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    fn header_block(&self) -> String {
        format!(
            "object {}\ntype {}\ntag {}\ntagger {}",
            self.object_oid,
            self.object_type,
            self.name,
            self.tagger.display()
        )
    }
}

impl Packable for Tag {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut payload = Vec::new();
        write!(payload, "{}\n\n", self.header_block())?;
        payload.write_all(self.message.as_bytes())?;

        frame(ObjectType::Tag, &payload)
    }
}

impl Unpackable for Tag {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let content = reader
            .bytes()
            .collect::<Result<Vec<u8>, std::io::Error>>()?;
        let content = String::from_utf8(content)
            .map_err(|_| GitError::MalformedObject("tag is not valid UTF-8".to_string()))?;

        let (headers, message) = content.split_once("\n\n").ok_or_else(|| {
            GitError::MalformedObject("tag missing blank line after headers".to_string())
        })?;

        let mut lines = headers.lines();
        let object_oid = ObjectId::try_parse(strip_field(lines.next(), "object")?)?;
        let object_type = ObjectType::try_from(strip_field(lines.next(), "type")?)?;
        let name = strip_field(lines.next(), "tag")?.to_string();
        let tagger = Person::try_from(strip_field(lines.next(), "tagger")?)?;

        Ok(Tag::new(
            object_oid,
            object_type,
            name,
            tagger,
            message.to_string(),
        ))
    }
}

fn strip_field<'l>(line: Option<&'l str>, field: &str) -> anyhow::Result<&'l str> {
    line.and_then(|line| line.strip_prefix(field))
        .and_then(|rest| rest.strip_prefix(' '))
        .ok_or_else(|| GitError::MalformedObject(format!("tag missing {field} header")).into())
}

impl Object for Tag {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tag
    }

    fn display(&self) -> String {
        format!("{}\n\n{}", self.header_block(), self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip() {
        let timestamp = chrono::FixedOffset::east_opt(3600)
            .unwrap()
            .timestamp_opt(1700000000, 0)
            .unwrap();
        let tag = Tag::new(
            ObjectId::try_parse("ce013625030ba8dba906f756967f9e9ca394464a").unwrap(),
            ObjectType::Commit,
            "v1.0".to_string(),
            Person::new_with_timestamp("T".to_string(), "t@x".to_string(), timestamp),
            "release one\n".to_string(),
        );

        let framed = tag.serialize().unwrap();
        let header_end = framed.iter().position(|&b| b == 0).unwrap();
        let decoded = Tag::deserialize(std::io::Cursor::new(&framed[header_end + 1..])).unwrap();

        assert_eq!(decoded, tag);
    }

    #[test]
    fn test_rejects_missing_headers() {
        let bad = "object ce013625030ba8dba906f756967f9e9ca394464a\ntag v1\n\nmsg";
        assert!(Tag::deserialize(std::io::Cursor::new(bad.as_bytes())).is_err());
    }
}
