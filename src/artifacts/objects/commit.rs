//! Commit objects
//!
//! A commit is a snapshot pointer: the root tree id, zero or more parent
//! commit ids, author and committer records, and a message.
//!
//! ## Format
//!
//! ```text
//! commit <size>\0
//! tree <tree-oid>
//! parent <parent-oid>        (zero or more, before author)
//! author <person>
//! committer <person>
//!
//! <message, verbatim>
//! ```
//!
//! The header order is enforced on decode: `tree` must come first and every
//! `parent` line must precede `author`. Everything after the blank line is
//! the message, trailing newlines included.

use crate::artifacts::core::errors::GitError;
use crate::artifacts::objects::object::{Object, Packable, Unpackable, frame};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::person::Person;
use bytes::Bytes;
use std::io::{BufRead, Write};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Empty for a root commit, two entries for a merge commit
    parents: Vec<ObjectId>,
    tree_oid: ObjectId,
    author: Person,
    committer: Person,
    message: String,
}

impl Commit {
    pub fn new(
        parents: Vec<ObjectId>,
        tree_oid: ObjectId,
        author: Person,
        committer: Person,
        message: String,
    ) -> Self {
        Commit {
            parents,
            tree_oid,
            author,
            committer,
            message,
        }
    }

    pub fn tree_oid(&self) -> &ObjectId {
        &self.tree_oid
    }

    pub fn parents(&self) -> &[ObjectId] {
        &self.parents
    }

    pub fn parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    pub fn author(&self) -> &Person {
        &self.author
    }

    pub fn committer(&self) -> &Person {
        &self.committer
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// First line of the message, for one-line displays
    pub fn short_message(&self) -> String {
        self.message.lines().next().unwrap_or("").to_string()
    }

    /// Timestamp used for history ordering
    pub fn timestamp(&self) -> chrono::DateTime<chrono::FixedOffset> {
        self.author.timestamp()
    }

    fn header_block(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("tree {}", self.tree_oid));
        for parent in &self.parents {
            lines.push(format!("parent {parent}"));
        }
        lines.push(format!("author {}", self.author.display()));
        lines.push(format!("committer {}", self.committer.display()));

        lines.join("\n")
    }
}

impl Packable for Commit {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut payload = Vec::new();
        write!(payload, "{}\n\n", self.header_block())?;
        payload.write_all(self.message.as_bytes())?;

        frame(ObjectType::Commit, &payload)
    }
}

impl Unpackable for Commit {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let content = reader
            .bytes()
            .collect::<Result<Vec<u8>, std::io::Error>>()?;
        let content = String::from_utf8(content)
            .map_err(|_| GitError::MalformedObject("commit is not valid UTF-8".to_string()))?;

        let (headers, message) = content.split_once("\n\n").ok_or_else(|| {
            GitError::MalformedObject("commit missing blank line after headers".to_string())
        })?;

        let mut tree_oid = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;

        for line in headers.lines() {
            let (field, value) = line.split_once(' ').ok_or_else(|| {
                GitError::MalformedObject(format!("invalid commit header: {line}"))
            })?;

            match field {
                "tree" => {
                    if tree_oid.is_some() || !parents.is_empty() || author.is_some() {
                        return Err(GitError::MalformedObject(
                            "tree header must come first".to_string(),
                        )
                        .into());
                    }
                    tree_oid = Some(ObjectId::try_parse(value)?);
                }
                "parent" => {
                    if tree_oid.is_none() || author.is_some() {
                        return Err(GitError::MalformedObject(
                            "parent headers must follow tree and precede author".to_string(),
                        )
                        .into());
                    }
                    parents.push(ObjectId::try_parse(value)?);
                }
                "author" => {
                    if tree_oid.is_none() {
                        return Err(GitError::MalformedObject(
                            "author header before tree".to_string(),
                        )
                        .into());
                    }
                    author = Some(Person::try_from(value)?);
                }
                "committer" => {
                    if author.is_none() {
                        return Err(GitError::MalformedObject(
                            "committer header before author".to_string(),
                        )
                        .into());
                    }
                    committer = Some(Person::try_from(value)?);
                }
                _ => {
                    return Err(
                        GitError::MalformedObject(format!("unknown commit header: {field}")).into(),
                    );
                }
            }
        }

        let tree_oid = tree_oid
            .ok_or_else(|| GitError::MalformedObject("commit missing tree header".to_string()))?;
        let author = author
            .ok_or_else(|| GitError::MalformedObject("commit missing author header".to_string()))?;
        let committer = committer.ok_or_else(|| {
            GitError::MalformedObject("commit missing committer header".to_string())
        })?;

        Ok(Commit::new(
            parents,
            tree_oid,
            author,
            committer,
            message.to_string(),
        ))
    }
}

impl Object for Commit {
    fn object_type(&self) -> ObjectType {
        ObjectType::Commit
    }

    fn display(&self) -> String {
        format!("{}\n\n{}", self.header_block(), self.message)
    }
}
