//! Tree objects
//!
//! Trees are directory snapshots: a sorted sequence of
//! `<mode-octal> <name>\0<20-byte-oid>` entries. The ordering treats
//! directory names as if they carried a trailing `/`, and it is
//! load-bearing: the same entries in a different order hash to a different
//! object id, so both serialization and deserialization enforce it.
//!
//! ## Tree building
//!
//! Trees are built from index entries (when writing a commit) or loaded
//! from the database (when diffing or checking out). Built trees are stored
//! bottom-up: `traverse` visits children before parents so child ids exist
//! before the parent entry referencing them is serialized.

use crate::artifacts::core::errors::GitError;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::entry_mode::EntryMode;
use crate::artifacts::objects::object::{Object, Packable, Unpackable, frame};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::Path;

/// An entry of a tree being built from the index
#[derive(Debug, Clone)]
enum TreeEntry {
    File(IndexEntry),
    Directory(Tree),
}

impl TreeEntry {
    fn mode(&self) -> EntryMode {
        match self {
            TreeEntry::File(entry) => entry.metadata.mode,
            TreeEntry::Directory(_) => EntryMode::Directory,
        }
    }

    fn oid(&self) -> anyhow::Result<ObjectId> {
        match self {
            TreeEntry::File(entry) => Ok(entry.oid),
            TreeEntry::Directory(tree) => tree.object_id(),
        }
    }
}

/// A directory snapshot
///
/// Loaded trees populate `readable_entries`; trees under construction
/// populate `writeable_entries`, whose directory keys carry a trailing `/`
/// so that plain map order matches the mandated entry order.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    readable_entries: BTreeMap<String, DatabaseEntry>,
    writeable_entries: BTreeMap<String, TreeEntry>,
}

impl Tree {
    /// Build a nested tree from flat index entries
    pub fn build<'e>(entries: impl Iterator<Item = &'e IndexEntry>) -> anyhow::Result<Self> {
        let mut root = Tree::default();

        for entry in entries {
            let parents = entry.parent_dirs();
            root.add_entry(&parents, entry)?;
        }

        Ok(root)
    }

    fn add_entry(&mut self, parents: &[&Path], entry: &IndexEntry) -> anyhow::Result<()> {
        if parents.is_empty() {
            self.writeable_entries
                .insert(entry.basename()?.to_string(), TreeEntry::File(entry.clone()));
            return Ok(());
        }

        let dir_name = parents[0]
            .file_name()
            .and_then(|name| name.to_str())
            .context("invalid directory name in index entry")?;
        let key = format!("{dir_name}/");

        let subtree = self
            .writeable_entries
            .entry(key)
            .or_insert_with(|| TreeEntry::Directory(Tree::default()));
        match subtree {
            TreeEntry::Directory(tree) => tree.add_entry(&parents[1..], entry),
            TreeEntry::File(_) => Err(GitError::InvalidArgument(format!(
                "{dir_name} is tracked both as a file and as a directory"
            ))
            .into()),
        }
    }

    /// Visit every subtree post-order (children first)
    pub fn traverse<F>(&self, func: &F) -> anyhow::Result<()>
    where
        F: Fn(&Tree) -> anyhow::Result<()>,
    {
        for entry in self.writeable_entries.values() {
            if let TreeEntry::Directory(tree) = entry {
                tree.traverse(func)?;
            }
        }
        func(self)
    }

    /// Entries of a tree loaded from the database
    pub fn entries(&self) -> impl Iterator<Item = (&String, &DatabaseEntry)> {
        self.readable_entries.iter()
    }

    pub fn into_entries(self) -> impl Iterator<Item = (String, DatabaseEntry)> {
        self.readable_entries.into_iter()
    }

    pub fn is_empty(&self) -> bool {
        self.readable_entries.is_empty() && self.writeable_entries.is_empty()
    }

    /// The map-ordering key for an entry: directories sort with a
    /// trailing `/`
    fn sort_key(name: &str, mode: EntryMode) -> String {
        if mode.is_tree() {
            format!("{name}/")
        } else {
            name.to_string()
        }
    }
}

impl Packable for Tree {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut payload = Vec::new();

        for (name, entry) in &self.writeable_entries {
            let name = name.trim_end_matches('/');
            write!(payload, "{} {}\0", entry.mode().as_octal_str(), name)?;
            entry.oid()?.write_raw_to(&mut payload)?;
        }

        frame(ObjectType::Tree, &payload)
    }
}

impl Unpackable for Tree {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let mut entries = BTreeMap::new();
        let mut reader = reader;
        let mut previous_key: Option<String> = None;

        let mut mode_bytes = Vec::new();
        let mut name_bytes = Vec::new();

        loop {
            mode_bytes.clear();
            let read = reader.read_until(b' ', &mut mode_bytes)?;
            if read == 0 {
                break; // clean EOF, no more entries
            }
            if mode_bytes.pop() != Some(b' ') {
                return Err(GitError::MalformedObject("unexpected EOF in mode".to_string()).into());
            }

            let mode_str = std::str::from_utf8(&mode_bytes)
                .map_err(|_| GitError::MalformedObject("non-ascii mode".to_string()))?;
            let mode = EntryMode::from_octal_str(mode_str)?;

            name_bytes.clear();
            let read = reader.read_until(b'\0', &mut name_bytes)?;
            if read == 0 || name_bytes.pop() != Some(b'\0') {
                return Err(GitError::MalformedObject(
                    "tree entry name missing NUL terminator".to_string(),
                )
                .into());
            }
            let name = std::str::from_utf8(&name_bytes)
                .map_err(|_| GitError::MalformedObject("invalid UTF-8 in entry name".to_string()))?
                .to_owned();

            let oid = ObjectId::read_raw_from(&mut reader)
                .context("unexpected EOF in tree entry object id")?;

            let key = Tree::sort_key(&name, mode);
            if previous_key.as_deref() >= Some(key.as_str()) {
                return Err(GitError::MalformedObject(format!(
                    "misordered tree entry: {name}"
                ))
                .into());
            }
            previous_key = Some(key);

            entries.insert(name, DatabaseEntry::new(oid, mode));
        }

        Ok(Tree {
            readable_entries: entries,
            writeable_entries: BTreeMap::new(),
        })
    }
}

impl Object for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }

    fn display(&self) -> String {
        let writeable = self.writeable_entries.iter().map(|(name, entry)| {
            (
                name.trim_end_matches('/').to_string(),
                entry.mode(),
                entry.oid().unwrap_or_default(),
            )
        });
        let readable = self
            .readable_entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.mode, entry.oid));

        writeable
            .chain(readable)
            .map(|(name, mode, oid)| {
                let kind = if mode.is_tree() {
                    ObjectType::Tree
                } else {
                    ObjectType::Blob
                };
                format!("{} {} {}\t{}", mode.as_octal_str(), kind, oid, name)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
