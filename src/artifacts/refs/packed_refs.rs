//! The `packed-refs` fallback file
//!
//! Loose ref files can be folded into a single `packed-refs` file for
//! compactness:
//!
//! ```text
//! # pack-refs with: peeled
//! <oid> <refname>
//! ^<peeled-oid>           (annotated-tag peel lines, skipped on read)
//! ```
//!
//! Reads merge with loose refs (loose wins); deletes rewrite the file.

use crate::artifacts::core::errors::GitError;
use crate::artifacts::core::lockfile::Lockfile;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::refs::ref_name::RefName;
use anyhow::Context;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

const HEADER: &str = "# pack-refs with: peeled";

#[derive(Debug, Default)]
pub struct PackedRefs {
    path: PathBuf,
    entries: BTreeMap<String, ObjectId>,
}

impl PackedRefs {
    /// Load `packed-refs`; a missing file is an empty set
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut packed = PackedRefs {
            path: path.to_path_buf(),
            entries: BTreeMap::new(),
        };

        if !path.exists() {
            return Ok(packed);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("unable to read {}", path.display()))?;

        for line in content.lines() {
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') || line.starts_with('^') {
                continue;
            }

            let (oid, name) = line
                .split_once(' ')
                .ok_or_else(|| GitError::corrupt("packed-refs", format!("bad line: {line}")))?;
            packed
                .entries
                .insert(name.to_string(), ObjectId::try_parse(oid)?);
        }

        Ok(packed)
    }

    pub fn get(&self, name: &RefName) -> Option<ObjectId> {
        self.entries.get(name.as_str()).copied()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &ObjectId)> {
        self.entries.iter()
    }

    /// Drop an entry and rewrite the file; a no-op if the name is absent
    pub fn remove(&mut self, name: &RefName) -> anyhow::Result<()> {
        if self.entries.remove(name.as_str()).is_none() {
            return Ok(());
        }
        self.save()
    }

    fn save(&self) -> anyhow::Result<()> {
        let mut content = Vec::new();
        writeln!(content, "{HEADER}")?;
        for (name, oid) in &self.entries {
            writeln!(content, "{oid} {name}")?;
        }

        let mut lock = Lockfile::acquire(&self.path)?;
        lock.write_all(&content)?;
        lock.commit()
    }
}
