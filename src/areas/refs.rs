//! Reference store
//!
//! Named pointers into the object graph, stored as files under
//! `<gitdir>/refs/**` with a `packed-refs` fallback and a `HEAD` file at
//! the gitdir root. Reference files contain either a 40-character object
//! id or `ref: <target>` for symbolic references.
//!
//! ## Atomicity
//!
//! Every mutation is a compare-and-set through a lockfile: acquire
//! `<ref>.lock` with create-exclusive semantics, re-read the current
//! value under the lock, compare it with the caller's expectation, then
//! rename the staged value over the ref. A concurrent writer makes the
//! expectation fail with `RefStale` and the ref is left untouched. All
//! higher-level operations (branch creation, commit advancement, fetch
//! updates) funnel through this one primitive.
//!
//! Every successful mutation appends to the ref's reflog.

use crate::artifacts::core::errors::GitError;
use crate::artifacts::core::lockfile::Lockfile;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::person::Person;
use crate::artifacts::refs::packed_refs::PackedRefs;
use crate::artifacts::refs::ref_name::RefName;
use crate::artifacts::refs::reflog;
use anyhow::Context;
use derive_new::new;
use std::collections::BTreeMap;
use std::path::Path;
use walkdir::WalkDir;

/// Symbolic chains deeper than this are treated as cycles
const MAX_SYMREF_DEPTH: usize = 5;

/// The caller's expectation for a compare-and-set ref update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    /// The ref must not exist yet
    Unborn,
    /// The ref must currently hold exactly this id
    Oid(ObjectId),
    /// No expectation; always passes
    Any,
}

/// What the HEAD file points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Head {
    /// `ref: refs/heads/<branch>`, possibly unborn
    Symbolic(RefName),
    Detached(ObjectId),
}

/// Reference manager rooted at the gitdir
#[derive(Debug, new)]
pub struct Refs {
    path: Box<Path>,
}

impl Refs {
    pub fn git_dir(&self) -> &Path {
        &self.path
    }

    /// Parse the HEAD file (always present in a valid repository)
    pub fn head_state(&self) -> anyhow::Result<Head> {
        let head_path = self.path.join("HEAD");
        let content = std::fs::read_to_string(&head_path)
            .map_err(|_| GitError::not_found("ref", "HEAD"))?;
        let content = content.trim();

        match content.strip_prefix("ref: ") {
            Some(target) => Ok(Head::Symbolic(RefName::try_parse(target)?)),
            None => Ok(Head::Detached(ObjectId::try_parse(content)?)),
        }
    }

    /// The branch HEAD points at, `None` when detached
    pub fn head_target(&self) -> anyhow::Result<Option<RefName>> {
        match self.head_state()? {
            Head::Symbolic(target) => Ok(Some(target)),
            Head::Detached(_) => Ok(None),
        }
    }

    /// Resolve HEAD to an object id; `None` while the branch is unborn
    pub fn read_head(&self) -> anyhow::Result<Option<ObjectId>> {
        match self.head_state()? {
            Head::Symbolic(target) => self.read(&target),
            Head::Detached(oid) => Ok(Some(oid)),
        }
    }

    /// Resolve a ref to an object id, following symbolic refs transitively
    pub fn read(&self, name: &RefName) -> anyhow::Result<Option<ObjectId>> {
        self.resolve(name, 0)
    }

    fn resolve(&self, name: &RefName, depth: usize) -> anyhow::Result<Option<ObjectId>> {
        if depth > MAX_SYMREF_DEPTH {
            return Err(GitError::SymrefCycle(name.to_string()).into());
        }

        match self.read_raw(name)? {
            None => Ok(None),
            Some(content) => match content.strip_prefix("ref: ") {
                Some(target) => self.resolve(&RefName::try_parse(target)?, depth + 1),
                None => Ok(Some(ObjectId::try_parse(&content).map_err(|_| {
                    GitError::corrupt("ref", format!("{name} holds malformed content"))
                })?)),
            },
        }
    }

    /// The ref's own stored value: loose file first, then `packed-refs`
    fn read_raw(&self, name: &RefName) -> anyhow::Result<Option<String>> {
        let ref_path = self.path.join(name.as_ref_path());
        if ref_path.exists() {
            let content = std::fs::read_to_string(&ref_path)
                .with_context(|| format!("unable to read ref {name}"))?;
            return Ok(Some(content.trim().to_string()));
        }

        let packed = PackedRefs::load(&self.path.join("packed-refs"))?;
        Ok(packed.get(name).map(|oid| oid.to_hex()))
    }

    /// The ref's direct value, symbolic refs not followed
    fn read_direct(&self, name: &RefName) -> anyhow::Result<Option<ObjectId>> {
        match self.read_raw(name)? {
            Some(content) if !content.starts_with("ref: ") => {
                Ok(Some(ObjectId::try_parse(&content)?))
            }
            _ => Ok(None),
        }
    }

    /// Atomic compare-and-set write; the only primitive that mutates refs
    pub fn write(
        &self,
        name: &RefName,
        new_oid: &ObjectId,
        expected: Expected,
        ident: &Person,
        reason: &str,
    ) -> anyhow::Result<()> {
        let ref_path = self.path.join(name.as_ref_path());
        let mut lock = Lockfile::acquire(&ref_path)?;

        let actual = self.read_direct(name)?;
        check_expectation(name, expected, actual)?;

        lock.write_all(format!("{new_oid}\n").as_bytes())?;
        lock.commit()?;

        let old_oid = actual.unwrap_or_else(ObjectId::zero);
        reflog::append(&self.path, name, &old_oid, new_oid, ident, reason);

        Ok(())
    }

    /// Atomic compare-and-set delete
    pub fn delete(
        &self,
        name: &RefName,
        expected: Expected,
        ident: &Person,
        reason: &str,
    ) -> anyhow::Result<ObjectId> {
        let ref_path = self.path.join(name.as_ref_path());
        let lock = Lockfile::acquire(&ref_path)?;

        let actual = self.read_direct(name)?;
        check_expectation(name, expected, actual)?;
        let old_oid =
            actual.ok_or_else(|| GitError::not_found("ref", name.to_string()))?;

        if ref_path.exists() {
            std::fs::remove_file(&ref_path)
                .with_context(|| format!("unable to delete ref {name}"))?;
            self.prune_empty_parent_dirs(&ref_path)?;
        }
        PackedRefs::load(&self.path.join("packed-refs"))?.remove(name)?;
        lock.rollback();

        reflog::append(&self.path, name, &old_oid, &ObjectId::zero(), ident, reason);

        Ok(old_oid)
    }

    /// All refs under a namespace prefix, merging loose and packed
    /// entries; a loose file shadows its packed counterpart
    pub fn list(&self, prefix: &str) -> anyhow::Result<Vec<(RefName, ObjectId)>> {
        let mut merged: BTreeMap<String, ObjectId> = BTreeMap::new();

        let packed = PackedRefs::load(&self.path.join("packed-refs"))?;
        for (name, oid) in packed.entries() {
            if name.starts_with(prefix) {
                merged.insert(name.clone(), *oid);
            }
        }

        let refs_root = self.path.join("refs");
        for entry in WalkDir::new(&refs_root).into_iter().filter_map(|e| e.ok()) {
            if !entry.path().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(self.path.as_ref()) else {
                continue;
            };
            let name = relative.to_string_lossy().to_string();
            if !name.starts_with(prefix) || name.ends_with(".lock") {
                continue;
            }

            let ref_name = RefName::try_parse(&name)?;
            if let Some(oid) = self.read(&ref_name)? {
                merged.insert(name, oid);
            }
        }

        merged
            .into_iter()
            .map(|(name, oid)| Ok((RefName::try_parse(&name)?, oid)))
            .collect()
    }

    /// Point HEAD at a branch (possibly unborn)
    pub fn set_head_symbolic(&self, target: &RefName) -> anyhow::Result<()> {
        let mut lock = Lockfile::acquire(&self.path.join("HEAD"))?;
        lock.write_all(format!("ref: {target}\n").as_bytes())?;
        lock.commit()
    }

    /// Detach HEAD at a specific commit
    pub fn set_head_detached(&self, oid: &ObjectId) -> anyhow::Result<()> {
        let mut lock = Lockfile::acquire(&self.path.join("HEAD"))?;
        lock.write_all(format!("{oid}\n").as_bytes())?;
        lock.commit()
    }

    /// Advance whatever HEAD points at (branch tip or detached position)
    /// and mirror the mutation into HEAD's own reflog
    pub fn advance_head(
        &self,
        new_oid: &ObjectId,
        expected: Expected,
        ident: &Person,
        reason: &str,
    ) -> anyhow::Result<()> {
        let old_oid = self.read_head()?;

        match self.head_state()? {
            Head::Symbolic(target) => {
                self.write(&target, new_oid, expected, ident, reason)?;
            }
            Head::Detached(current) => {
                if let Expected::Oid(expected_oid) = expected
                    && expected_oid != current
                {
                    return Err(GitError::RefStale {
                        name: "HEAD".to_string(),
                        expected: expected_oid.to_hex(),
                        actual: current.to_hex(),
                    }
                    .into());
                }
                self.set_head_detached(new_oid)?;
            }
        }

        reflog::append(
            &self.path,
            &RefName::head(),
            &old_oid.unwrap_or_else(ObjectId::zero),
            new_oid,
            ident,
            reason,
        );

        Ok(())
    }

    fn prune_empty_parent_dirs(&self, path: &Path) -> anyhow::Result<()> {
        let stop = self.path.join("refs");
        let mut current = path.parent();

        while let Some(dir) = current {
            if dir == stop || dir == self.path.as_ref() {
                break;
            }
            if dir.read_dir()?.next().is_some() {
                break;
            }
            std::fs::remove_dir(dir)
                .with_context(|| format!("unable to remove {}", dir.display()))?;
            current = dir.parent();
        }

        Ok(())
    }
}

fn check_expectation(
    name: &RefName,
    expected: Expected,
    actual: Option<ObjectId>,
) -> anyhow::Result<()> {
    let satisfied = match expected {
        Expected::Any => true,
        Expected::Unborn => actual.is_none(),
        Expected::Oid(oid) => actual == Some(oid),
    };

    if satisfied {
        return Ok(());
    }

    let display = |value: Option<ObjectId>| {
        value
            .map(|oid| oid.to_hex())
            .unwrap_or_else(|| "unborn".to_string())
    };
    Err(GitError::RefStale {
        name: name.to_string(),
        expected: match expected {
            Expected::Unborn => "unborn".to_string(),
            Expected::Oid(oid) => oid.to_hex(),
            Expected::Any => unreachable!(),
        },
        actual: display(actual),
    }
    .into())
}
