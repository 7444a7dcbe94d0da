//! Staging index
//!
//! The index is the ordered set of tracked paths that the next commit will
//! encode as a tree. Entries are keyed by `(path, stage)`: stage 0 is the
//! normal merged state, stages 1/2/3 appear only while a merge conflict is
//! unresolved.
//!
//! ## File format
//!
//! Header (`DIRC`, version 2, entry count), entries sorted by
//! `(path, stage)`, then a SHA-1 checksum over everything preceding it.
//! Loads verify the checksum; writes go through a lockfile and land with a
//! rename.

use crate::areas::database::Database;
use crate::areas::workspace::Workspace;
use crate::artifacts::core::errors::GitError;
use crate::artifacts::core::lockfile::Lockfile;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::checksum::Checksum;
use crate::artifacts::index::index_entry::{ENTRY_BLOCK, ENTRY_MIN_SIZE, IndexEntry, Stage};
use crate::artifacts::index::index_header::IndexHeader;
use crate::artifacts::index::{HEADER_SIZE, SIGNATURE, VERSION};
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::Tree;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct Index {
    /// Path to the index file (typically `.git/index`)
    path: Box<Path>,
    /// Tracked entries, ordered by `(path, stage)`
    entries: BTreeMap<(PathBuf, Stage), IndexEntry>,
    /// Directory -> tracked descendants, for file/directory conflicts
    children: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    header: IndexHeader,
    changed: bool,
}

impl Index {
    pub fn new(path: Box<Path>) -> Self {
        Index {
            path,
            entries: BTreeMap::new(),
            children: BTreeMap::new(),
            header: IndexHeader::empty(),
            changed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.children.clear();
        self.header = IndexHeader::empty();
        self.changed = false;
    }

    /// Drop every entry and mark the index dirty (post-commit state)
    pub fn clear_entries(&mut self) {
        self.clear();
        self.changed = true;
    }

    /// Load the index from disk, verifying signature, version, and
    /// checksum; a missing file is an empty index
    pub fn rehydrate(&mut self) -> anyhow::Result<()> {
        self.clear();

        if !self.path.exists() {
            return Ok(());
        }

        let mut index_file = std::fs::OpenOptions::new().read(true).open(&self.path)?;
        let lock = file_guard::lock(&mut index_file, file_guard::Lock::Shared, 0, 1)?;
        if lock.metadata()?.len() == 0 {
            return Ok(());
        }

        let mut reader = Checksum::new(&**lock);
        let entries_count = self.parse_header(&mut reader)?;
        self.parse_entries(entries_count, &mut reader)?;

        reader.verify()
    }

    fn parse_header(&mut self, reader: &mut Checksum<&std::fs::File>) -> anyhow::Result<u32> {
        let header_bytes = reader.read(HEADER_SIZE)?;
        let header = IndexHeader::deserialize(&header_bytes)?;

        if header.marker != SIGNATURE {
            return Err(GitError::corrupt("index", "invalid signature").into());
        }
        if header.version != VERSION {
            return Err(GitError::corrupt(
                "index",
                format!("unsupported version: {}", header.version),
            )
            .into());
        }

        let count = header.entries_count;
        self.header = header;
        Ok(count)
    }

    fn parse_entries(
        &mut self,
        entries_count: u32,
        reader: &mut Checksum<&std::fs::File>,
    ) -> anyhow::Result<()> {
        for _ in 0..entries_count {
            let mut entry_bytes = reader.read(ENTRY_MIN_SIZE)?.to_vec();

            // entries are NUL-padded to 8-byte blocks; keep reading blocks
            // until the terminator shows up
            while entry_bytes[entry_bytes.len() - 1] != 0 {
                entry_bytes.extend_from_slice(&reader.read(ENTRY_BLOCK)?);
            }

            let entry = IndexEntry::deserialize(&entry_bytes)?;
            self.store_entry(entry);
        }

        Ok(())
    }

    /// Stage a working-tree file: hash it, store the blob, record the
    /// entry at stage 0 (collapsing any conflict stages for the path)
    pub fn stage(
        &mut self,
        path: &Path,
        workspace: &Workspace,
        database: &Database,
    ) -> anyhow::Result<()> {
        let content = workspace.read_file(path)?;
        let oid = database.store(&Blob::new(content))?;
        let metadata = workspace.stat_file(path)?;

        self.add(IndexEntry::new(
            path.to_path_buf(),
            oid,
            Stage::Merged,
            metadata,
        ));
        Ok(())
    }

    /// Remove all stages of a path (and any tracked descendants)
    pub fn unstage(&mut self, path: &Path) {
        self.remove_all_stages(path);
        self.remove_children(path);
        self.sync_count();
    }

    /// Insert an entry, clearing whatever it supersedes
    pub fn add(&mut self, entry: IndexEntry) {
        if entry.stage == Stage::Merged {
            // stage 0 collapses any conflict stages for the path
            self.remove_all_stages(&entry.name);
        }
        self.discard_conflicts(&entry);
        self.store_entry(entry);
        self.sync_count();
    }

    /// Record a conflicted path: stage-0 goes away, stages 1/2/3 hold the
    /// base/ours/theirs versions that exist
    pub fn add_conflict(
        &mut self,
        path: &Path,
        base: Option<&DatabaseEntry>,
        ours: Option<&DatabaseEntry>,
        theirs: Option<&DatabaseEntry>,
    ) {
        self.remove_all_stages(path);

        for (stage, entry) in [
            (Stage::Base, base),
            (Stage::Ours, ours),
            (Stage::Theirs, theirs),
        ] {
            if let Some(entry) = entry {
                self.store_entry(IndexEntry::new(
                    path.to_path_buf(),
                    entry.oid,
                    stage,
                    crate::artifacts::index::index_entry::EntryMetadata {
                        mode: entry.mode,
                        ..Default::default()
                    },
                ));
            }
        }
        self.sync_count();
    }

    /// All entries for a path, keyed by stage
    pub fn entries_at(&self, path: &Path) -> BTreeMap<Stage, &IndexEntry> {
        self.entries
            .range((path.to_path_buf(), Stage::Merged)..=(path.to_path_buf(), Stage::Theirs))
            .map(|((_, stage), entry)| (*stage, entry))
            .collect()
    }

    pub fn entry_by_path(&self, path: &Path) -> Option<&IndexEntry> {
        self.entries.get(&(path.to_path_buf(), Stage::Merged))
    }

    /// Entries in `(path, stage)` order
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    /// Stage-0 entries only
    pub fn merged_entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries().filter(|entry| entry.stage == Stage::Merged)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_conflicts(&self) -> bool {
        self.entries().any(|entry| entry.stage != Stage::Merged)
    }

    pub fn conflict_paths(&self) -> Vec<PathBuf> {
        let paths: BTreeSet<PathBuf> = self
            .entries()
            .filter(|entry| entry.stage != Stage::Merged)
            .map(|entry| entry.name.clone())
            .collect();
        paths.into_iter().collect()
    }

    /// Is the working-tree file different from the staged content?
    ///
    /// The stat identity (ctime, mtime, dev, ino, size) short-circuits the
    /// common unchanged case; zeroed metadata always falls through to
    /// re-hashing the file.
    pub fn is_modified(&self, entry: &IndexEntry, workspace: &Workspace) -> anyhow::Result<bool> {
        let actual = workspace.stat_file(&entry.name)?;
        if entry.metadata.ctime != 0 && entry.stat_identity_matches(&actual) {
            return Ok(false);
        }

        let content = workspace.read_file(&entry.name)?;
        let fresh_oid = Blob::new(content).object_id()?;
        Ok(fresh_oid != entry.oid)
    }

    /// Materialize tree objects from the stage-0 entries, writing every
    /// subtree to the database in one post-order pass
    pub fn tree_write(&self, database: &Database) -> anyhow::Result<ObjectId> {
        let root = Tree::build(self.merged_entries())?;
        root.traverse(&|tree| {
            database.store(tree)?;
            Ok(())
        })?;
        root.object_id()
    }

    /// Replace the whole index with the content of a flattened tree,
    /// taking fresh stat metadata from the working tree
    pub fn reset_from_entries(
        &mut self,
        entries: &BTreeMap<PathBuf, DatabaseEntry>,
        workspace: &Workspace,
    ) {
        self.clear();
        for (path, entry) in entries {
            let metadata = workspace.stat_file(path).unwrap_or_else(|_| {
                crate::artifacts::index::index_entry::EntryMetadata {
                    mode: entry.mode,
                    ..Default::default()
                }
            });
            self.store_entry(IndexEntry::new(
                path.clone(),
                entry.oid,
                Stage::Merged,
                metadata,
            ));
        }
        self.sync_count();
    }

    /// Persist the index atomically (lockfile + rename), checksummed
    pub fn write_updates(&mut self) -> anyhow::Result<()> {
        let mut writer = Checksum::new(Vec::new());

        self.header = IndexHeader::new(
            SIGNATURE.to_string(),
            VERSION,
            self.entries.len() as u32,
        );
        writer.write(&self.header.serialize()?)?;
        for entry in self.entries.values() {
            writer.write(&entry.serialize()?)?;
        }
        let content = writer.write_checksum()?;

        let mut lock = Lockfile::acquire(&self.path)?;
        lock.write_all(&content)?;
        lock.commit()?;

        self.changed = false;
        Ok(())
    }

    fn sync_count(&mut self) {
        self.header.entries_count = self.entries.len() as u32;
        self.changed = true;
    }

    fn store_entry(&mut self, entry: IndexEntry) {
        for parent in entry.parent_dirs() {
            self.children
                .entry(parent.to_path_buf())
                .or_default()
                .insert(entry.name.clone());
        }
        self.entries
            .insert((entry.name.clone(), entry.stage), entry);
    }

    /// Remove whatever would collide with the new entry: an ancestor
    /// tracked as a file, or tracked files under the entry's name
    fn discard_conflicts(&mut self, entry: &IndexEntry) {
        for parent in entry
            .parent_dirs()
            .into_iter()
            .map(Path::to_path_buf)
            .collect::<Vec<_>>()
        {
            self.remove_all_stages(&parent);
        }
        self.remove_children(&entry.name);
    }

    fn remove_all_stages(&mut self, path: &Path) {
        for stage in [Stage::Merged, Stage::Base, Stage::Ours, Stage::Theirs] {
            self.remove_entry(path, stage);
        }
    }

    fn remove_children(&mut self, path: &Path) {
        if let Some(children) = self.children.remove(path) {
            for child in children {
                self.remove_all_stages(&child);
            }
        }
    }

    fn remove_entry(&mut self, path: &Path, stage: Stage) {
        let Some(entry) = self.entries.remove(&(path.to_path_buf(), stage)) else {
            return;
        };

        for parent in entry.parent_dirs() {
            if let Some(children) = self.children.get_mut(parent) {
                children.remove(path);
                if children.is_empty() {
                    self.children.remove(parent);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::index::index_entry::EntryMetadata;
    use crate::artifacts::objects::entry_mode::EntryMode;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    struct Fixture {
        _dir: assert_fs::TempDir,
        index: Index,
        workspace: Workspace,
        database: Database,
    }

    #[fixture]
    fn fixture() -> Fixture {
        let dir = assert_fs::TempDir::new().unwrap();
        let git_dir = dir.path().join(".git");
        std::fs::create_dir_all(&git_dir).unwrap();

        Fixture {
            index: Index::new(git_dir.join("index").into_boxed_path()),
            workspace: Workspace::new(dir.path().to_path_buf().into_boxed_path()),
            database: Database::new(git_dir.join("objects").into_boxed_path()),
            _dir: dir,
        }
    }

    fn oid(tag: u8) -> ObjectId {
        ObjectId::from_raw([tag; 20])
    }

    fn entry(path: &str, stage: Stage, tag: u8) -> IndexEntry {
        IndexEntry::new(PathBuf::from(path), oid(tag), stage, EntryMetadata::default())
    }

    #[rstest]
    fn test_stage_then_write_then_rehydrate(mut fixture: Fixture) {
        std::fs::write(fixture.workspace.path().join("hello.txt"), "hello\n").unwrap();

        fixture
            .index
            .stage(Path::new("hello.txt"), &fixture.workspace, &fixture.database)
            .unwrap();
        fixture.index.write_updates().unwrap();

        let mut reloaded = Index::new(fixture.index.path().to_path_buf().into_boxed_path());
        reloaded.rehydrate().unwrap();

        let entry = reloaded.entry_by_path(Path::new("hello.txt")).unwrap();
        assert_eq!(
            entry.oid.to_hex(),
            "ce013625030ba8dba906f756967f9e9ca394464a"
        );
        assert_eq!(entry.stage, Stage::Merged);
        assert!(entry.metadata.size == 6);
    }

    #[rstest]
    fn test_checksum_tampering_is_detected(mut fixture: Fixture) {
        std::fs::write(fixture.workspace.path().join("a.txt"), "a\n").unwrap();
        fixture
            .index
            .stage(Path::new("a.txt"), &fixture.workspace, &fixture.database)
            .unwrap();
        fixture.index.write_updates().unwrap();

        // flip a byte in the middle of the file
        let mut raw = std::fs::read(fixture.index.path()).unwrap();
        raw[20] ^= 0x01;
        std::fs::write(fixture.index.path(), &raw).unwrap();

        let mut reloaded = Index::new(fixture.index.path().to_path_buf().into_boxed_path());
        assert!(reloaded.rehydrate().is_err());
    }

    #[rstest]
    fn test_conflict_stages_collapse_on_stage0(mut fixture: Fixture) {
        let base = DatabaseEntry::new(oid(1), EntryMode::Regular);
        let ours = DatabaseEntry::new(oid(2), EntryMode::Regular);
        let theirs = DatabaseEntry::new(oid(3), EntryMode::Regular);

        fixture.index.add_conflict(
            Path::new("hello.txt"),
            Some(&base),
            Some(&ours),
            Some(&theirs),
        );

        assert!(fixture.index.has_conflicts());
        let stages = fixture.index.entries_at(Path::new("hello.txt"));
        assert_eq!(
            stages.keys().copied().collect::<Vec<_>>(),
            vec![Stage::Base, Stage::Ours, Stage::Theirs]
        );

        fixture.index.add(entry("hello.txt", Stage::Merged, 9));
        assert!(!fixture.index.has_conflicts());
        assert_eq!(fixture.index.entries_at(Path::new("hello.txt")).len(), 1);
    }

    #[rstest]
    fn test_entries_iterate_in_path_stage_order(mut fixture: Fixture) {
        fixture.index.add(entry("b.txt", Stage::Merged, 1));
        fixture.index.add_conflict(
            Path::new("a.txt"),
            Some(&DatabaseEntry::new(oid(2), EntryMode::Regular)),
            Some(&DatabaseEntry::new(oid(3), EntryMode::Regular)),
            None,
        );

        let order: Vec<(PathBuf, Stage)> = fixture
            .index
            .entries()
            .map(|entry| (entry.name.clone(), entry.stage))
            .collect();
        assert_eq!(
            order,
            vec![
                (PathBuf::from("a.txt"), Stage::Base),
                (PathBuf::from("a.txt"), Stage::Ours),
                (PathBuf::from("b.txt"), Stage::Merged),
            ]
        );
    }

    #[rstest]
    fn test_file_replacing_directory_discards_children(mut fixture: Fixture) {
        fixture.index.add(entry("dir/inner.txt", Stage::Merged, 1));
        fixture.index.add(entry("dir", Stage::Merged, 2));

        assert!(fixture.index.entry_by_path(Path::new("dir")).is_some());
        assert!(
            fixture
                .index
                .entry_by_path(Path::new("dir/inner.txt"))
                .is_none()
        );
    }

    #[rstest]
    fn test_tree_write_produces_known_root(mut fixture: Fixture) {
        std::fs::write(fixture.workspace.path().join("hello.txt"), "hello\n").unwrap();
        fixture
            .index
            .stage(Path::new("hello.txt"), &fixture.workspace, &fixture.database)
            .unwrap();

        let first = fixture.index.tree_write(&fixture.database).unwrap();
        let second = fixture.index.tree_write(&fixture.database).unwrap();

        // deterministic, and the tree object itself is stored
        assert_eq!(first, second);
        assert!(fixture.database.exists(&first));
    }

    #[rstest]
    fn test_is_modified_detects_content_change(mut fixture: Fixture) {
        std::fs::write(fixture.workspace.path().join("hello.txt"), "hello\n").unwrap();
        fixture
            .index
            .stage(Path::new("hello.txt"), &fixture.workspace, &fixture.database)
            .unwrap();

        let entry = fixture
            .index
            .entry_by_path(Path::new("hello.txt"))
            .unwrap()
            .clone();
        assert!(!fixture.index.is_modified(&entry, &fixture.workspace).unwrap());

        std::fs::write(fixture.workspace.path().join("hello.txt"), "changed\n").unwrap();
        assert!(fixture.index.is_modified(&entry, &fixture.workspace).unwrap());
    }
}
