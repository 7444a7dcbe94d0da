//! Object database
//!
//! Content-addressed storage for all repository objects across two tiers:
//!
//! - loose objects at `objects/<xx>/<rest>`, zlib-deflated framed bytes
//! - packfiles under `objects/pack/`, consulted when a loose file is absent
//!
//! Every load re-hashes the framed bytes and compares the digest with the
//! requested id; a mismatch is corruption and is never silently recovered.
//! Decoded objects are held in a bounded LRU cache keyed by id; objects
//! are immutable, so the cache never needs invalidation.

use crate::artifacts::core::errors::GitError;
use crate::artifacts::core::hasher::Hasher;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::merge::bases::SlimCommit;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object::{Object, ObjectBox, Unpackable, frame};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tag::Tag;
use crate::artifacts::objects::tree::Tree;
use crate::artifacts::pack::reader::{Packfile, explode};
use anyhow::Context;
use bytes::Bytes;
use fake::rand;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Decoded objects kept in memory
const CACHE_CAPACITY: usize = 512;

/// Git object database
#[derive(Debug)]
pub struct Database {
    /// Path to the objects directory (typically `.git/objects`)
    path: Box<Path>,
    cache: RefCell<ObjectCache>,
    /// Lazily opened packfiles; `None` until first pack access
    packs: RefCell<Option<Vec<Packfile>>>,
}

impl Database {
    pub fn new(path: Box<Path>) -> Self {
        Database {
            path,
            cache: RefCell::new(ObjectCache::new(CACHE_CAPACITY)),
            packs: RefCell::new(None),
        }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    pub fn pack_dir(&self) -> PathBuf {
        self.path.join("pack")
    }

    /// Store an object; idempotent, returns the object id
    pub fn store(&self, object: &impl Object) -> anyhow::Result<ObjectId> {
        let framed = object.serialize()?;
        let oid = ObjectId::from_raw(Hasher::hash_all(&framed));
        self.write_loose(&oid, &framed)?;
        Ok(oid)
    }

    /// Store from a kind and unframed payload (pack ingestion)
    pub fn store_raw(&self, object_type: ObjectType, payload: &[u8]) -> anyhow::Result<ObjectId> {
        let framed = frame(object_type, payload)?;
        let oid = ObjectId::from_raw(Hasher::hash_all(&framed));
        self.write_loose(&oid, &framed)?;
        Ok(oid)
    }

    fn write_loose(&self, oid: &ObjectId, framed: &Bytes) -> anyhow::Result<()> {
        let object_path = self.path.join(oid.to_path());
        if object_path.exists() {
            return Ok(()); // same id means byte-identical content
        }

        let object_dir = object_path
            .parent()
            .context("loose object path has no parent")?;
        std::fs::create_dir_all(object_dir)
            .with_context(|| format!("unable to create {}", object_dir.display()))?;

        let compressed = Self::compress(framed)?;
        let temp_path = object_dir.join(Self::generate_temp_name());

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .with_context(|| format!("unable to open {}", temp_path.display()))?;
        file.write_all(&compressed)
            .with_context(|| format!("unable to write {}", temp_path.display()))?;
        drop(file);

        // rename makes the write atomic
        std::fs::rename(&temp_path, &object_path)
            .with_context(|| format!("unable to publish {}", object_path.display()))?;

        Ok(())
    }

    /// Load and verify the framed bytes of a loose object
    fn load_loose_framed(&self, oid: &ObjectId) -> anyhow::Result<Option<Bytes>> {
        let object_path = self.path.join(oid.to_path());
        if !object_path.exists() {
            return Ok(None);
        }

        let compressed = std::fs::read(&object_path)
            .with_context(|| format!("unable to read {}", object_path.display()))?;
        let framed = Self::decompress(&compressed)
            .map_err(|e| GitError::corrupt("object", format!("{oid}: {e:#}")))?;

        if Hasher::hash_all(&framed) != *oid.as_raw() {
            return Err(GitError::corrupt("object", format!("oid mismatch for {oid}")).into());
        }

        Ok(Some(framed))
    }

    /// Parse an object from any storage tier
    pub fn parse_object(&self, oid: &ObjectId) -> anyhow::Result<ObjectBox> {
        if let Some(object) = self.cache.borrow_mut().get(oid) {
            return Ok(object);
        }

        let (object_type, payload) = self.raw_parts_uncached(oid)?;
        let reader = Cursor::new(&payload);
        let object = match object_type {
            ObjectType::Blob => ObjectBox::Blob(Box::new(Blob::deserialize(reader)?)),
            ObjectType::Tree => ObjectBox::Tree(Box::new(Tree::deserialize(reader)?)),
            ObjectType::Commit => ObjectBox::Commit(Box::new(Commit::deserialize(reader)?)),
            ObjectType::Tag => ObjectBox::Tag(Box::new(Tag::deserialize(reader)?)),
        };

        self.cache.borrow_mut().insert(*oid, object.clone());
        Ok(object)
    }

    pub fn parse_object_as_blob(&self, oid: &ObjectId) -> anyhow::Result<Option<Blob>> {
        match self.parse_object(oid)? {
            ObjectBox::Blob(blob) => Ok(Some(*blob)),
            _ => Ok(None),
        }
    }

    pub fn parse_object_as_tree(&self, oid: &ObjectId) -> anyhow::Result<Option<Tree>> {
        match self.parse_object(oid)? {
            ObjectBox::Tree(tree) => Ok(Some(*tree)),
            _ => Ok(None),
        }
    }

    pub fn parse_object_as_commit(&self, oid: &ObjectId) -> anyhow::Result<Option<Commit>> {
        match self.parse_object(oid)? {
            ObjectBox::Commit(commit) => Ok(Some(*commit)),
            _ => Ok(None),
        }
    }

    /// A tree, or the tree of a commit
    pub fn parse_tree_or_commit(&self, oid: &ObjectId) -> anyhow::Result<Tree> {
        match self.parse_object(oid)? {
            ObjectBox::Tree(tree) => Ok(*tree),
            ObjectBox::Commit(commit) => self.parse_tree_or_commit(commit.tree_oid()),
            _ => Err(GitError::InvalidArgument(format!("{oid} is not a tree or commit")).into()),
        }
    }

    /// Flatten a tree (or commit) into a path -> entry map; `None` is the
    /// empty tree
    pub fn flatten_tree(
        &self,
        oid: Option<&ObjectId>,
    ) -> anyhow::Result<BTreeMap<PathBuf, DatabaseEntry>> {
        let mut flattened = BTreeMap::new();
        if let Some(oid) = oid {
            self.flatten_into(oid, Path::new(""), &mut flattened)?;
        }
        Ok(flattened)
    }

    fn flatten_into(
        &self,
        oid: &ObjectId,
        prefix: &Path,
        flattened: &mut BTreeMap<PathBuf, DatabaseEntry>,
    ) -> anyhow::Result<()> {
        let tree = self.parse_tree_or_commit(oid)?;
        for (name, entry) in tree.into_entries() {
            let path = prefix.join(&name);
            if entry.is_tree() {
                self.flatten_into(&entry.oid, &path, flattened)?;
            } else {
                flattened.insert(path, entry);
            }
        }
        Ok(())
    }

    pub fn exists(&self, oid: &ObjectId) -> bool {
        if self.path.join(oid.to_path()).exists() {
            return true;
        }
        self.with_packs(|packs| packs.iter().any(|pack| pack.contains(oid)))
            .unwrap_or(false)
    }

    /// Kind and unframed payload, from whichever tier holds the object
    pub fn raw_parts(&self, oid: &ObjectId) -> anyhow::Result<(ObjectType, Bytes)> {
        self.raw_parts_uncached(oid)
    }

    fn raw_parts_uncached(&self, oid: &ObjectId) -> anyhow::Result<(ObjectType, Bytes)> {
        if let Some(framed) = self.load_loose_framed(oid)? {
            let mut reader = Cursor::new(framed.as_ref());
            let (object_type, declared) = ObjectType::parse_header(&mut reader)?;
            let payload = framed.slice(reader.position() as usize..);
            if payload.len() != declared {
                return Err(GitError::corrupt(
                    "object",
                    format!("{oid}: header declares {declared} bytes, found {}", payload.len()),
                )
                .into());
            }
            return Ok((object_type, payload));
        }

        let from_pack = self.with_packs(|packs| {
            for pack in packs {
                if let Some(found) = pack.get(oid).transpose() {
                    return Some(found);
                }
            }
            None
        })?;

        match from_pack {
            Some(found) => {
                let (object_type, payload) = found?;
                let framed = frame(object_type, &payload)?;
                if Hasher::hash_all(&framed) != *oid.as_raw() {
                    return Err(
                        GitError::corrupt("object", format!("oid mismatch for {oid}")).into(),
                    );
                }
                Ok((object_type, payload))
            }
            None => Err(GitError::not_found("object", oid.to_hex()).into()),
        }
    }

    /// Every object id across loose storage and all packs
    pub fn iter_oids(&self) -> anyhow::Result<impl Iterator<Item = ObjectId>> {
        let mut oids: BTreeSet<ObjectId> = self.loose_oids()?.into_iter().collect();
        self.with_packs(|packs| {
            for pack in packs {
                oids.extend(pack.oids().copied());
            }
        })?;
        Ok(oids.into_iter())
    }

    /// Object ids stored loose, with their file paths
    pub fn loose_oids(&self) -> anyhow::Result<Vec<ObjectId>> {
        let mut oids = Vec::new();

        for shard in std::fs::read_dir(&self.path).into_iter().flatten() {
            let shard = shard?;
            let shard_name = shard.file_name().to_string_lossy().to_string();
            if shard_name.len() != 2 || !shard.path().is_dir() {
                continue;
            }

            for entry in std::fs::read_dir(shard.path())? {
                let entry = entry?;
                let rest = entry.file_name().to_string_lossy().to_string();
                if let Ok(oid) = ObjectId::try_parse(&format!("{shard_name}{rest}")) {
                    oids.push(oid);
                }
            }
        }

        Ok(oids)
    }

    /// Age of a loose object file, for the GC safety window
    pub fn loose_age(&self, oid: &ObjectId) -> anyhow::Result<Duration> {
        let metadata = std::fs::metadata(self.path.join(oid.to_path()))?;
        let modified = metadata.modified()?;
        Ok(SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO))
    }

    /// Remove a loose object file (GC only)
    pub fn remove_loose(&self, oid: &ObjectId) -> anyhow::Result<()> {
        let object_path = self.path.join(oid.to_path());
        if object_path.exists() {
            std::fs::remove_file(&object_path)
                .with_context(|| format!("unable to remove {}", object_path.display()))?;
            if let Some(parent) = object_path.parent()
                && parent.read_dir()?.next().is_none()
            {
                std::fs::remove_dir(parent).ok();
            }
        }
        Ok(())
    }

    /// Store every object of a pack stream, returning the ids written
    pub fn ingest_pack(&self, pack: &Bytes) -> anyhow::Result<Vec<ObjectId>> {
        let objects = explode(pack, |base_oid| {
            self.raw_parts(base_oid)
                .ok()
                .map(|(object_type, payload)| (object_type, payload))
        })?;

        let mut written = Vec::with_capacity(objects.len());
        for (oid, object_type, payload) in objects {
            let stored = self.store_raw(object_type, &payload)?;
            debug_assert_eq!(stored, oid);
            written.push(oid);
        }
        Ok(written)
    }

    /// Paths of every `.pack` currently on disk
    pub fn pack_paths(&self) -> anyhow::Result<Vec<PathBuf>> {
        let pack_dir = self.pack_dir();
        let mut paths = Vec::new();

        for entry in std::fs::read_dir(&pack_dir).into_iter().flatten() {
            let entry = entry?;
            if entry.path().extension().is_some_and(|ext| ext == "pack") {
                paths.push(entry.path());
            }
        }
        paths.sort();

        Ok(paths)
    }

    /// Drop the opened-pack set so newly written packs are seen
    pub fn refresh_packs(&self) {
        *self.packs.borrow_mut() = None;
    }

    fn with_packs<R>(&self, f: impl FnOnce(&[Packfile]) -> R) -> anyhow::Result<R> {
        let mut packs = self.packs.borrow_mut();
        if packs.is_none() {
            let mut opened = Vec::new();
            for path in self.pack_paths()? {
                opened.push(Packfile::open(&path)?);
            }
            *packs = Some(opened);
        }
        Ok(f(packs.as_ref().unwrap()))
    }

    /// All object ids starting with a hex prefix (abbreviated-id lookup)
    pub fn find_objects_by_prefix(&self, prefix: &str) -> anyhow::Result<Vec<ObjectId>> {
        Ok(self
            .iter_oids()?
            .filter(|oid| oid.to_hex().starts_with(prefix))
            .collect())
    }

    fn compress(data: &[u8]) -> anyhow::Result<Bytes> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(data)
            .context("unable to compress object content")?;
        encoder
            .finish()
            .map(Bytes::from)
            .context("unable to finish compressing object content")
    }

    fn decompress(data: &[u8]) -> anyhow::Result<Bytes> {
        let mut decoder = flate2::read::ZlibDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .context("bad zlib stream")?;
        Ok(Bytes::from(decompressed))
    }

    fn generate_temp_name() -> String {
        format!("tmp_obj_{}", rand::random::<u32>())
    }
}

/// Size-bounded object cache with LRU eviction
#[derive(Debug)]
struct ObjectCache {
    capacity: usize,
    tick: u64,
    slots: HashMap<ObjectId, (u64, ObjectBox)>,
}

impl ObjectCache {
    fn new(capacity: usize) -> Self {
        ObjectCache {
            capacity,
            tick: 0,
            slots: HashMap::new(),
        }
    }

    fn get(&mut self, oid: &ObjectId) -> Option<ObjectBox> {
        self.tick += 1;
        let tick = self.tick;
        self.slots.get_mut(oid).map(|slot| {
            slot.0 = tick;
            slot.1.clone()
        })
    }

    fn insert(&mut self, oid: ObjectId, object: ObjectBox) {
        self.tick += 1;
        if self.slots.len() >= self.capacity && !self.slots.contains_key(&oid) {
            let evict = self
                .slots
                .iter()
                .min_by_key(|(_, (tick, _))| *tick)
                .map(|(oid, _)| *oid);
            if let Some(evict) = evict {
                self.slots.remove(&evict);
            }
        }
        self.slots.insert(oid, (self.tick, object));
    }
}

/// Commit cache for graph traversal algorithms
///
/// Merge-base finding touches the same commits repeatedly; this cache
/// keeps their slim form (parents and timestamp) behind interior
/// mutability so a `Fn` loader closure can lazily populate it.
#[derive(Debug, Default)]
pub struct CommitCache {
    commits: RefCell<HashMap<ObjectId, SlimCommit>>,
}

impl CommitCache {
    pub fn new() -> Self {
        CommitCache::default()
    }

    pub fn get_or_load(&self, database: &Database, oid: &ObjectId) -> anyhow::Result<SlimCommit> {
        if let Some(slim) = self.commits.borrow().get(oid) {
            return Ok(slim.clone());
        }

        let commit = database
            .parse_object_as_commit(oid)?
            .ok_or_else(|| anyhow::anyhow!("{oid} is not a commit"))?;
        let slim = SlimCommit {
            oid: *oid,
            parents: commit.parents().to_vec(),
            timestamp: commit.timestamp(),
        };

        self.commits.borrow_mut().insert(*oid, slim.clone());
        Ok(slim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn database() -> (assert_fs::TempDir, Database) {
        let dir = assert_fs::TempDir::new().unwrap();
        let database = Database::new(dir.path().join("objects").into_boxed_path());
        (dir, database)
    }

    #[rstest]
    fn test_store_is_idempotent_and_returns_the_oid(database: (assert_fs::TempDir, Database)) {
        let (_dir, database) = database;
        let blob = Blob::new(Bytes::from_static(b"hello\n"));

        let first = database.store(&blob).unwrap();
        let second = database.store(&blob).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.to_hex(), "ce013625030ba8dba906f756967f9e9ca394464a");
        assert!(database.exists(&first));
    }

    #[rstest]
    fn test_round_trip_through_parse(database: (assert_fs::TempDir, Database)) {
        let (_dir, database) = database;
        let blob = Blob::new(Bytes::from_static(b"content with\0binary\n"));
        let oid = database.store(&blob).unwrap();

        let loaded = database.parse_object_as_blob(&oid).unwrap().unwrap();
        assert_eq!(loaded.content(), blob.content());
    }

    #[rstest]
    fn test_missing_object_is_not_found(database: (assert_fs::TempDir, Database)) {
        let (_dir, database) = database;
        let absent = ObjectId::try_parse("0000000000000000000000000000000000000001").unwrap();

        let error = database.parse_object(&absent).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<GitError>(),
            Some(GitError::NotFound { .. })
        ));
    }

    #[rstest]
    fn test_tampered_loose_object_is_corrupt(database: (assert_fs::TempDir, Database)) {
        let (_dir, database) = database;
        let oid = database
            .store(&Blob::new(Bytes::from_static(b"hello\n")))
            .unwrap();

        // overwrite with a valid zlib stream holding different content
        let forged = Database::compress(b"blob 4\0evil").unwrap();
        std::fs::write(database.objects_path().join(oid.to_path()), &forged).unwrap();

        let error = database.parse_object(&oid).unwrap_err();
        let corrupt = error.downcast_ref::<GitError>();
        assert!(matches!(corrupt, Some(GitError::Corrupt { .. })));
        assert!(error.to_string().contains("oid mismatch"));
    }

    #[rstest]
    fn test_header_length_mismatch_is_corrupt(database: (assert_fs::TempDir, Database)) {
        let (_dir, database) = database;

        // frame claims 3 bytes but carries 5; store it under its real digest
        let framed = b"blob 3\0abcde";
        let oid = ObjectId::from_raw(Hasher::hash_all(framed));
        let path = database.objects_path().join(oid.to_path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, Database::compress(framed).unwrap()).unwrap();

        let error = database.parse_object(&oid).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<GitError>(),
            Some(GitError::Corrupt { .. })
        ));
    }

    #[rstest]
    fn test_iter_oids_sees_loose_and_packed(database: (assert_fs::TempDir, Database)) {
        let (_dir, database) = database;
        let loose = database
            .store(&Blob::new(Bytes::from_static(b"loose\n")))
            .unwrap();

        let payload = Bytes::from_static(b"packed\n");
        let framed = frame(ObjectType::Blob, &payload).unwrap();
        let packed_oid = ObjectId::from_raw(Hasher::hash_all(&framed));
        crate::artifacts::pack::writer::write_pack(
            &database.pack_dir(),
            &[(packed_oid, ObjectType::Blob, payload)],
        )
        .unwrap();
        database.refresh_packs();

        let oids: Vec<ObjectId> = database.iter_oids().unwrap().collect();
        assert!(oids.contains(&loose));
        assert!(oids.contains(&packed_oid));

        let (object_type, payload) = database.raw_parts(&packed_oid).unwrap();
        assert_eq!(object_type, ObjectType::Blob);
        assert_eq!(payload.as_ref(), b"packed\n");
    }

    #[rstest]
    fn test_ingest_pack_round_trip(database: (assert_fs::TempDir, Database)) {
        let (_dir, database) = database;

        let payload = Bytes::from_static(b"shipped\n");
        let framed = frame(ObjectType::Blob, &payload).unwrap();
        let oid = ObjectId::from_raw(Hasher::hash_all(&framed));
        let stream = crate::artifacts::pack::writer::build_stream(&[(
            oid,
            ObjectType::Blob,
            payload.clone(),
        )])
        .unwrap();

        let written = database.ingest_pack(&stream).unwrap();
        assert_eq!(written, vec![oid]);
        let blob = database.parse_object_as_blob(&oid).unwrap().unwrap();
        assert_eq!(blob.content(), &payload);
    }

    #[rstest]
    fn test_prefix_search(database: (assert_fs::TempDir, Database)) {
        let (_dir, database) = database;
        let oid = database
            .store(&Blob::new(Bytes::from_static(b"hello\n")))
            .unwrap();

        let matches = database.find_objects_by_prefix("ce0136").unwrap();
        assert_eq!(matches, vec![oid]);
        assert!(database.find_objects_by_prefix("ffff").unwrap().is_empty());
    }
}
