//! Maintenance: gc, pack, repack
//!
//! The reachable set is everything transitively referenced by any ref,
//! any reflog entry, or the index; unreachable loose objects must also
//! outlive a safety window before pruning touches them.

use crate::areas::repository::Repository;
use crate::artifacts::gc::reachable_objects;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::pack::reader::Packfile;
use crate::artifacts::pack::writer::write_pack;
use crate::artifacts::refs::reflog;
use std::collections::BTreeSet;
use std::io::Write;
use std::time::Duration;

/// Unreachable loose objects younger than this survive a gc run
const GC_SAFETY_WINDOW: Duration = Duration::from_secs(14 * 24 * 60 * 60);

impl Repository {
    /// Prune unreachable loose objects past the safety window
    pub fn gc(&mut self) -> anyhow::Result<()> {
        self.ensure_initialized()?;

        let reachable = reachable_objects(self.database(), self.reachability_tips()?)?;

        let mut removed = 0usize;
        for oid in self.database().loose_oids()? {
            if reachable.contains(&oid) {
                continue;
            }
            if self.database().loose_age(&oid)? < GC_SAFETY_WINDOW {
                continue;
            }
            self.database().remove_loose(&oid)?;
            removed += 1;
        }

        writeln!(self.writer(), "Removed {removed} unreachable objects")?;
        Ok(())
    }

    /// Write every reachable object into a fresh pack
    pub fn pack(&mut self) -> anyhow::Result<()> {
        self.ensure_initialized()?;

        let (count, _) = self.write_reachable_pack()?;
        writeln!(self.writer(), "Packed {count} objects")?;
        Ok(())
    }

    /// Pack reachable objects, then retire superseded loose copies and
    /// wholly superseded older packs
    pub fn repack(&mut self) -> anyhow::Result<()> {
        self.ensure_initialized()?;

        let reachable = reachable_objects(self.database(), self.reachability_tips()?)?;
        let (count, written) = self.write_reachable_pack()?;

        for oid in self.database().loose_oids()? {
            if reachable.contains(&oid) {
                self.database().remove_loose(&oid)?;
            }
        }

        // an old pack is superseded when every object it holds is also in
        // the pack just written
        if let Some(written) = written {
            let fresh = Packfile::open(&written)?;
            let packed: BTreeSet<ObjectId> = fresh.oids().copied().collect();

            for path in self.database().pack_paths()? {
                if path == written {
                    continue;
                }
                let old = Packfile::open(&path)?;
                if old.oids().all(|oid| packed.contains(oid)) {
                    std::fs::remove_file(&path)?;
                    std::fs::remove_file(path.with_extension("idx"))?;
                }
            }
        }
        self.database().refresh_packs();

        writeln!(self.writer(), "Repacked {count} objects")?;
        Ok(())
    }

    fn write_reachable_pack(&self) -> anyhow::Result<(usize, Option<std::path::PathBuf>)> {
        let reachable = reachable_objects(self.database(), self.reachability_tips()?)?;

        let mut objects = Vec::with_capacity(reachable.len());
        for oid in reachable {
            let (object_type, payload) = self.database().raw_parts(&oid)?;
            objects.push((oid, object_type, payload));
        }

        if objects.is_empty() {
            return Ok((0, None));
        }

        let written = write_pack(&self.database().pack_dir(), &objects)?;
        self.database().refresh_packs();
        Ok((objects.len(), Some(written)))
    }

    /// Every id that counts as a GC root
    fn reachability_tips(&self) -> anyhow::Result<Vec<ObjectId>> {
        let mut tips = Vec::new();

        for (name, oid) in self.refs().list("refs/")? {
            tips.push(oid);
            for entry in reflog::read(self.git_dir(), &name) {
                tips.push(entry.old_oid);
                tips.push(entry.new_oid);
            }
        }
        if let Some(head) = self.refs().read_head()? {
            tips.push(head);
        }
        for entry in reflog::read(self.git_dir(), &crate::artifacts::refs::ref_name::RefName::head())
        {
            tips.push(entry.old_oid);
            tips.push(entry.new_oid);
        }

        let mut index = self.index();
        index.rehydrate()?;
        tips.extend(index.entries().map(|entry| entry.oid));

        Ok(tips)
    }
}
