//! Reachability over the object graph
//!
//! Garbage collection, repacking, and the object-set exchange all need the
//! same primitive: the transitive closure of a set of starting points over
//! commit parents, commit trees, tree entries, and tag targets.

use crate::areas::database::Database;
use crate::artifacts::objects::object::ObjectBox;
use crate::artifacts::objects::object_id::ObjectId;
use std::collections::BTreeSet;

/// Collect every object reachable from `tips`
///
/// Tips may be commits, tags, trees, or blobs; ids that do not exist in
/// any storage tier are skipped (a ref may point at an object that only
/// lives on a remote).
pub fn reachable_objects(
    database: &Database,
    tips: impl IntoIterator<Item = ObjectId>,
) -> anyhow::Result<BTreeSet<ObjectId>> {
    let mut reachable = BTreeSet::new();
    let mut pending: Vec<ObjectId> = tips.into_iter().collect();

    while let Some(oid) = pending.pop() {
        if oid.is_zero() || reachable.contains(&oid) || !database.exists(&oid) {
            continue;
        }
        reachable.insert(oid);

        match database.parse_object(&oid)? {
            ObjectBox::Commit(commit) => {
                pending.push(*commit.tree_oid());
                pending.extend(commit.parents().iter().copied());
            }
            ObjectBox::Tree(tree) => {
                pending.extend(tree.entries().map(|(_, entry)| entry.oid));
            }
            ObjectBox::Tag(tag) => {
                pending.push(*tag.object_oid());
            }
            ObjectBox::Blob(_) => {}
        }
    }

    Ok(reachable)
}
