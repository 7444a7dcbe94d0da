//! Reflogs
//!
//! Every successful ref mutation appends a line to `logs/<refname>`:
//!
//! ```text
//! <old-oid> <new-oid> <ident> <secs> <±HHMM>\t<reason>
//! ```
//!
//! The all-zeros id marks creation (old) and deletion (new). Reflog writes
//! are best-effort: a failure is reported on stderr but never promoted to
//! an operation failure, so a read-only `logs/` directory cannot block
//! commits.

use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::person::Person;
use crate::artifacts::refs::ref_name::RefName;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflogEntry {
    pub old_oid: ObjectId,
    pub new_oid: ObjectId,
    pub reason: String,
}

/// Append a mutation record for `name`; never fails
pub fn append(
    git_dir: &Path,
    name: &RefName,
    old_oid: &ObjectId,
    new_oid: &ObjectId,
    ident: &Person,
    reason: &str,
) {
    let result = try_append(git_dir, name, old_oid, new_oid, ident, reason);
    if let Err(error) = result {
        eprintln!("warning: unable to append reflog for {name}: {error:#}");
    }
}

fn try_append(
    git_dir: &Path,
    name: &RefName,
    old_oid: &ObjectId,
    new_oid: &ObjectId,
    ident: &Person,
    reason: &str,
) -> anyhow::Result<()> {
    let log_path = git_dir.join(name.as_log_path());
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(&log_path)?;
    writeln!(
        file,
        "{old_oid} {new_oid} {}\t{reason}",
        ident.display()
    )?;

    Ok(())
}

/// Read every recorded mutation for `name`, oldest first
///
/// A missing log is an empty history; unparsable lines are skipped so a
/// damaged reflog never blocks reachability scans.
pub fn read(git_dir: &Path, name: &RefName) -> Vec<ReflogEntry> {
    let log_path = git_dir.join(name.as_log_path());
    let Ok(content) = std::fs::read_to_string(&log_path) else {
        return Vec::new();
    };

    content
        .lines()
        .filter_map(|line| {
            let (oids_and_ident, reason) = line.split_once('\t')?;
            let mut fields = oids_and_ident.split(' ');
            let old_oid = ObjectId::try_parse(fields.next()?).ok()?;
            let new_oid = ObjectId::try_parse(fields.next()?).ok()?;

            Some(ReflogEntry {
                old_oid,
                new_oid,
                reason: reason.to_string(),
            })
        })
        .collect()
}
