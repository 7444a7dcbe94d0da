//! Database entry types shared by trees, diffs, and merges

pub mod database_entry;
