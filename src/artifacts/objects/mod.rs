//! Object kinds and their canonical encodings
//!
//! The four object kinds (blob, tree, commit, tag) plus the shared pieces:
//! identifiers, entry modes, person records, and the framing traits.

pub mod blob;
pub mod commit;
pub mod entry_mode;
pub mod object;
pub mod object_id;
pub mod object_type;
pub mod person;
pub mod tag;
pub mod tree;
