//! Reference naming and persistence helpers
//!
//! - `ref_name`: validated names in the slash-delimited ref namespace
//! - `packed_refs`: the compact `packed-refs` fallback file
//! - `reflog`: append-only logs of ref mutations

pub mod packed_refs;
pub mod ref_name;
pub mod reflog;
