//! Diff algorithms
//!
//! - `myers`: shortest-edit-script line diff, the anchor layer for the
//!   three-way content merge
//! - `tree_diff`: recursive changeset between two tree objects, feeding
//!   checkout migrations and status

pub mod myers;
pub mod tree_diff;
