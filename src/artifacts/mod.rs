//! Data structures and algorithms
//!
//! This module contains the repository's core types and algorithms:
//!
//! - `core`: errors, SHA-1 hashing, lockfiles
//! - `objects`: the four object kinds and their canonical encodings
//! - `database`: tree entry types shared by diffs and merges
//! - `index`: staging-area entry and file formats
//! - `refs`: ref names, packed-refs, reflogs
//! - `pack`: packfile reading and writing
//! - `diff`: Myers line diff and two-tree diffing
//! - `merge`: merge bases, diff3, and the three-way tree merge
//! - `log`: commit history traversal
//! - `checkout`: working-tree migration plans
//! - `status`: working-tree status inspection
//! - `gc`: object-graph reachability
//! - `transport`: the object-set exchange interface

pub mod checkout;
pub mod core;
pub mod database;
pub mod diff;
pub mod gc;
pub mod index;
pub mod log;
pub mod merge;
pub mod objects;
pub mod pack;
pub mod refs;
pub mod status;
pub mod transport;
