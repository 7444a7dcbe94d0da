//! Command implementations
//!
//! Commands are thin `impl Repository` blocks: porcelain for the
//! user-facing surface, plumbing for the low-level helpers the test
//! harness drives.

pub mod plumbing;
pub mod porcelain;
