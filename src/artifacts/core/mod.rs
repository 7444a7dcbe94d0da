//! Shared low-level building blocks
//!
//! This module contains the primitives every other component leans on:
//!
//! - `errors`: the error taxonomy surfaced by repository operations
//! - `hasher`: SHA-1 digests over buffers and files
//! - `lockfile`: exclusive-create lockfiles with rename-commit semantics

pub mod errors;
pub mod hasher;
pub mod lockfile;
