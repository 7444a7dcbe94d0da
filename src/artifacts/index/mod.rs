//! Staging index data structures
//!
//! The binary index format: a `DIRC` header, sorted entries, and a trailing
//! SHA-1 checksum over everything preceding it.

pub mod checksum;
pub mod index_entry;
pub mod index_header;

/// Magic marker opening every index file
pub const SIGNATURE: &str = "DIRC";

/// Supported index format version
pub const VERSION: u32 = 2;

/// Size of the serialized header in bytes
pub const HEADER_SIZE: usize = 12;
