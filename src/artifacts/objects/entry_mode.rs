//! Tree entry modes
//!
//! A subset of POSIX-style mode bits encoded as octal text in tree entries:
//! regular files, executables, directories, symlinks, and gitlinks
//! (submodule commit pointers). The ordering of the variants has no
//! significance; entries are ordered by name, not mode.

use crate::artifacts::core::errors::GitError;
use std::fs::Metadata;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum EntryMode {
    #[default]
    Regular,
    Executable,
    Directory,
    Symlink,
    Gitlink,
}

impl EntryMode {
    pub fn as_octal_str(&self) -> &'static str {
        match self {
            EntryMode::Regular => "100644",
            EntryMode::Executable => "100755",
            EntryMode::Directory => "40000",
            EntryMode::Symlink => "120000",
            EntryMode::Gitlink => "160000",
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            EntryMode::Regular => 0o100644,
            EntryMode::Executable => 0o100755,
            EntryMode::Directory => 0o40000,
            EntryMode::Symlink => 0o120000,
            EntryMode::Gitlink => 0o160000,
        }
    }

    pub fn from_octal_str(value: &str) -> anyhow::Result<Self> {
        match value {
            "100644" => Ok(EntryMode::Regular),
            "100755" => Ok(EntryMode::Executable),
            // git writes "40000" but tolerates the zero-padded form
            "40000" | "040000" => Ok(EntryMode::Directory),
            "120000" => Ok(EntryMode::Symlink),
            "160000" => Ok(EntryMode::Gitlink),
            _ => Err(GitError::MalformedObject(format!("invalid entry mode: {value}")).into()),
        }
    }

    pub fn try_from_u32(mode: u32) -> anyhow::Result<Self> {
        match mode {
            0o100644 => Ok(EntryMode::Regular),
            0o100755 => Ok(EntryMode::Executable),
            0o40000 => Ok(EntryMode::Directory),
            0o120000 => Ok(EntryMode::Symlink),
            0o160000 => Ok(EntryMode::Gitlink),
            _ => Err(GitError::MalformedObject(format!("invalid entry mode: {mode:o}")).into()),
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, EntryMode::Directory)
    }

    pub fn is_file(&self) -> bool {
        matches!(self, EntryMode::Regular | EntryMode::Executable)
    }

    /// Classify a working-tree path from its metadata
    pub fn from_workspace(path: &Path, metadata: &Metadata) -> Self {
        use is_executable::IsExecutable;

        if metadata.is_dir() {
            EntryMode::Directory
        } else if metadata.is_symlink() {
            EntryMode::Symlink
        } else if path.is_executable() {
            EntryMode::Executable
        } else {
            EntryMode::Regular
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(EntryMode::Regular, "100644", 0o100644)]
    #[case(EntryMode::Executable, "100755", 0o100755)]
    #[case(EntryMode::Directory, "40000", 0o40000)]
    #[case(EntryMode::Symlink, "120000", 0o120000)]
    #[case(EntryMode::Gitlink, "160000", 0o160000)]
    fn test_octal_round_trip(#[case] mode: EntryMode, #[case] octal: &str, #[case] bits: u32) {
        assert_eq!(mode.as_octal_str(), octal);
        assert_eq!(mode.as_u32(), bits);
        assert_eq!(EntryMode::from_octal_str(octal).unwrap(), mode);
        assert_eq!(EntryMode::try_from_u32(bits).unwrap(), mode);
    }

    #[test]
    fn test_rejects_unknown_modes() {
        assert!(EntryMode::from_octal_str("100600").is_err());
        assert!(EntryMode::try_from_u32(0o777).is_err());
    }
}
