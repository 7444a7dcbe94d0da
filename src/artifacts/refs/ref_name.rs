//! Validated reference names
//!
//! A ref name lives in a slash-delimited namespace (`refs/heads/<branch>`,
//! `refs/tags/<tag>`, `refs/remotes/<remote>/<branch>`), plus the special
//! top-level `HEAD`. Validation rejects the characters and shapes that
//! would break the on-disk layout or the revision syntax.

use crate::artifacts::core::errors::GitError;
use std::path::{Path, PathBuf};

pub const HEADS_PREFIX: &str = "refs/heads/";
pub const TAGS_PREFIX: &str = "refs/tags/";
pub const REMOTES_PREFIX: &str = "refs/remotes/";

const FORBIDDEN_CHARS: [char; 8] = ['\\', ':', '?', '*', '[', '^', '~', ' '];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefName(String);

impl RefName {
    /// The special current-position ref
    pub fn head() -> Self {
        RefName("HEAD".to_string())
    }

    /// Validate a full ref name (or `HEAD`)
    pub fn try_parse(name: &str) -> anyhow::Result<Self> {
        if name == "HEAD" {
            return Ok(RefName::head());
        }
        Self::validate(name)?;
        Ok(RefName(name.to_string()))
    }

    /// A local branch ref: `refs/heads/<branch>`
    pub fn branch(branch: &str) -> anyhow::Result<Self> {
        Self::try_parse(&format!("{HEADS_PREFIX}{branch}"))
    }

    /// A tag ref: `refs/tags/<tag>`
    pub fn tag(tag: &str) -> anyhow::Result<Self> {
        Self::try_parse(&format!("{TAGS_PREFIX}{tag}"))
    }

    /// A remote-tracking ref: `refs/remotes/<remote>/<branch>`
    pub fn remote_branch(remote: &str, branch: &str) -> anyhow::Result<Self> {
        Self::try_parse(&format!("{REMOTES_PREFIX}{remote}/{branch}"))
    }

    pub fn is_head(&self) -> bool {
        self.0 == "HEAD"
    }

    pub fn is_branch(&self) -> bool {
        self.0.starts_with(HEADS_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of the loose ref file, relative to the gitdir
    pub fn as_ref_path(&self) -> PathBuf {
        PathBuf::from(&self.0)
    }

    /// Path of the reflog file, relative to the gitdir
    pub fn as_log_path(&self) -> PathBuf {
        Path::new("logs").join(&self.0)
    }

    /// Drop the `refs/heads/` prefix for display
    pub fn short_name(&self) -> &str {
        self.0
            .strip_prefix(HEADS_PREFIX)
            .or_else(|| self.0.strip_prefix(REMOTES_PREFIX))
            .or_else(|| self.0.strip_prefix(TAGS_PREFIX))
            .unwrap_or(&self.0)
    }

    fn validate(name: &str) -> anyhow::Result<()> {
        let invalid = |detail: &str| -> anyhow::Error {
            GitError::InvalidRefName(format!("{name}: {detail}")).into()
        };

        if name.is_empty() {
            return Err(invalid("empty name"));
        }
        if name.starts_with('/') || name.ends_with('/') {
            return Err(invalid("leading or trailing slash"));
        }
        if name.contains("//") {
            return Err(invalid("consecutive slashes"));
        }
        if name.ends_with(".lock") {
            return Err(invalid("trailing .lock"));
        }
        if name.contains("..") {
            return Err(invalid("consecutive dots"));
        }
        if name.contains("@{") {
            return Err(invalid("contains @{"));
        }
        if name.chars().any(|c| c.is_ascii_control()) {
            return Err(invalid("control character"));
        }
        if let Some(c) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
            return Err(invalid(&format!("forbidden character {c:?}")));
        }
        if name.split('/').any(|component| component.starts_with('.')) {
            return Err(invalid("component starts with a dot"));
        }

        Ok(())
    }
}

impl std::fmt::Display for RefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::proptest;

    proptest! {
        #[test]
        fn test_valid_branch_names(name in "[a-zA-Z0-9_-]+") {
            assert!(RefName::branch(&name).is_ok());
        }

        #[test]
        fn test_valid_hierarchical_names(
            prefix in "[a-zA-Z0-9_-]+",
            suffix in "[a-zA-Z0-9_-]+"
        ) {
            assert!(RefName::branch(&format!("{prefix}/{suffix}")).is_ok());
        }

        #[test]
        fn test_rejects_component_starting_with_dot(suffix in "[a-zA-Z0-9_-]+") {
            assert!(RefName::branch(&format!(".{suffix}")).is_err());
        }

        #[test]
        fn test_rejects_trailing_lock(prefix in "[a-zA-Z0-9_-]+") {
            assert!(RefName::branch(&format!("{prefix}.lock")).is_err());
        }

        #[test]
        fn test_rejects_consecutive_dots(
            prefix in "[a-zA-Z0-9_-]+",
            suffix in "[a-zA-Z0-9_-]+"
        ) {
            assert!(RefName::branch(&format!("{prefix}..{suffix}")).is_err());
        }

        #[test]
        fn test_rejects_trailing_slash(prefix in "[a-zA-Z0-9_-]+") {
            assert!(RefName::branch(&format!("{prefix}/")).is_err());
        }

        #[test]
        fn test_rejects_forbidden_characters(
            prefix in "[a-zA-Z0-9_-]+",
            suffix in "[a-zA-Z0-9_-]+",
            forbidden in r"[\*:\?\[\\^~ ]"
        ) {
            assert!(RefName::branch(&format!("{prefix}{forbidden}{suffix}")).is_err());
        }

        #[test]
        fn test_rejects_control_characters(
            prefix in "[a-zA-Z0-9_-]+",
            suffix in "[a-zA-Z0-9_-]+"
        ) {
            assert!(RefName::branch(&format!("{prefix}\x07{suffix}")).is_err());
        }

        #[test]
        fn test_rejects_at_brace(
            prefix in "[a-zA-Z0-9_-]+",
            suffix in "[a-zA-Z0-9_-]+"
        ) {
            assert!(RefName::branch(&format!("{prefix}@{{{suffix}}}")).is_err());
        }
    }

    #[test]
    fn test_rejects_empty_and_slashed_shapes() {
        assert!(RefName::try_parse("").is_err());
        assert!(RefName::try_parse("/refs/heads/a").is_err());
        assert!(RefName::try_parse("refs//heads/a").is_err());
    }

    #[test]
    fn test_head_is_special_cased() {
        let head = RefName::try_parse("HEAD").unwrap();
        assert!(head.is_head());
        assert_eq!(head.as_log_path(), PathBuf::from("logs/HEAD"));
    }

    #[test]
    fn test_short_name_strips_namespace() {
        assert_eq!(RefName::branch("feat").unwrap().short_name(), "feat");
        assert_eq!(
            RefName::remote_branch("origin", "main").unwrap().short_name(),
            "origin/main"
        );
    }
}
