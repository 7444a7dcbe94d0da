//! Repository configuration
//!
//! INI-style file at `<gitdir>/config`:
//!
//! ```text
//! [core]
//!     bare = false
//! [remote "origin"]
//!     url = /path/to/remote
//! ```
//!
//! Section names and keys are case-insensitive; subsection names are
//! case-sensitive. Comments start with `#` or `;`. Booleans accept
//! true/false, yes/no, on/off, and 1/0.

use crate::artifacts::core::lockfile::Lockfile;
use anyhow::Context;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct Config {
    path: PathBuf,
    /// section key (normalized) -> key (normalized) -> value
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl Config {
    /// Load the config file; a missing file is an empty config
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = Config {
            path: path.to_path_buf(),
            sections: BTreeMap::new(),
        };

        if !path.exists() {
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("unable to read config at {}", path.display()))?;
        let mut current_section: Option<String> = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let section = parse_section_header(header);
                config.sections.entry(section.clone()).or_default();
                current_section = Some(section);
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue; // tolerate valueless lines
            };
            let Some(section) = current_section.clone() else {
                continue; // key before any section header
            };

            config
                .sections
                .entry(section)
                .or_default()
                .insert(key.trim().to_lowercase(), value.trim().to_string());
        }

        Ok(config)
    }

    pub fn get(&self, section: &str, subsection: Option<&str>, key: &str) -> Option<&str> {
        self.sections
            .get(&section_key(section, subsection))
            .and_then(|entries| entries.get(&key.to_lowercase()))
            .map(String::as_str)
    }

    pub fn get_string(
        &self,
        section: &str,
        subsection: Option<&str>,
        key: &str,
        default: &str,
    ) -> String {
        self.get(section, subsection, key)
            .unwrap_or(default)
            .to_string()
    }

    pub fn get_bool(
        &self,
        section: &str,
        subsection: Option<&str>,
        key: &str,
        default: bool,
    ) -> bool {
        self.get(section, subsection, key)
            .and_then(parse_bool)
            .unwrap_or(default)
    }

    pub fn get_int(
        &self,
        section: &str,
        subsection: Option<&str>,
        key: &str,
        default: i64,
    ) -> i64 {
        self.get(section, subsection, key)
            .and_then(|value| value.parse().ok())
            .unwrap_or(default)
    }

    pub fn set(&mut self, section: &str, subsection: Option<&str>, key: &str, value: &str) {
        self.sections
            .entry(section_key(section, subsection))
            .or_default()
            .insert(key.to_lowercase(), value.to_string());
    }

    pub fn unset(&mut self, section: &str, subsection: Option<&str>, key: &str) {
        let section_key = section_key(section, subsection);
        if let Some(entries) = self.sections.get_mut(&section_key) {
            entries.remove(&key.to_lowercase());
            if entries.is_empty() {
                self.sections.remove(&section_key);
            }
        }
    }

    /// Remove a whole section, e.g. when deleting a remote
    pub fn remove_section(&mut self, section: &str, subsection: Option<&str>) {
        self.sections.remove(&section_key(section, subsection));
    }

    /// Subsection names defined under `section` (e.g. configured remotes)
    pub fn subsections(&self, section: &str) -> Vec<String> {
        let prefix = format!("{}.", section.to_lowercase());
        self.sections
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .map(str::to_string)
            .collect()
    }

    /// Write the config back atomically
    pub fn save(&self) -> anyhow::Result<()> {
        let mut content = String::new();
        for (section, entries) in &self.sections {
            match section.split_once('.') {
                Some((name, subsection)) => {
                    writeln!(content, "[{name} \"{subsection}\"]")?;
                }
                None => writeln!(content, "[{section}]")?,
            }
            for (key, value) in entries {
                writeln!(content, "\t{key} = {value}")?;
            }
        }

        let mut lock = Lockfile::acquire(&self.path)?;
        lock.write_all(content.as_bytes())?;
        lock.commit()
    }
}

fn parse_section_header(header: &str) -> String {
    match header.split_once(' ') {
        Some((name, subsection)) => {
            let subsection = subsection.trim().trim_matches('"');
            section_key(name, Some(subsection))
        }
        None => section_key(header, None),
    }
}

fn section_key(section: &str, subsection: Option<&str>) -> String {
    match subsection {
        // subsections stay case-sensitive
        Some(subsection) => format!("{}.{}", section.to_lowercase(), subsection),
        None => section.to_lowercase(),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn write_config(content: &str) -> (assert_fs::TempDir, Config) {
        let dir = assert_fs::TempDir::new().unwrap();
        let path = dir.path().join("config");
        std::fs::write(&path, content).unwrap();
        let config = Config::load(&path).unwrap();
        (dir, config)
    }

    #[test]
    fn test_sections_and_subsections() {
        let (_dir, config) = write_config(
            "[core]\n\tbare = false\n# a comment\n; another\n\
             [remote \"origin\"]\n\turl = /tmp/upstream\n",
        );

        assert_eq!(config.get("core", None, "bare"), Some("false"));
        assert_eq!(
            config.get("remote", Some("origin"), "url"),
            Some("/tmp/upstream")
        );
        assert_eq!(config.subsections("remote"), vec!["origin".to_string()]);
    }

    #[test]
    fn test_keys_are_case_insensitive_subsections_are_not() {
        let (_dir, config) =
            write_config("[Core]\n\tBare = TRUE\n[branch \"Feat\"]\n\tremote = origin\n");

        assert!(config.get_bool("core", None, "bare", false));
        assert_eq!(config.get("branch", Some("Feat"), "remote"), Some("origin"));
        assert_eq!(config.get("branch", Some("feat"), "remote"), None);
    }

    #[rstest]
    #[case("yes", true)]
    #[case("on", true)]
    #[case("1", true)]
    #[case("no", false)]
    #[case("off", false)]
    #[case("0", false)]
    fn test_boolean_forms(#[case] value: &str, #[case] expected: bool) {
        let (_dir, config) = write_config(&format!("[core]\n\tflag = {value}\n"));
        assert_eq!(config.get_bool("core", None, "flag", !expected), expected);
    }

    #[test]
    fn test_set_save_reload_round_trip() {
        let dir = assert_fs::TempDir::new().unwrap();
        let path = dir.path().join("config");

        let mut config = Config::load(&path).unwrap();
        config.set("user", None, "name", "A");
        config.set("remote", Some("origin"), "url", "/tmp/r");
        config.save().unwrap();

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded.get("user", None, "name"), Some("A"));
        assert_eq!(reloaded.get("remote", Some("origin"), "url"), Some("/tmp/r"));

        let mut reloaded = reloaded;
        reloaded.remove_section("remote", Some("origin"));
        reloaded.save().unwrap();
        assert_eq!(
            Config::load(&path).unwrap().get("remote", Some("origin"), "url"),
            None
        );
    }

    #[test]
    fn test_get_int_with_default() {
        let (_dir, config) = write_config("[pack]\n\tdepth = 50\n");
        assert_eq!(config.get_int("pack", None, "depth", 10), 50);
        assert_eq!(config.get_int("pack", None, "window", 10), 10);
    }
}
