//! Ignore policy for snapshot traversal
//!
//! An entry is excluded from a snapshot when any of these apply:
//! 1. Its absolute path is in the explicit ignore set
//! 2. Hidden-entry suppression is on and the entry is hidden
//! 3. It matches a gitignore-style pattern (config patterns or `.labignore`)

use crate::error::{Result, WatchError};
use ::ignore::gitignore::{Gitignore, GitignoreBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Name of the optional pattern file read from the lab root
pub const LABIGNORE_FILE: &str = ".labignore";

/// Decides which paths are left out of a snapshot
///
/// Cheap to clone; the lifecycle copies it out of the state lock once per tick.
#[derive(Debug, Clone, Default)]
pub struct IgnorePolicy {
    /// Absolute paths excluded together with their subtrees
    ignored: HashSet<PathBuf>,

    /// Skip dot-files (Unix) or entries with the hidden attribute (Windows)
    ignore_hidden: bool,

    /// Compiled gitignore-style patterns (optional)
    patterns: Option<Gitignore>,
}

impl IgnorePolicy {
    /// Policy that ignores nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a policy from configuration
    ///
    /// `lab_root` anchors the patterns and locates `.labignore`; without it
    /// only unanchored patterns are meaningful.
    pub fn from_config(lab_root: Option<&Path>, config: &IgnoreConfig) -> Result<Self> {
        let base = lab_root.unwrap_or_else(|| Path::new(""));
        let mut builder = GitignoreBuilder::new(base);
        let mut has_patterns = false;

        for pattern in &config.patterns {
            builder.add_line(None, pattern)?;
            has_patterns = true;
        }

        if config.use_labignore {
            if let Some(root) = lab_root {
                let labignore = root.join(LABIGNORE_FILE);
                if labignore.is_file() {
                    if let Some(err) = builder.add(&labignore) {
                        return Err(WatchError::Pattern(err));
                    }
                    has_patterns = true;
                }
            }
        }

        let patterns = if has_patterns {
            Some(builder.build()?)
        } else {
            None
        };

        Ok(Self {
            ignored: config.ignored_paths.iter().cloned().collect(),
            ignore_hidden: config.ignore_hidden,
            patterns,
        })
    }

    /// Add an absolute path to the explicit ignore set
    pub fn ignore_path(&mut self, path: impl Into<PathBuf>) {
        self.ignored.insert(path.into());
    }

    /// Remove a path from the explicit ignore set
    pub fn unignore_path(&mut self, path: &Path) -> bool {
        self.ignored.remove(path)
    }

    pub fn set_ignore_hidden(&mut self, ignore_hidden: bool) {
        self.ignore_hidden = ignore_hidden;
    }

    pub fn ignores_hidden(&self) -> bool {
        self.ignore_hidden
    }

    /// Explicitly ignored paths
    pub fn ignored_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.ignored.iter()
    }

    /// Check if path should be ignored
    ///
    /// Only consults the filesystem when patterns need to know whether the
    /// path is a directory.
    pub fn should_ignore(&self, path: &Path) -> bool {
        let is_dir = self.patterns.is_some() && path.is_dir();
        self.should_ignore_entry(path, is_dir)
    }

    /// Check an entry whose directory flag is already known (traversal path)
    pub fn should_ignore_entry(&self, path: &Path, is_dir: bool) -> bool {
        if self.ignored.contains(path) {
            return true;
        }

        if self.ignore_hidden && is_hidden(path) {
            return true;
        }

        if let Some(ref patterns) = self.patterns {
            let anchored = !patterns.path().as_os_str().is_empty()
                && path.starts_with(patterns.path());
            let matched = if anchored {
                patterns.matched_path_or_any_parents(path, is_dir)
            } else {
                patterns.matched(path, is_dir)
            };
            if matched.is_ignore() {
                return true;
            }
        }

        false
    }
}

/// Platform hidden-entry detection: leading dot in the file name
#[cfg(not(windows))]
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.') && n != "." && n != "..")
        .unwrap_or(false)
}

/// Platform hidden-entry detection: FILE_ATTRIBUTE_HIDDEN
#[cfg(windows)]
pub fn is_hidden(path: &Path) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;

    std::fs::symlink_metadata(path)
        .map(|m| m.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0)
        .unwrap_or(false)
}

/// Ignore configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreConfig {
    /// Skip hidden entries (default: true)
    #[serde(default = "default_true")]
    pub ignore_hidden: bool,

    /// Absolute paths to exclude along with their subtrees
    #[serde(default)]
    pub ignored_paths: Vec<PathBuf>,

    /// Additional gitignore-style patterns
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Read `.labignore` from the lab root (default: true)
    #[serde(default = "default_true")]
    pub use_labignore: bool,
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            ignore_hidden: true,
            ignored_paths: vec![],
            patterns: vec![],
            use_labignore: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_policy_ignores_nothing() {
        let policy = IgnorePolicy::new();
        assert!(!policy.should_ignore(Path::new("/lab/.hidden")));
        assert!(!policy.should_ignore(Path::new("/lab/graph.json")));
    }

    #[test]
    fn test_explicit_ignore_set() {
        let mut policy = IgnorePolicy::new();
        policy.ignore_path("/lab/archive");

        assert!(policy.should_ignore_entry(Path::new("/lab/archive"), true));
        assert!(!policy.should_ignore_entry(Path::new("/lab/archive2"), true));

        assert!(policy.unignore_path(Path::new("/lab/archive")));
        assert!(!policy.should_ignore_entry(Path::new("/lab/archive"), true));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_hidden_suppression() {
        let mut policy = IgnorePolicy::new();
        policy.set_ignore_hidden(true);

        assert!(policy.should_ignore_entry(Path::new("/lab/.labmonster"), true));
        assert!(policy.should_ignore_entry(Path::new("/lab/dir/.DS_Store"), false));
        assert!(!policy.should_ignore_entry(Path::new("/lab/dir/graph.json"), false));

        policy.set_ignore_hidden(false);
        assert!(!policy.should_ignore_entry(Path::new("/lab/.labmonster"), true));
    }

    #[test]
    fn test_config_patterns() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let config = IgnoreConfig {
            ignore_hidden: false,
            ignored_paths: vec![],
            patterns: vec!["*.tmp".to_string(), "build/".to_string()],
            use_labignore: false,
        };

        let policy = IgnorePolicy::from_config(Some(temp_dir.path()), &config)?;
        let root = temp_dir.path();

        assert!(policy.should_ignore_entry(&root.join("scratch.tmp"), false));
        assert!(policy.should_ignore_entry(&root.join("build"), true));
        assert!(policy.should_ignore_entry(&root.join("build/out.json"), false));
        // "build/" only matches directories
        assert!(!policy.should_ignore_entry(&root.join("build"), false));
        assert!(!policy.should_ignore_entry(&root.join("graph.json"), false));

        Ok(())
    }

    #[test]
    fn test_labignore_file() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(LABIGNORE_FILE), "*.log\nrenders/\n").unwrap();
        fs::create_dir(temp_dir.path().join("renders")).unwrap();

        let config = IgnoreConfig {
            ignore_hidden: false,
            ..IgnoreConfig::default()
        };
        let policy = IgnorePolicy::from_config(Some(temp_dir.path()), &config)?;

        assert!(policy.should_ignore(&temp_dir.path().join("debug.log")));
        assert!(policy.should_ignore(&temp_dir.path().join("renders")));
        assert!(!policy.should_ignore(&temp_dir.path().join("graph.json")));

        Ok(())
    }

    #[test]
    fn test_labignore_disabled() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(LABIGNORE_FILE), "*.log\n").unwrap();

        let config = IgnoreConfig {
            use_labignore: false,
            ..IgnoreConfig::default()
        };
        let policy = IgnorePolicy::from_config(Some(temp_dir.path()), &config)?;

        assert!(!policy.should_ignore(&temp_dir.path().join("debug.log")));
        Ok(())
    }

    #[test]
    fn test_unanchored_patterns_without_root() -> Result<()> {
        let config = IgnoreConfig {
            ignore_hidden: false,
            patterns: vec!["*.bak".to_string()],
            ..IgnoreConfig::default()
        };
        let policy = IgnorePolicy::from_config(None, &config)?;

        assert!(policy.should_ignore_entry(Path::new("/anywhere/notes.bak"), false));
        assert!(!policy.should_ignore_entry(Path::new("/anywhere/notes.json"), false));
        Ok(())
    }

    #[test]
    fn test_config_defaults_from_empty_table() {
        let config: IgnoreConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, IgnoreConfig::default());
        assert!(config.ignore_hidden);
        assert!(config.use_labignore);
    }
}
