use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Directories belonging to source-control metadata, always excluded
/// when they sit directly under the scan root.
const SOURCE_CONTROL_DIRS: [&str; 5] = [".git", ".hg", ".svn", ".tf", ".bzr"];

/// Decides which paths the scan looks at.
///
/// A path is scanned iff `includes(path) && !excludes(path)`. Patterns are
/// user-supplied regular expressions matched against the full path; a
/// malformed pattern is a configuration error surfaced when the filter is
/// built, not during the walk.
#[derive(Debug)]
pub struct PathFilter {
    root: PathBuf,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl PathFilter {
    pub fn new(root: &Path, include: &[String], exclude: &[String]) -> Result<Self> {
        let include = include
            .iter()
            .map(|p| Regex::new(p).with_context(|| format!("Invalid include pattern: {}", p)))
            .collect::<Result<Vec<_>>>()?;
        let exclude = exclude
            .iter()
            .map(|p| Regex::new(p).with_context(|| format!("Invalid exclude pattern: {}", p)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            root: root.to_path_buf(),
            include,
            exclude,
        })
    }

    /// True when no include patterns are configured or at least one matches.
    pub fn includes(&self, path: &Path) -> bool {
        if self.include.is_empty() {
            return true;
        }
        let s = path.to_string_lossy();
        self.include.iter().any(|re| re.is_match(&s))
    }

    /// True when the path lies under a source-control directory or any
    /// exclude pattern matches.
    pub fn excludes(&self, path: &Path) -> bool {
        for dir in SOURCE_CONTROL_DIRS {
            if path.starts_with(self.root.join(dir)) {
                return true;
            }
        }
        let s = path.to_string_lossy();
        self.exclude.iter().any(|re| re.is_match(&s))
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.includes(path) && !self.excludes(path)
    }
}
