//! Candidate folder filtering
//!
//! Build output and hidden directories never count as module candidates.

use std::collections::HashSet;

/// Excludes infrastructure and hidden directories from scanning
#[derive(Debug, Clone)]
pub struct FolderFilter {
    excluded: HashSet<String>,
}

impl FolderFilter {
    pub fn new<I, S>(excluded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded: excluded.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether a directory name should be skipped
    #[inline]
    pub fn is_excluded(&self, name: &str) -> bool {
        name.is_empty() || name.starts_with('.') || self.excluded.contains(name)
    }

    /// Whether a directory name is a candidate
    #[inline]
    pub fn accepts(&self, name: &str) -> bool {
        !self.is_excluded(name)
    }
}

impl Default for FolderFilter {
    fn default() -> Self {
        Self::new(["target", "build", "out"])
    }
}
