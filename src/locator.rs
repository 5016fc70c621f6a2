//! File search by name
//!
//! A case-insensitive substring match on file names under the configured
//! roots. Results come back in directory traversal order, which differs
//! between platforms and filesystems; callers must not rely on it.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{Error, Result};

/// Finds files whose names contain a query
#[derive(Debug, Clone)]
pub struct FileLocator {
    roots: Vec<PathBuf>,
    max_results: usize,
    max_depth: Option<usize>,
}

impl FileLocator {
    /// Create a locator over `roots`, searched in order
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `max_results` is zero
    pub fn new(roots: Vec<PathBuf>, max_results: usize, max_depth: Option<usize>) -> Result<Self> {
        if max_results == 0 {
            return Err(Error::Config(
                "max search results must be at least 1".to_string(),
            ));
        }

        let roots = roots
            .into_iter()
            .map(|root| std::path::absolute(&root).unwrap_or(root))
            .collect();

        Ok(Self {
            roots,
            max_results,
            max_depth,
        })
    }

    /// Configured result cap
    #[must_use]
    pub const fn max_results(&self) -> usize {
        self.max_results
    }

    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Find up to `limit` files (never more than the configured cap)
    ///
    /// Unreadable directories are skipped. An empty query matches nothing.
    #[must_use]
    pub fn search(&self, query: &str, limit: usize) -> Vec<PathBuf> {
        let needle = query.trim().to_lowercase();
        let limit = limit.min(self.max_results);
        if needle.is_empty() || limit == 0 {
            return Vec::new();
        }

        let mut results = Vec::new();
        for root in &self.roots {
            if self.walk(root, &needle, limit, &mut results) {
                break;
            }
        }

        tracing::debug!(query = %needle, found = results.len(), "file search complete");
        results
    }

    /// Run [`search`](Self::search) on the blocking pool
    pub async fn search_async(&self, query: &str, limit: usize) -> Vec<PathBuf> {
        let locator = self.clone();
        let query = query.to_string();
        tokio::task::spawn_blocking(move || locator.search(&query, limit))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "file search task failed");
                Vec::new()
            })
    }

    /// Walk one root; returns `true` once `limit` is reached
    fn walk(&self, root: &Path, needle: &str, limit: usize, results: &mut Vec<PathBuf>) -> bool {
        let mut walker = WalkDir::new(root);
        if let Some(depth) = self.max_depth {
            walker = walker.max_depth(depth);
        }

        for entry in walker.into_iter().filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::trace!(error = %err, "skipping unreadable entry");
                None
            }
        }) {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_lowercase();
            if name.contains(needle) {
                results.push(entry.into_path());
                if results.len() >= limit {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_zero_max_results_is_config_error() {
        let err = FileLocator::new(vec![PathBuf::from(".")], 0, None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_empty_query_matches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        let locator = FileLocator::new(vec![dir.path().to_path_buf()], 5, None).unwrap();
        assert!(locator.search("   ", 5).is_empty());
    }

    #[test]
    fn test_max_depth_limits_walk() {
        let dir = tempfile::tempdir().unwrap();
        let deep = dir.path().join("a").join("b");
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join("report.txt"), "x").unwrap();

        let shallow = FileLocator::new(vec![dir.path().to_path_buf()], 5, Some(1)).unwrap();
        assert!(shallow.search("report", 5).is_empty());

        let unbounded = FileLocator::new(vec![dir.path().to_path_buf()], 5, None).unwrap();
        assert_eq!(unbounded.search("report", 5).len(), 1);
    }
}
