//! Filesystem glob listing
//!
//! Walks a directory tree and matches root-relative, forward-slash paths
//! against include/exclude globs. Results come back sorted by path.

use async_trait::async_trait;
use atg_core::{FileLister, ListError};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Directories never descended into
pub const PRUNED_DIRS: &[&str] = &["node_modules", ".git"];

/// Lists files with `walkdir` + `globset`
#[derive(Debug, Clone)]
pub struct GlobLister {
    pruned: Vec<String>,
}

impl Default for GlobLister {
    fn default() -> Self {
        Self {
            pruned: PRUNED_DIRS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl GlobLister {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous listing used by the async wrapper
    ///
    /// # Errors
    /// `ListError::InvalidGlob` for a bad pattern, `ListError::Io` if the
    /// walk fails.
    pub fn list_blocking(
        &self,
        root: &Path,
        include: &[String],
        exclude: &[String],
    ) -> Result<Vec<String>, ListError> {
        let include = build_globset(include)?;
        let exclude = build_globset(exclude)?;

        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.is_pruned(entry));

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
                ListError::io_error(path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(relative) = relative_path(root, entry.path()) else {
                continue;
            };
            if include.is_match(&relative) && !exclude.is_match(&relative) {
                files.push(relative);
            }
        }

        files.sort();
        Ok(files)
    }

    fn is_pruned(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && self
                .pruned
                .iter()
                .any(|name| entry.file_name().to_string_lossy() == name.as_str())
    }
}

#[async_trait]
impl FileLister for GlobLister {
    async fn list(
        &self,
        root: &Path,
        include: &[&str],
        exclude: &[&str],
    ) -> Result<Vec<String>, ListError> {
        let lister = self.clone();
        let root_buf: PathBuf = root.to_path_buf();
        let include: Vec<String> = include.iter().map(ToString::to_string).collect();
        let exclude: Vec<String> = exclude.iter().map(ToString::to_string).collect();

        tokio::task::spawn_blocking(move || lister.list_blocking(&root_buf, &include, &exclude))
            .await
            .map_err(|e| ListError::io_error(root, std::io::Error::other(e.to_string())))?
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, ListError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| ListError::InvalidGlob {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| ListError::InvalidGlob {
        pattern: patterns.join(","),
        message: e.to_string(),
    })
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    Some(relative.to_string_lossy().replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use atg_core::scanner::{SOURCE_EXCLUDES, SOURCE_GLOBS, TEST_EXCLUDES, TEST_GLOBS};
    use pretty_assertions::assert_eq;

    fn touch(root: &Path, files: &[&str]) {
        for file in files {
            let path = root.join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "").unwrap();
        }
    }

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        touch(
            dir.path(),
            &[
                "index.js",
                "lib/util.ts",
                "lib/view.tsx",
                "lib/util.test.ts",
                "lib/__tests__/view.test.tsx",
                "lib/item.spec.js",
                "node_modules/pkg/index.js",
                "coverage/lcov-report/prettify.js",
                "dist/bundle.js",
                "README.md",
            ],
        );
        dir
    }

    #[tokio::test]
    async fn lists_sources_with_standard_exclusions() {
        let dir = tree();
        let files = GlobLister::new()
            .list(dir.path(), SOURCE_GLOBS, SOURCE_EXCLUDES)
            .await
            .unwrap();
        assert_eq!(files, vec!["index.js", "lib/item.spec.js", "lib/util.ts", "lib/view.tsx"]);
    }

    #[tokio::test]
    async fn lists_tests_and_specs() {
        let dir = tree();
        let files = GlobLister::new()
            .list(dir.path(), TEST_GLOBS, TEST_EXCLUDES)
            .await
            .unwrap();
        assert_eq!(
            files,
            vec!["lib/__tests__/view.test.tsx", "lib/item.spec.js", "lib/util.test.ts"]
        );
    }

    #[tokio::test]
    async fn missing_root_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = GlobLister::new()
            .list(&dir.path().join("absent"), SOURCE_GLOBS, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ListError::Io { .. }));
    }

    #[test]
    fn bad_glob_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = GlobLister::new()
            .list_blocking(dir.path(), &["src/[".to_string()], &[])
            .unwrap_err();
        assert!(matches!(err, ListError::InvalidGlob { .. }));
    }
}
