//! Source/Test Scanner
//!
//! Enumerates source files under a root and partitions them into tested and
//! untested using [`has_matching_test`]. Order is whatever the listing
//! collaborator returns; the scanner never re-sorts.

use crate::collaborators::FileLister;
use crate::error::ScanError;
use crate::path::{has_matching_test, SourceFile};
use std::path::Path;
use std::sync::Arc;

/// Source module globs
pub const SOURCE_GLOBS: &[&str] = &["**/*.{js,ts,jsx,tsx}"];

/// Paths never treated as sources
pub const SOURCE_EXCLUDES: &[&str] = &[
    "**/*.test.*",
    "**/__tests__/**",
    "**/node_modules/**",
    "coverage/**",
    "dist/**",
    "build/**",
];

/// Existing test globs (`.spec` files are listed but never match a source)
pub const TEST_GLOBS: &[&str] = &["**/*.test.{js,ts,jsx,tsx}", "**/*.spec.{js,ts,jsx,tsx}"];

/// Paths never treated as tests
pub const TEST_EXCLUDES: &[&str] = &["**/node_modules/**"];

/// Scanner over one listing backend
#[derive(Clone)]
pub struct Scanner {
    lister: Arc<dyn FileLister>,
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner").finish_non_exhaustive()
    }
}

impl Scanner {
    #[inline]
    #[must_use]
    pub fn new(lister: Arc<dyn FileLister>) -> Self {
        Self { lister }
    }

    /// Every source module under `root`
    ///
    /// # Errors
    /// `ScanError::Listing` if the lister fails; never swallowed.
    pub async fn all_source_files(&self, root: &Path) -> Result<Vec<SourceFile>, ScanError> {
        let files = self.list(root, SOURCE_GLOBS, SOURCE_EXCLUDES).await?;
        Ok(files.into_iter().map(SourceFile::new).collect())
    }

    /// Every existing `.test`/`.spec` file under `root`
    ///
    /// # Errors
    /// `ScanError::Listing` if the lister fails.
    pub async fn all_test_files(&self, root: &Path) -> Result<Vec<String>, ScanError> {
        self.list(root, TEST_GLOBS, TEST_EXCLUDES).await
    }

    /// Sources no existing test covers
    ///
    /// # Errors
    /// `ScanError::Listing` if either listing fails.
    pub async fn untested_files(&self, root: &Path) -> Result<Vec<SourceFile>, ScanError> {
        let sources = self.all_source_files(root).await?;
        let tests = self.all_test_files(root).await?;
        let untested: Vec<SourceFile> = sources
            .into_iter()
            .filter(|source| !has_matching_test(source.as_str(), &tests))
            .collect();

        tracing::info!(
            root = %root.display(),
            tests = tests.len(),
            untested = untested.len(),
            "scan complete"
        );
        Ok(untested)
    }

    async fn list(
        &self,
        root: &Path,
        include: &[&str],
        exclude: &[&str],
    ) -> Result<Vec<String>, ScanError> {
        self.lister
            .list(root, include, exclude)
            .await
            .map_err(|source| ScanError::Listing {
                root: root.to_path_buf(),
                source,
            })
    }
}
