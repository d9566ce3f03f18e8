//! Path matching between source files and their tests
//!
//! Provides [`SourceFile`] and [`TestFile`] plus the two matching rules:
//! - [`test_path_for`] derives where a source file's test lives
//! - [`has_matching_test`] decides whether an existing test covers a source
//!
//! All paths are handled as forward-slash strings; backslashes are rewritten
//! before any comparison so Windows-style listings match identically.

use crate::error::PathError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

/// Extensions recognized as source modules
pub const SOURCE_EXTENSIONS: [&str; 4] = ["js", "ts", "jsx", "tsx"];

/// Directory names stripped from test paths before matching
const TEST_DIR_SEGMENTS: [&str; 2] = ["test", "__tests__"];

/// Leading directory stripped from source paths before matching
const SOURCE_DIR_SEGMENT: &str = "src";

static BACKSLASHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\+").expect("static regex"));

static SOURCE_EXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.(js|ts)(x?)$").expect("static regex"));

static TEST_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.test\.(js|ts)x?$").expect("static regex"));

/// Relative path to a source module
///
/// Identity is the forward-slash normalized path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceFile(String);

impl SourceFile {
    /// Create from any separator style
    #[inline]
    #[must_use]
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(normalize_separators(path.as_ref()))
    }

    /// Normalized path
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final path segment
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Resolve against a directory on disk
    #[inline]
    #[must_use]
    pub fn to_path(&self, base: &Path) -> PathBuf {
        base.join(&self.0)
    }
}

impl Display for SourceFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SourceFile {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceFile {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// Project-relative path of a generated or existing test module
///
/// Only produced by [`test_path_for`], so it is always a pure function of the
/// test root and the source path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestFile(String);

impl TestFile {
    /// Normalized path
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve against the project root
    #[inline]
    #[must_use]
    pub fn to_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.0)
    }
}

impl Display for TestFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TestFile {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Rewrite every run of backslashes to a single forward slash
#[must_use]
pub fn normalize_separators(path: &str) -> String {
    BACKSLASHES.replace_all(path, "/").into_owned()
}

/// Join two relative paths and resolve `.`/`..` segments
///
/// A leading `/` on `base` is kept. An empty result is `"."`.
#[must_use]
pub fn join_normalized(base: &str, relative: &str) -> String {
    let base = normalize_separators(base);
    let relative = normalize_separators(relative);
    let absolute = base.starts_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for segment in base.split('/').chain(relative.split('/')) {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Derive the test file location for a source file
///
/// `testRoot/relativeSourcePath` with `.js|.ts|.jsx|.tsx` rewritten to
/// `.test.<ext>`.
///
/// # Errors
/// `PathError::InvalidPath` if the source has no recognized extension.
pub fn test_path_for(source_relative: &str, test_root: &str) -> Result<TestFile, PathError> {
    let joined = join_normalized(test_root, source_relative);
    if !SOURCE_EXT.is_match(&joined) {
        return Err(PathError::InvalidPath(source_relative.to_string()));
    }
    Ok(TestFile(
        SOURCE_EXT.replace(&joined, ".test.${1}${2}").into_owned(),
    ))
}

/// Whether any candidate test covers the source file
///
/// The source drops its extension and a leading `src` segment; each candidate
/// drops `test`/`__tests__` segments and its `.test.<ext>` suffix. A candidate
/// matches when the source string ends with the candidate string, so a test
/// tree may mirror only the tail of the source tree. Candidates without the
/// exact `.test.<ext>` suffix (e.g. `.spec.js`) keep their extension and so
/// never match.
///
/// The comparison is a plain string suffix: `src/foobar.js` is matched by
/// `bar.test.js`. Callers relying on exact coverage should not use this.
#[must_use]
pub fn has_matching_test<S: AsRef<str>>(source: &str, candidates: &[S]) -> bool {
    let source_key = source_match_key(source);
    candidates
        .iter()
        .any(|candidate| source_key.ends_with(&test_match_key(candidate.as_ref())))
}

fn source_match_key(source: &str) -> String {
    let normalized = normalize_separators(source);
    let stem = SOURCE_EXT.replace(&normalized, "");
    let mut segments: Vec<&str> = stem.split('/').collect();
    if segments.first() == Some(&SOURCE_DIR_SEGMENT) {
        segments.remove(0);
    }
    segments.join("/")
}

fn test_match_key(test: &str) -> String {
    let normalized = normalize_separators(test);
    let stem = TEST_SUFFIX.replace(&normalized, "");
    stem.split('/')
        .filter(|segment| !TEST_DIR_SEGMENTS.contains(segment))
        .collect::<Vec<_>>()
        .join("/")
}
