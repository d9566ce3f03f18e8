//! Coverage Aggregator
//!
//! Turns an Istanbul-style coverage report into a per-file statement
//! percentage and picks the files worth regenerating. Two report shapes are
//! understood:
//! - **summary** (`coverage-summary.json`): `{ "<file>": { "statements": { "pct": 50 } } }`
//! - **final** (`coverage-final.json`): `{ "<key>": { "path": "<file>", "s": { "0": 3, "1": 0 } } }`

use crate::collaborators::ReportReader;
use crate::error::{CoverageError, ReportShape};
use crate::path::{normalize_separators, SourceFile};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Summary report file name
pub const SUMMARY_REPORT: &str = "coverage-summary.json";

/// Final (raw hit-count) report file name
pub const FINAL_REPORT: &str = "coverage-final.json";

/// Aggregate key the summary report carries besides files
const SUMMARY_TOTAL_KEY: &str = "total";

/// Statement coverage percentage per file path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageRecord {
    files: BTreeMap<String, f64>,
}

impl CoverageRecord {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a percentage, clamped to [0, 100]
    pub fn insert(&mut self, path: impl AsRef<str>, pct: f64) {
        self.files
            .insert(normalize_separators(path.as_ref()), pct.clamp(0.0, 100.0));
    }

    #[inline]
    #[must_use]
    pub fn get(&self, path: &str) -> Option<f64> {
        self.files.get(path).copied()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.files.iter().map(|(path, pct)| (path.as_str(), *pct))
    }

    /// Rewrite keys under `root` to be root-relative
    ///
    /// Reports key files by absolute path while sources are root-relative.
    /// Keys outside `root` are kept unchanged.
    #[must_use]
    pub fn rebase(self, root: &str) -> Self {
        let root = normalize_separators(root);
        let prefix = format!("{}/", root.trim_end_matches('/'));
        let files = self
            .files
            .into_iter()
            .map(|(path, pct)| match path.strip_prefix(&prefix) {
                Some(relative) => (relative.to_string(), pct),
                None => (path, pct),
            })
            .collect();
        Self { files }
    }
}

#[derive(Debug, Deserialize)]
struct SummaryEntry {
    statements: Option<SummaryMetric>,
}

#[derive(Debug, Deserialize)]
struct SummaryMetric {
    /// Number, or the string "Unknown" when the file has no statements
    pct: Value,
}

#[derive(Debug, Deserialize)]
struct FinalEntry {
    path: String,
    #[serde(default)]
    s: HashMap<String, u64>,
}

/// Parse report bytes of a known shape
///
/// # Errors
/// `CoverageError::Malformed` if the bytes are not a report of that shape.
pub fn parse_coverage(report: &[u8], shape: ReportShape) -> Result<CoverageRecord, CoverageError> {
    let malformed = |source| CoverageError::Malformed { shape, source };
    let mut record = CoverageRecord::new();

    match shape {
        ReportShape::Summary => {
            let entries: HashMap<String, SummaryEntry> =
                serde_json::from_slice(report).map_err(malformed)?;
            for (path, entry) in entries {
                if path == SUMMARY_TOTAL_KEY {
                    continue;
                }
                if let Some(metric) = entry.statements {
                    record.insert(path, metric.pct.as_f64().unwrap_or(100.0));
                }
            }
        }
        ReportShape::Final => {
            let entries: HashMap<String, FinalEntry> =
                serde_json::from_slice(report).map_err(malformed)?;
            for entry in entries.into_values() {
                record.insert(&entry.path, statement_pct(&entry.s));
            }
        }
    }

    Ok(record)
}

/// `covered * 100 / total`, or 100 for a file without statements
#[must_use]
pub fn statement_pct(hits: &HashMap<String, u64>) -> f64 {
    if hits.is_empty() {
        return 100.0;
    }
    let covered = hits.values().filter(|&&count| count > 0).count();
    #[allow(clippy::cast_precision_loss)]
    let pct = covered as f64 * 100.0 / hits.len() as f64;
    pct
}

/// Read the first usable report in `dir`, preferring the summary
///
/// A report that exists but does not parse is skipped in favour of the next
/// shape.
///
/// # Errors
/// `CoverageError::NoCoverageReport` if neither file exists,
/// `CoverageError::Malformed` (for the first bad report) if none parses, and
/// `CoverageError::Io` if a report cannot be read.
pub async fn load_coverage(
    reader: &dyn ReportReader,
    dir: &Path,
) -> Result<CoverageRecord, CoverageError> {
    let mut first_malformed = None;
    for (file, shape) in [
        (SUMMARY_REPORT, ReportShape::Summary),
        (FINAL_REPORT, ReportShape::Final),
    ] {
        let path = dir.join(file);
        let bytes = reader
            .read_report(&path)
            .await
            .map_err(|source| CoverageError::Io {
                path: path.clone(),
                source,
            })?;
        let Some(bytes) = bytes else {
            continue;
        };

        tracing::debug!(report = %path.display(), %shape, "parsing coverage report");
        match parse_coverage(&bytes, shape) {
            Ok(record) => return Ok(record),
            Err(e) => {
                tracing::warn!(report = %path.display(), error = %e, "unusable coverage report");
                first_malformed.get_or_insert(e);
            }
        }
    }
    Err(first_malformed.unwrap_or(CoverageError::NoCoverageReport))
}

/// Sources measured below `threshold`, in source order
///
/// Sources absent from the record were not instrumented and are skipped, not
/// treated as 0%.
#[must_use]
pub fn select_undercovered(
    record: &CoverageRecord,
    sources: &[SourceFile],
    threshold: f64,
) -> Vec<(SourceFile, f64)> {
    sources
        .iter()
        .filter_map(|source| {
            record
                .get(source.as_str())
                .filter(|&pct| pct < threshold)
                .map(|pct| (source.clone(), pct))
        })
        .collect()
}
