//! Console progress lines

use atg_core::{ProgressSink, RunSummary, SourceFile};

/// Prints one line per user-visible event
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn session_started(&self, source: &SourceFile) {
        println!("🧪 Generating test for: {source}");
    }

    fn session_succeeded(&self, source: &SourceFile) {
        println!("✅ Test written: {source}");
    }

    fn session_exhausted(&self, source: &SourceFile) {
        println!("❌ Fail to write test for: {source}");
    }

    fn no_coverage_report(&self) {
        println!("⚠️  No coverage report found");
    }

    fn undercovered(&self, source: &SourceFile, pct: f64, threshold: f64) {
        println!("{}", undercovered_line(source, pct, threshold));
    }

    fn finished(&self) {
        println!("🎉 Done.");
    }
}

pub(crate) fn undercovered_line(source: &SourceFile, pct: f64, threshold: f64) -> String {
    format!("📉 {source}: {pct:.1}% statements (threshold {threshold:.0}%)")
}

pub(crate) fn summary_lines(summary: &RunSummary) -> Vec<String> {
    let elapsed = summary.finished_at - summary.started_at;
    let mut lines = vec![format!(
        "Generated {}, repaired {}, regenerated {} in {}s",
        summary.generated.len(),
        summary.repaired.len(),
        summary.regenerated.len(),
        elapsed.num_seconds()
    )];
    let exhausted = summary.exhausted();
    if !exhausted.is_empty() {
        lines.push(format!("{} test(s) may still fail:", exhausted.len()));
        lines.extend(exhausted.iter().map(|r| format!("  {} -> {}", r.source, r.test_file)));
    }
    lines
}
