//! Coverage report reader backed by the filesystem

use async_trait::async_trait;
use atg_core::ReportReader;
use std::io::ErrorKind;
use std::path::Path;

/// Reads reports with `tokio::fs`; a missing file is `None`
#[derive(Debug, Clone, Copy, Default)]
pub struct FsReportReader;

#[async_trait]
impl ReportReader for FsReportReader {
    async fn read_report(&self, path: &Path) -> std::io::Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_report_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let read = FsReportReader
            .read_report(&dir.path().join("coverage-summary.json"))
            .await
            .unwrap();
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn present_report_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coverage-summary.json");
        std::fs::write(&path, "{}").unwrap();
        let read = FsReportReader.read_report(&path).await.unwrap();
        assert_eq!(read.as_deref(), Some(&b"{}"[..]));
    }
}
