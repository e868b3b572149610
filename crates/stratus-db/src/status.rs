//! Last-refresh status collaborator.
//!
//! The orchestrator calls `write_timestamp` exactly once per completed
//! ingestion run; the presentation layer reads the file back to show
//! "last updated".

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::StoreError;

#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn write_timestamp(&self, now: DateTime<Utc>) -> Result<(), StoreError>;
}

/// Writes the refresh instant to a plain text file.
pub struct FileStatus {
    path: PathBuf,
}

impl FileStatus {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StatusSink for FileStatus {
    async fn write_timestamp(&self, now: DateTime<Utc>) -> Result<(), StoreError> {
        let stamp = now.format("%d.%m.%Y %H:%M:%S").to_string();
        tokio::fs::write(&self.path, &stamp).await?;
        debug!(path = %self.path.display(), %stamp, "refresh timestamp written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_timestamp_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_updated.txt");
        let sink = FileStatus::new(&path);

        let instant = Utc.with_ymd_and_hms(2026, 3, 7, 14, 30, 5).unwrap();
        sink.write_timestamp(instant).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "07.03.2026 14:30:05");
    }
}
