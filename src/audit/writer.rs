use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::AuditRecord;
use crate::errors::ApexError;

/// Appends audit records to `<dir>/audit-<date>.jsonl`.
pub struct AuditWriter {
    path: PathBuf,
    file: tokio::fs::File,
}

impl AuditWriter {
    pub async fn open(dir: &Path) -> Result<Self, ApexError> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("audit-{}.jsonl", Utc::now().format("%Y%m%d")));
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write(&mut self, record: &AuditRecord) -> Result<(), ApexError> {
        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": record.kind(),
            "data": record,
        });
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        self.file.write_all(line.as_bytes()).await?;
        self.file.flush().await?;
        Ok(())
    }

    /// Drain `rx` until every sender is dropped.
    pub fn spawn(mut self, mut rx: mpsc::UnboundedReceiver<AuditRecord>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(path = %self.path.display(), "Audit trail writer started");
            while let Some(record) = rx.recv().await {
                if let Err(e) = self.write(&record).await {
                    warn!(error = %e, kind = record.kind(), "Failed to write audit record");
                }
            }
        })
    }
}
