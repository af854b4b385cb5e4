//! Append-only rollback archive.
//!
//! One JSON object per line in `<archive_dir>/rollbacks.jsonl`. A record
//! is flushed and fsynced before [`RollbackArchiver::archive`] returns,
//! so a record exists on disk for every change that went live. Records
//! are never rewritten or deleted.

use std::path::{Path, PathBuf};

use charter_types::Proposal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use crate::error::{ArchiveError, ArchiveResult};

pub const ARCHIVE_FILE: &str = "rollbacks.jsonl";

/// What is needed to undo one applied proposal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RollbackRecord {
    pub proposal_name: String,
    pub target_path: String,
    pub justification: String,
    #[serde(default)]
    pub rollback_plan: Option<serde_json::Value>,
    pub archived_at: DateTime<Utc>,
    /// Token of the live file before the change; `None` if it did not exist.
    #[serde(default)]
    pub previous_content_hash: Option<String>,
    /// Token of the content that was approved.
    pub approval_token: String,
}

#[derive(Clone, Debug)]
pub struct RollbackArchiver {
    path: PathBuf,
}

impl RollbackArchiver {
    pub fn new(archive_dir: impl AsRef<Path>) -> Self {
        Self {
            path: archive_dir.as_ref().join(ARCHIVE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durably append a rollback record for `proposal`.
    pub async fn archive(
        &self,
        proposal: &Proposal,
        previous_content_hash: Option<String>,
    ) -> ArchiveResult<RollbackRecord> {
        let record = RollbackRecord {
            proposal_name: proposal.name.clone(),
            target_path: proposal.target_path.clone().unwrap_or_default(),
            justification: proposal.justification.clone(),
            rollback_plan: proposal.rollback_plan.clone(),
            archived_at: Utc::now(),
            previous_content_hash,
            approval_token: proposal.approval_token().as_str().to_string(),
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io(e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io(e))?;
        file.write_all(line.as_bytes()).await.map_err(|e| self.io(e))?;
        file.flush().await.map_err(|e| self.io(e))?;
        file.sync_all().await.map_err(|e| self.io(e))?;

        info!(
            proposal = %record.proposal_name,
            target = %record.target_path,
            archive = %self.path.display(),
            "rollback record archived"
        );
        Ok(record)
    }

    /// Every record, oldest first.
    pub async fn records(&self) -> ArchiveResult<Vec<RollbackRecord>> {
        let file = match File::open(&self.path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io(e)),
        };
        let mut lines = BufReader::new(file).lines();
        let mut records = Vec::new();
        let mut number = 0;
        while let Some(line) = lines.next_line().await.map_err(|e| self.io(e))? {
            number += 1;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line).map_err(|e| ArchiveError::Corrupt {
                path: self.path.clone(),
                line: number,
                message: e.to_string(),
            })?;
            records.push(record);
        }
        Ok(records)
    }

    /// Records for one proposal, oldest first.
    pub async fn records_for(&self, proposal_name: &str) -> ArchiveResult<Vec<RollbackRecord>> {
        Ok(self
            .records()
            .await?
            .into_iter()
            .filter(|r| r.proposal_name == proposal_name)
            .collect())
    }

    fn io(&self, source: std::io::Error) -> ArchiveError {
        ArchiveError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
