//! Per-proposal advisory lock.
//!
//! A `.cr-<id>.lock` file created with `create_new` serialises `sign`
//! and `approve` for one proposal across processes. The file is removed
//! when the [`ProposalLock`] drops. A crash leaves the file behind; it
//! has to be removed by hand, the error names its path.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{ApprovalError, ApprovalResult};

/// Held for the duration of one state-changing operation.
#[derive(Debug)]
pub struct ProposalLock {
    name: String,
    path: PathBuf,
}

impl ProposalLock {
    /// Acquire the lock for `name` inside `dir`.
    pub fn acquire(dir: &Path, name: &str) -> ApprovalResult<Self> {
        let stem = name.trim_end_matches(charter_types::PROPOSAL_FILE_SUFFIX);
        fs::create_dir_all(dir).map_err(|e| ApprovalError::io(dir, e))?;
        let path = dir.join(format!(".{stem}.lock"));

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(ApprovalError::Locked {
                    name: stem.to_string(),
                    lock: path,
                });
            }
            Err(e) => return Err(ApprovalError::io(&path, e)),
        };
        // Owner pid, informational only.
        let _ = writeln!(file, "{}", std::process::id());

        debug!(proposal = %stem, "proposal lock acquired");
        Ok(Self {
            name: stem.to_string(),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProposalLock {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(proposal = %self.name, "proposal lock released"),
            Err(e) => warn!(proposal = %self.name, error = %e, "failed to release proposal lock"),
        }
    }
}
