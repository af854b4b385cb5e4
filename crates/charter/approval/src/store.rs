//! File-backed proposal store.
//!
//! One `cr-*.yaml` file per proposal:
//!
//! ```text
//! proposals/
//!   cr-001.yaml
//!   cr-002.yaml
//!   .cr-002.lock      ← held while a sign/approve is in flight
//! ```
//!
//! Writes go through a temp file in the same directory followed by a
//! rename, so readers never see a half-written proposal.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use charter_types::{file_name_for, Proposal, Signature, PROPOSAL_FILE_PREFIX, PROPOSAL_FILE_SUFFIX};
use tracing::{debug, info, warn};

use crate::error::{ApprovalError, ApprovalResult};

/// Directory of pending proposals.
#[derive(Clone, Debug)]
pub struct ProposalStore {
    dir: PathBuf,
}

impl ProposalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `name`.
    pub fn path_for(&self, name: &str) -> ApprovalResult<PathBuf> {
        let stem = validate_name(name)?;
        Ok(self.dir.join(file_name_for(stem)))
    }

    /// All pending proposals, sorted by name.
    ///
    /// Files that fail to parse are skipped with a warning so one broken
    /// proposal does not hide the others.
    pub fn list(&self) -> ApprovalResult<Vec<Proposal>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.dir).map_err(|e| ApprovalError::io(&self.dir, e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ApprovalError::io(&self.dir, e))?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if file_name.starts_with(PROPOSAL_FILE_PREFIX) && file_name.ends_with(PROPOSAL_FILE_SUFFIX)
            {
                names.push(file_name.trim_end_matches(PROPOSAL_FILE_SUFFIX).to_string());
            }
        }
        names.sort();

        let mut proposals = Vec::with_capacity(names.len());
        for name in names {
            match self.load(&name) {
                Ok(p) => proposals.push(p),
                Err(e) => warn!(proposal = %name, error = %e, "skipping unreadable proposal"),
            }
        }
        Ok(proposals)
    }

    /// Load one proposal by name (`cr-001` or `cr-001.yaml`).
    pub fn load(&self, name: &str) -> ApprovalResult<Proposal> {
        let stem = validate_name(name)?;
        let path = self.path_for(stem)?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ApprovalError::ProposalNotFound(stem.to_string()));
            }
            Err(e) => return Err(ApprovalError::io(&path, e)),
        };

        let mut proposal: Proposal = serde_yaml::from_str(&raw).map_err(|e| ApprovalError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;
        proposal.name = stem.to_string();
        Ok(proposal)
    }

    /// Persist `proposal` atomically, creating the directory if needed.
    pub fn save(&self, proposal: &Proposal) -> ApprovalResult<PathBuf> {
        let path = self.path_for(&proposal.name)?;
        fs::create_dir_all(&self.dir).map_err(|e| ApprovalError::io(&self.dir, e))?;

        let yaml =
            serde_yaml::to_string(proposal).map_err(|e| ApprovalError::Serialize(e.to_string()))?;
        write_atomic(&path, yaml.as_bytes())?;
        debug!(proposal = %proposal.name, path = %path.display(), "proposal saved");
        Ok(path)
    }

    /// Remove a proposal. Returns whether a file was removed; a missing
    /// file is not an error.
    pub fn delete(&self, name: &str) -> ApprovalResult<bool> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(proposal = %name, "proposal removed");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ApprovalError::io(&path, e)),
        }
    }

    /// Add or replace `signature` on the stored proposal and persist it.
    pub fn upsert_signature(&self, name: &str, signature: Signature) -> ApprovalResult<Proposal> {
        let mut proposal = self.load(name)?;
        let identity = signature.identity.clone();
        proposal.upsert_signature(signature);
        self.save(&proposal)?;
        info!(
            proposal = %proposal.name,
            identity = %identity,
            signatures = proposal.signatures.len(),
            "signature recorded"
        );
        Ok(proposal)
    }
}

/// Accepts `cr-<id>` with or without the `.yaml` suffix; returns the stem.
fn validate_name(name: &str) -> ApprovalResult<&str> {
    let stem = name.strip_suffix(PROPOSAL_FILE_SUFFIX).unwrap_or(name);
    let valid = stem.len() > PROPOSAL_FILE_PREFIX.len()
        && stem.starts_with(PROPOSAL_FILE_PREFIX)
        && !stem.contains(['/', '\\'])
        && !stem.contains("..");
    if valid {
        Ok(stem)
    } else {
        Err(ApprovalError::InvalidName(name.to_string()))
    }
}

/// Write `bytes` to `path` via a sibling temp file and rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> ApprovalResult<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = parent.join(format!(".{file_name}.tmp"));

    let mut file = fs::File::create(&tmp).map_err(|e| ApprovalError::io(&tmp, e))?;
    file.write_all(bytes).map_err(|e| ApprovalError::io(&tmp, e))?;
    file.sync_all().map_err(|e| ApprovalError::io(&tmp, e))?;
    drop(file);

    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        ApprovalError::io(path, e)
    })
}
