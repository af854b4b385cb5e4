//! Reference strategies.
//!
//! Both read their parameters from the raw rule definition:
//!
//! ```yaml
//! - id: hygiene.no_secrets
//!   forbidden: ["**/*.pem", "secrets/**"]
//! - id: hygiene.readme
//!   required: ["README.md"]
//! ```

use charter_types::Finding;
use globset::{Glob, GlobSetBuilder};
use walkdir::WalkDir;

use crate::error::{StrategyError, StrategyResult};
use crate::strategy::{StrategyContext, SyncStrategy};

/// Directories never scanned by the reference strategies.
const SKIP_DIRS: &[&str] = &[".git", "target", "node_modules", ".venv", "venv", "__pycache__"];

/// Fails for every repository file matching a glob in `forbidden`.
pub struct ForbiddenPathStrategy;

impl SyncStrategy for ForbiddenPathStrategy {
    fn name(&self) -> &str {
        "forbidden-paths"
    }

    fn verify(&self, ctx: &StrategyContext) -> StrategyResult<Vec<Finding>> {
        let patterns = ctx
            .string_list("forbidden")
            .ok_or_else(|| StrategyError::InvalidRule("missing 'forbidden' list".into()))?;

        let mut builder = GlobSetBuilder::new();
        for pattern in &patterns {
            let glob = Glob::new(pattern)
                .map_err(|e| StrategyError::InvalidRule(format!("bad glob '{pattern}': {e}")))?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| StrategyError::InvalidRule(e.to_string()))?;

        let mut findings = Vec::new();
        let walker = WalkDir::new(&ctx.repo_root)
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !e
                        .file_name()
                        .to_str()
                        .map(|n| SKIP_DIRS.contains(&n))
                        .unwrap_or(false)
            });
        for entry in walker {
            let entry = entry.map_err(|e| StrategyError::Failed(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&ctx.repo_root) else {
                continue;
            };
            let rel = rel.to_string_lossy().replace('\\', "/");
            if set.is_match(&rel) {
                findings.push(
                    Finding::error(self.name(), format!("forbidden file present: {rel}"))
                        .with_file(rel),
                );
            }
        }
        Ok(findings)
    }
}

/// Fails for every path in `required` that does not exist.
pub struct RequiredFileStrategy;

impl SyncStrategy for RequiredFileStrategy {
    fn name(&self) -> &str {
        "required-files"
    }

    fn verify(&self, ctx: &StrategyContext) -> StrategyResult<Vec<Finding>> {
        let required = ctx
            .string_list("required")
            .ok_or_else(|| StrategyError::InvalidRule("missing 'required' list".into()))?;

        Ok(required
            .into_iter()
            .filter(|p| !ctx.repo_root.join(p).exists())
            .map(|p| Finding::error(self.name(), format!("required file missing: {p}")).with_file(p))
            .collect())
    }
}
