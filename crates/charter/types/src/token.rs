//! Content-addressed approval tokens.
//!
//! A token is `v1:<hex blake3 of canonical content>`. Canonicalisation
//! normalises line endings so the same logical content yields the same
//! token on every host.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Format version tag carried by every token.
pub const TOKEN_VERSION: &str = "v1";

/// Deterministic approval token for a piece of proposal content.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApprovalToken(String);

impl ApprovalToken {
    /// Compute the token for `content`.
    pub fn for_content(content: &str) -> Self {
        let canonical = canonicalize(content);
        let digest = blake3::hash(canonical.as_bytes());
        Self(format!("{}:{}", TOKEN_VERSION, digest.to_hex()))
    }

    /// Parse a token string, checking the version tag and digest shape.
    pub fn parse(raw: &str) -> Result<Self, TokenError> {
        let (version, digest) = raw
            .split_once(':')
            .ok_or_else(|| TokenError::Malformed(raw.to_string()))?;
        if version != TOKEN_VERSION {
            return Err(TokenError::UnsupportedVersion(version.to_string()));
        }
        if digest.len() != 64 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(TokenError::Malformed(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Bytes that are signed by approvers.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for ApprovalToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.0.get(..15).unwrap_or(&self.0);
        write!(f, "ApprovalToken({short})")
    }
}

impl fmt::Display for ApprovalToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors produced when parsing a token string.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("malformed approval token: {0}")]
    Malformed(String),
    #[error("unsupported approval token version: {0}")]
    UnsupportedVersion(String),
}

fn canonicalize(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}
