//! ed25519 key files.
//!
//! Signing keys are PKCS#8 PEM, public keys SPKI PEM, both via the
//! `pkcs8` support in `ed25519-dalek`.

use std::fs;
use std::path::Path;

use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::SigningKey;

use crate::error::{ApprovalError, ApprovalResult};

/// Generate a fresh signing key from the OS RNG.
pub fn generate_signing_key() -> SigningKey {
    SigningKey::generate(&mut rand::rngs::OsRng)
}

/// Load a PKCS#8 PEM signing key.
pub fn load_signing_key(path: &Path) -> ApprovalResult<SigningKey> {
    let pem = match fs::read_to_string(path) {
        Ok(pem) => pem,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApprovalError::FileNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(ApprovalError::io(path, e)),
    };
    SigningKey::from_pkcs8_pem(pem.trim()).map_err(|e| ApprovalError::InvalidKey(e.to_string()))
}

/// PKCS#8 PEM encoding of `key`.
pub fn signing_key_pem(key: &SigningKey) -> ApprovalResult<String> {
    key.to_pkcs8_pem(LineEnding::LF)
        .map(|pem| pem.to_string())
        .map_err(|e| ApprovalError::InvalidKey(e.to_string()))
}

/// SPKI PEM encoding of the public half of `key`.
pub fn public_key_pem(key: &SigningKey) -> ApprovalResult<String> {
    key.verifying_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| ApprovalError::InvalidKey(e.to_string()))
}
