//! Approver key generation.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context};
use charter_approval::{generate_signing_key, public_key_pem, signing_key_pem};

pub fn keygen(identity: &str, out_dir: &Path) -> anyhow::Result<()> {
    if identity.is_empty() || identity.contains(['/', '\\']) {
        bail!("invalid identity: {identity:?}");
    }
    fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;

    let key = generate_signing_key();
    let private_path = out_dir.join(format!("{identity}.pem"));
    let public_path = out_dir.join(format!("{identity}.pub.pem"));
    let public = public_key_pem(&key)?;

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(&private_path)
        .with_context(|| format!("creating {} (refusing to overwrite)", private_path.display()))?;
    file.write_all(signing_key_pem(&key)?.as_bytes())?;
    fs::write(&public_path, &public)?;

    println!("✓ signing key: {}", private_path.display());
    println!("✓ public key:  {}", public_path.display());
    println!();
    println!("Add to approvers.yaml:");
    println!("  - identity: {identity}");
    println!("    public_key: |");
    for line in public.lines() {
        println!("      {line}");
    }
    Ok(())
}
