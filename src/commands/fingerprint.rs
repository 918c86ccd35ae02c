//! Fingerprint command - display key fingerprints for verification.

use anyhow::{Context, Result};
use clap::Args;

use sealchat::crypto::{decode_public_key, fingerprint, format_fingerprint};

use super::CommandExecutor;

/// Display a public key's fingerprint for out-of-band verification.
///
/// Compare fingerprints with your contact over a separate channel
/// (phone call, in person) to detect a substituted directory key.
#[derive(Args, Debug)]
pub struct FingerprintCommand {
    /// Public key in base64
    #[arg(required = true)]
    pub public_key: String,
}

impl CommandExecutor for FingerprintCommand {
    fn execute(&self) -> Result<()> {
        let key = decode_public_key(self.public_key.trim()).context("Invalid public key")?;
        println!("{}", format_fingerprint(&fingerprint(&key)));
        Ok(())
    }
}
