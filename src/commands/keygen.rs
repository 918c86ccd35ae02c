//! Key generation command.

use anyhow::{Context, Result};
use clap::Args;

use sealchat::crypto::{fingerprint, format_fingerprint};

use super::{open_key_store, CommandExecutor, ConfigArgs};

/// Create the device key pair, or show it if it already exists.
///
/// The key pair is stored in `<data-dir>/keypair.json` and is never
/// regenerated once created.
#[derive(Args, Debug)]
pub struct KeygenCommand {
    #[command(flatten)]
    pub config: ConfigArgs,
}

impl CommandExecutor for KeygenCommand {
    fn execute(&self) -> Result<()> {
        let config = self.config.load()?;
        let store = open_key_store(&config)?;
        let keypair = store
            .get_or_create_identity()
            .context("Failed to load or create the device key pair")?;

        println!("Public key:  {}", keypair.public_key_b64());
        println!(
            "Fingerprint: {}",
            format_fingerprint(&fingerprint(keypair.public_key()))
        );
        println!("Stored in:   {}", store.storage().dir().display());
        Ok(())
    }
}
