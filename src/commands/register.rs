//! Register command - publish the local public key.

use anyhow::{Context, Result};
use clap::Args;

use sealchat::chat::{Directory, HttpDirectory, Username};

use super::{open_key_store, resolve_username, runtime, CommandExecutor, ConfigArgs};

/// Publish your public key to the directory under your username.
#[derive(Args, Debug)]
pub struct RegisterCommand {
    /// Your username
    #[arg(short, long)]
    pub user: Option<String>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

impl CommandExecutor for RegisterCommand {
    fn execute(&self) -> Result<()> {
        let config = self.config.load()?;
        let username = Username::parse(&resolve_username(self.user.as_deref(), &config)?)?;
        let keypair = open_key_store(&config)?
            .get_or_create_identity()
            .context("Failed to load or create the device key pair")?;
        let directory = HttpDirectory::new(&config.server_url)?;

        runtime()?.block_on(async {
            directory
                .upsert(&username, &keypair.public_key_b64())
                .await
                .context("Failed to publish public key")
        })?;

        println!("Registered {} at {}", username, config.server_url);
        Ok(())
    }
}
