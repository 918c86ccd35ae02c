//! Command module - Strategy pattern for CLI commands.
//!
//! Each command is a separate module implementing the `CommandExecutor` trait.

mod chat;
mod fingerprint;
mod history;
mod keygen;
mod register;
mod room;

pub use chat::ChatCommand;
pub use fingerprint::FingerprintCommand;
pub use history::HistoryCommand;
pub use keygen::KeygenCommand;
pub use register::RegisterCommand;
pub use room::RoomCommand;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use sealchat::chat::ChatConfig;
use sealchat::crypto::{FileKeyStorage, KeyStore};

/// Trait for command execution - Strategy pattern.
///
/// Each command struct holds its parsed arguments and implements
/// this trait to define its execution logic.
pub trait CommandExecutor {
    /// Executes the command with its parsed arguments.
    fn execute(&self) -> Result<()>;
}

/// Options shared by every command that touches config or device storage.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Config file (default: ~/.sealchat/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding the key pair, session token and peer cache
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Base URL of the directory and history API
    #[arg(long)]
    pub server: Option<String>,
}

impl ConfigArgs {
    /// Loads the config file and applies command-line overrides.
    pub fn load(&self) -> Result<ChatConfig> {
        let mut config = match &self.config {
            Some(path) => ChatConfig::load_from(path),
            None => ChatConfig::load(),
        }
        .context("Failed to load config")?;

        if let Some(dir) = &self.data_dir {
            config.data_dir = Some(dir.clone());
        }
        if let Some(server) = &self.server {
            config.server_url = server.clone();
        }
        Ok(config)
    }
}

/// Opens the device key store named by `config`.
pub fn open_key_store(config: &ChatConfig) -> Result<KeyStore<FileKeyStorage>> {
    let dir = config.data_dir().context("Failed to resolve data directory")?;
    Ok(KeyStore::new(FileKeyStorage::new(dir)))
}

/// Picks the username from the flag, falling back to the config.
pub fn resolve_username(flag: Option<&str>, config: &ChatConfig) -> Result<String> {
    flag.map(str::to_string)
        .or_else(|| config.username.clone())
        .context("No username given: pass --user or set `username` in the config file")
}

/// Builds the runtime for async commands.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")
}
