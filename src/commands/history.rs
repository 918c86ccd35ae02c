//! History command - fetch and decrypt a room's history.

use anyhow::{Context, Result};
use clap::Args;

use sealchat::chat::{reconcile, HistoryStore, HttpHistoryStore, RoomId, Username};

use super::{open_key_store, resolve_username, runtime, CommandExecutor, ConfigArgs};

/// Print the history of the room shared with a peer.
///
/// Messages that cannot be decrypted are shown as a placeholder.
#[derive(Args, Debug)]
pub struct HistoryCommand {
    /// Your username
    #[arg(short, long)]
    pub user: Option<String>,

    /// The other participant
    #[arg(short, long)]
    pub peer: String,

    #[command(flatten)]
    pub config: ConfigArgs,
}

impl CommandExecutor for HistoryCommand {
    fn execute(&self) -> Result<()> {
        let config = self.config.load()?;
        let username = Username::parse(&resolve_username(self.user.as_deref(), &config)?)?;
        let peer = Username::parse(&self.peer)?;
        let keypair = open_key_store(&config)?
            .get_or_create_identity()
            .context("Failed to load or create the device key pair")?;
        let store = HttpHistoryStore::new(&config.server_url)?;
        let room = RoomId::for_pair(&username, &peer);

        let records = runtime()?
            .block_on(store.fetch(&room))
            .context("Failed to fetch history")?;

        for message in reconcile(&records, &username, &keypair) {
            println!("[{}] {}: {}", message.ts, message.from, message.text);
        }
        Ok(())
    }
}
