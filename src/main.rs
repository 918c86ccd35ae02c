//! Sealchat - encrypted two-party chat
//!
//! A CLI client for end-to-end encrypted chat over a relay.
//! Every message is sealed to both participants' public keys.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use commands::{
    ChatCommand, CommandExecutor, FingerprintCommand, HistoryCommand, KeygenCommand,
    RegisterCommand, RoomCommand,
};

/// Sealchat - encrypted two-party chat
///
/// Messages are sealed twice, once for the recipient and once for the
/// sender, so both can read them back from history.
#[derive(Parser)]
#[command(name = "sealchat")]
#[command(version)]
#[command(about = "End-to-end encrypted two-party chat")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create (or show) the device key pair
    Keygen(KeygenCommand),

    /// Show the fingerprint of a public key
    Fingerprint(FingerprintCommand),

    /// Print the room id shared by two users
    Room(RoomCommand),

    /// Publish your public key to the directory
    Register(RegisterCommand),

    /// Print the decrypted history of a room
    History(HistoryCommand),

    /// Chat with a peer
    Chat(ChatCommand),
}

impl Commands {
    fn executor(&self) -> &dyn CommandExecutor {
        match self {
            Commands::Keygen(cmd) => cmd,
            Commands::Fingerprint(cmd) => cmd,
            Commands::Room(cmd) => cmd,
            Commands::Register(cmd) => cmd,
            Commands::History(cmd) => cmd,
            Commands::Chat(cmd) => cmd,
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sealchat=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    if let Err(err) = cli.command.executor().execute() {
        error!("{:#}", err);
        return Err(err);
    }
    Ok(())
}
