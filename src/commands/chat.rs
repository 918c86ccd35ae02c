//! Chat command for interactive two-party messaging.
//!
//! Connects to the relay, joins the room shared with the peer, replays the
//! room history and then interleaves stdin lines with incoming events.
//!
//! Lines starting with `/` are commands:
//!
//! - `/quit` - leave the chat
//! - `/status` - show room, peer key and presence

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use sealchat::chat::{
    ChatError, ChatSession, Directory, DisplayMessage, EventTransport, HistoryStore,
    HttpDirectory, HttpHistoryStore, Identity, TcpConnection,
};
use sealchat::contacts::PeerCache;

use super::{open_key_store, resolve_username, runtime, CommandExecutor, ConfigArgs};

/// Chat with a peer through the relay.
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Your username
    #[arg(short, long)]
    pub user: Option<String>,

    /// The user to chat with
    #[arg(short, long)]
    pub peer: String,

    /// Relay address (host:port)
    #[arg(long)]
    pub relay: Option<String>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

impl CommandExecutor for ChatCommand {
    fn execute(&self) -> Result<()> {
        let config = self.config.load()?;
        let username = resolve_username(self.user.as_deref(), &config)?;
        let store = open_key_store(&config)?;
        let identity = Identity::load(&username, &store)?;
        let peers = PeerCache::load_from_dir(store.storage().dir())
            .context("Failed to load peer cache")?;
        let relay = self.relay.clone().unwrap_or_else(|| config.relay_addr.clone());
        let directory = HttpDirectory::new(&config.server_url)?;
        let history = HttpHistoryStore::new(&config.server_url)?;

        runtime()?.block_on(async {
            let transport = TcpConnection::connect(relay.as_str())
                .await
                .with_context(|| format!("Failed to connect to relay at {}", relay))?;

            let mut session = ChatSession::new(identity, transport, directory, history, &config)
                .with_peer_cache(peers);
            run_chat(&mut session, &self.peer).await
        })
    }
}

async fn run_chat<T, D, H>(session: &mut ChatSession<T, D, H>, peer: &str) -> Result<()>
where
    T: EventTransport,
    D: Directory,
    H: HistoryStore,
{
    session.register().await.context("Failed to publish public key")?;
    let room = session.join(peer).await?;

    println!("Joined {} (type /quit to leave)", room);
    for message in session.messages().await {
        print_message(&message);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                let line = line.trim();
                match line {
                    "" => continue,
                    "/quit" => break,
                    "/status" => {
                        println!("{:?}", session.debug_snapshot().await);
                        continue;
                    }
                    _ => {}
                }

                if let Err(err) = session.send_typing().await {
                    warn!(error = %err, "could not send typing notice");
                }
                match session.send(line).await {
                    Ok(_) => {}
                    Err(err) if err.is_recoverable() => println!("! {}", err),
                    Err(err) => return Err(err.into()),
                }
            }
            event = session.next_event() => {
                match event {
                    Ok(Some(message)) => print_message(&message),
                    Ok(None) => {
                        if session.is_peer_typing(Instant::now()) {
                            println!("* {} is typing...", peer);
                        }
                    }
                    Err(ChatError::TransportError(msg)) => {
                        println!("! Disconnected: {}", msg);
                        break;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }
    }

    session.close().await.ok();
    Ok(())
}

fn print_message(message: &DisplayMessage) {
    println!("[{}] {}: {}", message.ts, message.from, message.text);
}
