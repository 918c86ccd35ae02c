//! Room id command.

use anyhow::Result;
use clap::Args;

use sealchat::chat::room_id;

use super::CommandExecutor;

/// Print the room id two users share.
#[derive(Args, Debug)]
pub struct RoomCommand {
    /// First username
    pub user_a: String,

    /// Second username
    pub user_b: String,
}

impl CommandExecutor for RoomCommand {
    fn execute(&self) -> Result<()> {
        println!("{}", room_id(&self.user_a, &self.user_b)?);
        Ok(())
    }
}
