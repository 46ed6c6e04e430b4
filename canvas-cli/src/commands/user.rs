//! `canvas user add <id>` and `canvas user list`

use anyhow::{Context, Result};
use clap::Subcommand;

use canvas_core::UserId;
use canvas_store::Store;

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Register a user identity.
    Add {
        /// User id (also used as the owner folder name).
        id: String,
    },

    /// List registered users.
    List,
}

pub async fn run(store: &Store, cmd: UserCommand) -> Result<()> {
    match cmd {
        UserCommand::Add { id } => add(store, UserId::from(id)).await,
        UserCommand::List => list(store).await,
    }
}

async fn add(store: &Store, user: UserId) -> Result<()> {
    let created = store
        .users
        .register(&user)
        .await
        .with_context(|| format!("failed to register user '{user}'"))?;
    if created {
        println!("✓ Registered user '{user}'");
    } else {
        println!("User '{user}' already registered");
    }
    Ok(())
}

async fn list(store: &Store) -> Result<()> {
    let users = store.users.list().await.context("failed to read users")?;
    if users.is_empty() {
        println!("No users registered.");
        println!("Run: canvas user add <id>");
        return Ok(());
    }
    for user in users {
        println!("{user}");
    }
    Ok(())
}
