//! CLI commands for rolecall using clap.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{load_settings, resolve_settings_path, save_new_settings, Settings};
use crate::core::Router;
use crate::messaging::console::parse_console_line;
use crate::messaging::{run_console, ConsoleMessenger, Dispatcher};
use crate::store::{CommandStore, RoleId, UserId};

/// rolecall - prefix commands, admin permissions and self-service roles for chat servers.
#[derive(Parser)]
#[command(name = "rolecall")]
#[command(version = "0.1.0")]
#[command(about = "rolecall - prefix command bot with text and role commands", long_about = None)]
pub struct Commands {
    /// Settings file (defaults to ~/.rolecall/settings.json)
    #[arg(long, global = true, env = "ROLECALL_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Directory for rolling log files (defaults to the platform data dir)
    #[arg(long, global = true, env = "ROLECALL_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a settings file and create the command database
    Init {
        /// User id of the bootstrap admin
        #[arg(long)]
        bootstrap_admin: UserId,

        /// Command prefix
        #[arg(long, default_value = "!!")]
        prefix: String,

        /// Database file (defaults to ~/.rolecall/commands.db)
        #[arg(long)]
        database: Option<PathBuf>,
    },

    /// Read `<user_id>: <message>` lines from stdin and answer them
    Console {
        /// Send every line as this user
        #[arg(long = "as")]
        sender: Option<UserId>,
    },

    /// Dispatch a single message
    Send {
        /// Sending user id
        #[arg(long = "as")]
        sender: UserId,

        /// Mentioned user ids, in addition to <@id> mentions in the text
        #[arg(long = "mention")]
        mentions: Vec<UserId>,

        /// Mentioned role ids, in addition to <@&id> mentions in the text
        #[arg(long = "role")]
        roles: Vec<RoleId>,

        /// Message text, including the prefix
        message: String,
    },

    /// Print every stored admin and command
    Dump,
}

impl Commands {
    /// Run the command.
    pub async fn run(&self) -> Result<()> {
        let settings_path = resolve_settings_path(self.settings.as_deref())?;
        match &self.command {
            Command::Init {
                bootstrap_admin,
                prefix,
                database,
            } => cmd_init(&settings_path, *bootstrap_admin, prefix, database.clone()),
            Command::Console { sender } => cmd_console(&settings_path, *sender).await,
            Command::Send {
                sender,
                mentions,
                roles,
                message,
            } => cmd_send(&settings_path, *sender, mentions, roles, message).await,
            Command::Dump => cmd_dump(&settings_path),
        }
    }
}

fn open_store(settings: &Settings) -> Result<Arc<CommandStore>> {
    let path = settings.database_path()?;
    let store = CommandStore::open(&path, settings.bootstrap_admin)?;
    Ok(Arc::new(store))
}

fn close_store(store: Arc<CommandStore>) -> Result<()> {
    match Arc::try_unwrap(store) {
        Ok(store) => store.close()?,
        Err(_) => tracing::warn!("Command store still in use at shutdown"),
    }
    Ok(())
}

// Command implementations

fn cmd_init(
    settings_path: &Path,
    bootstrap_admin: UserId,
    prefix: &str,
    database: Option<PathBuf>,
) -> Result<()> {
    let settings = Settings {
        prefix: prefix.to_string(),
        database,
        bootstrap_admin,
    };
    save_new_settings(settings_path, &settings)?;

    let store = open_store(&settings)?;
    close_store(store)?;

    println!("Settings written to {}", settings_path.display());
    println!("Database ready at {}", settings.database_path()?.display());
    Ok(())
}

async fn cmd_console(settings_path: &Path, sender: Option<UserId>) -> Result<()> {
    let settings = load_settings(settings_path)?;
    let store = open_store(&settings)?;
    let dispatcher = Dispatcher::new(&settings.prefix, Router::new(store.clone()));

    let result = run_console(&dispatcher, sender).await;

    drop(dispatcher);
    close_store(store)?;
    Ok(result?)
}

async fn cmd_send(
    settings_path: &Path,
    sender: UserId,
    mentions: &[UserId],
    roles: &[RoleId],
    message: &str,
) -> Result<()> {
    let settings = load_settings(settings_path)?;
    let store = open_store(&settings)?;
    let dispatcher = Dispatcher::new(&settings.prefix, Router::new(store.clone()));

    let mut msg = parse_console_line(message, Some(sender))
        .ok_or_else(|| anyhow::anyhow!("Could not read message"))?;
    for user in mentions {
        if !msg.mentions.contains(user) {
            msg.mentions.push(*user);
        }
    }
    for role in roles {
        if !msg.role_mentions.contains(role) {
            msg.role_mentions.push(*role);
        }
    }

    let handled = dispatcher.on_message(&msg, &ConsoleMessenger).await;

    drop(dispatcher);
    close_store(store)?;

    if !handled? {
        println!("Message does not start with prefix '{}'", settings.prefix);
    }
    Ok(())
}

fn cmd_dump(settings_path: &Path) -> Result<()> {
    let settings = load_settings(settings_path)?;
    let store = open_store(&settings)?;
    let snapshot = store.snapshot()?;
    close_store(store)?;

    println!("Admins");
    println!("==========================");
    for admin in &snapshot.admins {
        let marker = if *admin == settings.bootstrap_admin { " (bootstrap)" } else { "" };
        println!("{}{}", admin, marker);
    }

    println!();
    println!("Text commands");
    println!("==========================");
    for command in &snapshot.text_commands {
        let scope = if command.admin_only { "admin" } else { "everyone" };
        println!("{} [{}]: {}", command.name, scope, command.response);
    }

    println!();
    println!("Role commands");
    println!("==========================");
    for command in &snapshot.role_commands {
        let roles: Vec<String> = command.roles.iter().map(|r| r.to_string()).collect();
        println!("{}: {}", command.name, roles.join(", "));
    }

    Ok(())
}
