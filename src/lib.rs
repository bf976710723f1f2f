//! rolecall library root.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod store;

pub use cli::Commands;
pub use config::{load_settings, Settings};
pub use core::{CommandIntent, Reply, RoleGrantRequest, Router};
pub use error::{Error, Result};
pub use messaging::{Dispatcher, InboundMessage, Messenger};
pub use store::{CommandStore, RoleId, TextCommand, UserId};
