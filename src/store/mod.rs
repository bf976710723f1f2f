//! Command store - admins, text commands and role commands persisted in SQLite.

pub mod sqlite;
pub mod types;

pub use sqlite::CommandStore;
pub use types::{Entity, RoleCommand, RoleId, StoreSnapshot, TextCommand, UserId};
