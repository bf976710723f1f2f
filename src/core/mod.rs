//! Core module - parsing, permissions and routing of prefix commands.
//!
//! Message processing runs parse -> resolve -> route:
//! - Command parsing into a typed intent
//! - Admin classification of the sender
//! - Routing against the command store

pub mod parser;
pub mod permissions;
pub mod router;

pub use parser::{parse, CommandIntent};
pub use permissions::{PermissionResolver, StorePermissions};
pub use router::{CommandListing, CommandRequest, Reply, RoleGrantRequest, Router};
