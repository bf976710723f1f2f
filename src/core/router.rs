//! Command routing.
//!
//! Takes one prefix-stripped message plus its mention metadata and decides
//! what to do with it:
//! - `commands` renders the names the caller can see
//! - admin `add`/`remove` mutate the command store
//! - everything else resolves against role commands, then text commands
//!
//! The router never talks to the chat platform. It returns a [`Reply`] with
//! the response text and any role grants for the messaging layer to execute.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::store::types::{ADMIN_COMMANDS, STATIC_COMMANDS};
use crate::store::{CommandStore, Entity, RoleId, UserId};

use super::parser::{self, CommandIntent};
use super::permissions::{PermissionResolver, StorePermissions};

pub const INVALID_COMMAND: &str = "Invalid command!";
pub const COMMAND_ADDED: &str = "Command added!";
pub const COMMAND_REMOVED: &str = "Command removed!";
pub const TEXT_COMMAND_EXISTS: &str = "A command with that name already exists!";
pub const ROLE_COMMAND_EXISTS: &str = "A role command with that name already exists!";
pub const ROLE_ALREADY_GRANTED: &str = "One of those roles is already granted by another role command!";
pub const ROLE_COMMAND_MISSING: &str = "No role command with that name exists!";
pub const RESERVED_NAME: &str = "That name is reserved for a built-in command!";
pub const ADMIN_ADDED: &str = "User added as admin!";
pub const ADMIN_EXISTS: &str = "That user is already an admin!";
pub const ADMIN_REMOVED: &str = "User removed from admin!";
pub const ROLES_GRANTED: &str = "Roles granted!";

/// One message to route.
#[derive(Clone, Copy, Debug)]
pub struct CommandRequest<'a> {
    pub sender: UserId,
    /// Message text with the prefix already stripped.
    pub text: &'a str,
    pub mentions: &'a [UserId],
    pub role_mentions: &'a [RoleId],
}

/// A role the messaging layer should give to a user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoleGrantRequest {
    pub user: UserId,
    pub role: RoleId,
}

/// Outcome of routing a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub grants: Vec<RoleGrantRequest>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            grants: Vec::new(),
        }
    }
}

/// Names visible to a caller, split into admin built-ins and everything else.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandListing {
    pub admin: Vec<String>,
    pub general: Vec<String>,
}

impl CommandListing {
    pub fn render(&self) -> String {
        let mut out = String::from("**Available Commands:**\n");
        if !self.admin.is_empty() {
            out.push_str("\n*Admin Commands:*\n> ");
            out.push_str(&self.admin.join("\n> "));
            out.push('\n');
        }
        out.push_str("\n*General Commands*:\n> ");
        out.push_str(&self.general.join("\n> "));
        out
    }
}

/// Dispatches parsed commands against the command store.
pub struct Router {
    store: Arc<CommandStore>,
    permissions: Arc<dyn PermissionResolver>,
}

impl Router {
    /// Router whose permission checks read the store's admin table.
    pub fn new(store: Arc<CommandStore>) -> Self {
        let permissions = Arc::new(StorePermissions::new(store.clone()));
        Self { store, permissions }
    }

    pub fn with_permissions(store: Arc<CommandStore>, permissions: Arc<dyn PermissionResolver>) -> Self {
        Self { store, permissions }
    }

    /// Route one message. Only storage failures are returned as errors.
    pub fn route(&self, request: &CommandRequest<'_>) -> Result<Reply> {
        let is_admin = self.permissions.is_admin(request.sender)?;

        // Non-admins never reach the admin grammar; their `add`/`remove`
        // is looked up like any other stored command name.
        let word = parser::command_word(request.text);
        let parsed = if parser::is_admin_command(&word) && !is_admin {
            Ok(CommandIntent::Invoke { name: word })
        } else {
            parser::parse(request.text)
        };

        let intent = match parsed {
            Ok(intent) => intent,
            Err(Error::MalformedCommand(reason)) => {
                tracing::debug!("Rejected command from {}: {}", request.sender, reason);
                return Ok(Reply::text(INVALID_COMMAND));
            }
            Err(e) => return Err(e),
        };

        match intent {
            CommandIntent::List => Ok(Reply::text(self.list_commands(is_admin)?.render())),
            CommandIntent::AddText {
                name,
                response,
                admin_only,
            } => respond(
                self.store.add_text_command(&name, &response, admin_only),
                COMMAND_ADDED,
            ),
            CommandIntent::RemoveText { name } => {
                respond(self.store.remove_text_command(&name), COMMAND_REMOVED)
            }
            CommandIntent::AddRole { name } => respond(
                self.store.add_role_command(&name, request.role_mentions),
                COMMAND_ADDED,
            ),
            CommandIntent::RemoveRole { name } => {
                respond(self.store.remove_role_command(&name), COMMAND_REMOVED)
            }
            CommandIntent::AddAdmin => {
                if request.mentions.is_empty() {
                    return Ok(Reply::text(INVALID_COMMAND));
                }
                respond(self.store.add_admins(request.mentions), ADMIN_ADDED)
            }
            CommandIntent::RemoveAdmin => self.remove_admins(request),
            CommandIntent::Invoke { name } => self.invoke(request.sender, &name, is_admin),
        }
    }

    /// The bootstrap admin removes whoever it mentions (never itself); any
    /// other admin can only step down.
    fn remove_admins(&self, request: &CommandRequest<'_>) -> Result<Reply> {
        let bootstrap = self.store.bootstrap_admin();
        let targets: Vec<UserId> = if request.sender == bootstrap {
            request
                .mentions
                .iter()
                .copied()
                .filter(|user| *user != bootstrap)
                .collect()
        } else {
            vec![request.sender]
        };

        respond(self.store.remove_admins(&targets), ADMIN_REMOVED)
    }

    /// Role grants run whenever a role command matches; a matching text
    /// command's response still replaces the grant confirmation.
    fn invoke(&self, sender: UserId, name: &str, is_admin: bool) -> Result<Reply> {
        let mut reply = Reply::text(INVALID_COMMAND);

        if let Some(roles) = self.store.find_role_command(name)? {
            reply.grants = roles
                .into_iter()
                .map(|role| RoleGrantRequest { user: sender, role })
                .collect();
            reply.text = ROLES_GRANTED.to_string();
        }

        if let Some(command) = self.store.find_text_command(name, is_admin)? {
            reply.text = command.response;
        }

        tracing::debug!(
            "Invoked '{}' for {}: {} grant(s)",
            name,
            sender,
            reply.grants.len()
        );
        Ok(reply)
    }

    /// Every command name the caller may use, deduplicated and sorted.
    pub fn list_commands(&self, is_admin: bool) -> Result<CommandListing> {
        let mut general: Vec<String> = STATIC_COMMANDS.iter().map(|c| c.to_string()).collect();
        general.extend(
            self.store
                .list_text_commands(is_admin)?
                .into_iter()
                .map(|command| command.name),
        );
        general.extend(self.store.list_role_commands()?);
        general.retain(|name| !parser::is_admin_command(name));
        general.sort();
        general.dedup();

        let admin = if is_admin {
            ADMIN_COMMANDS.iter().map(|c| c.to_string()).collect()
        } else {
            Vec::new()
        };

        Ok(CommandListing { admin, general })
    }
}

/// Turn a store mutation into user-facing text, passing storage failures through.
fn respond(result: Result<()>, success: &str) -> Result<Reply> {
    let text = match result {
        Ok(()) => success,
        Err(Error::DuplicateKey(Entity::TextCommand, _)) => TEXT_COMMAND_EXISTS,
        Err(Error::DuplicateKey(Entity::RoleCommand, _)) => ROLE_COMMAND_EXISTS,
        Err(Error::DuplicateKey(Entity::RoleGrant, _)) => ROLE_ALREADY_GRANTED,
        Err(Error::DuplicateKey(Entity::Admin, _)) => ADMIN_EXISTS,
        Err(Error::NotFound(Entity::RoleCommand, _)) => ROLE_COMMAND_MISSING,
        Err(Error::ReservedName(_)) => RESERVED_NAME,
        Err(Error::MalformedCommand(_)) => INVALID_COMMAND,
        Err(e) => return Err(e),
    };
    Ok(Reply::text(text))
}
