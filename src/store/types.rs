//! Identifiers and records held by the command store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Built-ins only admins may run.
pub const ADMIN_COMMANDS: &[&str] = &["add", "remove"];

/// Built-ins everyone may run.
pub const STATIC_COMMANDS: &[&str] = &["commands"];

/// Whether `name` collides with a built-in command (case-insensitive).
pub fn is_builtin(name: &str) -> bool {
    let name = name.to_lowercase();
    ADMIN_COMMANDS
        .iter()
        .chain(STATIC_COMMANDS)
        .any(|builtin| *builtin == name)
}

/// Platform-assigned user identifier.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Platform-assigned role identifier.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct RoleId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(UserId)
    }
}

impl FromStr for RoleId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(RoleId)
    }
}

/// Stored collection an error or record belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entity {
    Admin,
    TextCommand,
    RoleCommand,
    RoleGrant,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Admin => write!(f, "admin"),
            Entity::TextCommand => write!(f, "text command"),
            Entity::RoleCommand => write!(f, "role command"),
            Entity::RoleGrant => write!(f, "role grant"),
        }
    }
}

/// A user-defined name to response mapping.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TextCommand {
    pub name: String,
    pub response: String,
    #[serde(default)]
    pub admin_only: bool,
}

impl TextCommand {
    pub fn new(name: &str, response: &str, admin_only: bool) -> Self {
        Self {
            name: name.to_string(),
            response: response.to_string(),
            admin_only,
        }
    }
}

/// A named trigger that grants a fixed, ordered set of roles.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RoleCommand {
    pub name: String,
    pub roles: Vec<RoleId>,
}

/// Full copy of every table, used for diagnostics.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct StoreSnapshot {
    pub admins: Vec<UserId>,
    pub text_commands: Vec<TextCommand>,
    pub role_commands: Vec<RoleCommand>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        assert!(is_builtin("add"));
        assert!(is_builtin("REMOVE"));
        assert!(is_builtin("Commands"));
        assert!(!is_builtin("greet"));
        assert!(!is_builtin("adds"));
    }

    #[test]
    fn test_ids_parse_and_display() {
        let user: UserId = " 170045009318510593 ".parse().unwrap();
        assert_eq!(user, UserId(170045009318510593));
        assert_eq!(user.to_string(), "170045009318510593");

        assert!("abc".parse::<RoleId>().is_err());
        assert_eq!("42".parse::<RoleId>().unwrap(), RoleId(42));
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&UserId(7)).unwrap();
        assert_eq!(json, "7");
        let role: RoleId = serde_json::from_str("9").unwrap();
        assert_eq!(role, RoleId(9));
    }
}
