//! Command parsing.
//!
//! Turns prefix-stripped message text into a typed [`CommandIntent`]:
//! - `commands` lists what the caller may run
//! - `add|remove <type> ...` manages text commands, role commands and admins
//! - anything else is an invocation of a stored command

use crate::error::{Error, Result};

use crate::store::types::{ADMIN_COMMANDS, STATIC_COMMANDS};

/// Payload suffix marking a new text command as admin-only.
const ADMIN_ONLY_SUFFIX: &str = " admin";

/// Whether a lowered command word is an admin built-in.
pub fn is_admin_command(command: &str) -> bool {
    ADMIN_COMMANDS.contains(&command)
}

/// What an `add`/`remove` command operates on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Subtype {
    TextCommand,
    RoleCommand,
    Admin,
}

impl Subtype {
    fn parse(token: &str) -> Option<Self> {
        match token.to_lowercase().as_str() {
            "textcommand" | "command" => Some(Subtype::TextCommand),
            "rolecommand" => Some(Subtype::RoleCommand),
            "su" | "admin" | "superuser" => Some(Subtype::Admin),
            _ => None,
        }
    }
}

/// A validated command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandIntent {
    List,
    AddText {
        name: String,
        response: String,
        admin_only: bool,
    },
    RemoveText {
        name: String,
    },
    AddRole {
        name: String,
    },
    RemoveRole {
        name: String,
    },
    AddAdmin,
    RemoveAdmin,
    Invoke {
        name: String,
    },
}

/// The lowered first token of `text`, or an empty string.
pub fn command_word(text: &str) -> String {
    text.split_whitespace()
        .next()
        .unwrap_or("")
        .to_lowercase()
}

/// Split into at most `limit` pieces: whitespace-delimited tokens, with the
/// final piece holding the untouched remainder.
fn split_tokens(text: &str, limit: usize) -> Vec<&str> {
    let mut parts = Vec::with_capacity(limit);
    let mut rest = text.trim_start();

    while !rest.is_empty() {
        if parts.len() + 1 == limit {
            parts.push(rest);
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                parts.push(&rest[..end]);
                rest = rest[end..].trim_start();
            }
            None => {
                parts.push(rest);
                break;
            }
        }
    }

    parts
}

/// Split a text command payload into its response and admin-only flag.
fn parse_response(payload: &str) -> (String, bool) {
    let (body, admin_only) = match payload.strip_suffix(ADMIN_ONLY_SUFFIX) {
        Some(body) => (body, true),
        None => (payload, false),
    };
    let body = body.strip_prefix('"').unwrap_or(body);
    let body = body.strip_suffix('"').unwrap_or(body);
    (body.to_string(), admin_only)
}

/// Parse prefix-stripped message text.
pub fn parse(text: &str) -> Result<CommandIntent> {
    let parts = split_tokens(text.trim_end(), 4);
    let Some(first) = parts.first() else {
        return Err(Error::MalformedCommand("empty command".to_string()));
    };
    let command = first.to_lowercase();

    if STATIC_COMMANDS.contains(&command.as_str()) {
        return Ok(CommandIntent::List);
    }

    if !is_admin_command(&command) {
        return Ok(CommandIntent::Invoke { name: command });
    }

    let adding = command == "add";
    let subtype = parts
        .get(1)
        .ok_or_else(|| Error::MalformedCommand(format!("'{}' needs a command type", command)))?;
    let subtype = Subtype::parse(subtype)
        .ok_or_else(|| Error::MalformedCommand(format!("unknown command type '{}'", subtype)))?;

    let name = || {
        parts
            .get(2)
            .map(|name| name.to_string())
            .ok_or_else(|| Error::MalformedCommand(format!("'{}' needs a command name", command)))
    };

    let intent = match (subtype, adding) {
        (Subtype::TextCommand, true) => {
            let name = name()?;
            let payload = parts
                .get(3)
                .ok_or_else(|| Error::MalformedCommand(format!("'{}' needs a response", name)))?;
            let (response, admin_only) = parse_response(payload);
            if response.is_empty() {
                return Err(Error::MalformedCommand(format!("'{}' needs a response", name)));
            }
            CommandIntent::AddText {
                name,
                response,
                admin_only,
            }
        }
        (Subtype::TextCommand, false) => {
            if parts.len() > 3 {
                return Err(Error::MalformedCommand(
                    "remove textcommand takes a single name".to_string(),
                ));
            }
            CommandIntent::RemoveText { name: name()? }
        }
        (Subtype::RoleCommand, true) => CommandIntent::AddRole { name: name()? },
        (Subtype::RoleCommand, false) => CommandIntent::RemoveRole { name: name()? },
        (Subtype::Admin, true) => CommandIntent::AddAdmin,
        (Subtype::Admin, false) => CommandIntent::RemoveAdmin,
    };

    tracing::debug!("Parsed command {:?}", intent);
    Ok(intent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_tokens() {
        assert_eq!(
            split_tokens("add  textcommand greet \"hi   there\" admin", 4),
            vec!["add", "textcommand", "greet", "\"hi   there\" admin"]
        );
        assert_eq!(split_tokens("  commands  ", 4), vec!["commands"]);
        assert!(split_tokens("   ", 4).is_empty());
    }

    #[test]
    fn test_parse_add_text_admin_only() {
        let intent = parse("add textcommand greet \"hi there\" admin").unwrap();
        assert_eq!(
            intent,
            CommandIntent::AddText {
                name: "greet".to_string(),
                response: "hi there".to_string(),
                admin_only: true,
            }
        );
    }

    #[test]
    fn test_parse_add_text_public() {
        let intent = parse("ADD command rules \"Be kind, no spam\"").unwrap();
        assert_eq!(
            intent,
            CommandIntent::AddText {
                name: "rules".to_string(),
                response: "Be kind, no spam".to_string(),
                admin_only: false,
            }
        );

        // Only one layer of quotes is removed.
        let intent = parse("add command quote \"\"nested\"\"").unwrap();
        assert!(matches!(intent, CommandIntent::AddText { response, .. } if response == "\"nested\""));

        // A payload that is just the word is a response, not a flag.
        let intent = parse("add command word admin").unwrap();
        assert!(matches!(
            intent,
            CommandIntent::AddText { ref response, admin_only: false, .. } if response == "admin"
        ));
    }

    #[test]
    fn test_parse_keeps_name_case() {
        let intent = parse("add textcommand Greet hello").unwrap();
        assert!(matches!(intent, CommandIntent::AddText { name, .. } if name == "Greet"));
    }

    #[test]
    fn test_parse_remove_and_role_commands() {
        assert_eq!(
            parse("remove textcommand greet").unwrap(),
            CommandIntent::RemoveText { name: "greet".to_string() }
        );
        assert_eq!(
            parse("add rolecommand welcome <@&1> <@&2>").unwrap(),
            CommandIntent::AddRole { name: "welcome".to_string() }
        );
        assert_eq!(
            parse("remove rolecommand welcome extra words").unwrap(),
            CommandIntent::RemoveRole { name: "welcome".to_string() }
        );
    }

    #[test]
    fn test_parse_admin_aliases() {
        for alias in ["su", "admin", "superuser"] {
            assert_eq!(parse(&format!("add {} <@1>", alias)).unwrap(), CommandIntent::AddAdmin);
            assert_eq!(parse(&format!("remove {}", alias)).unwrap(), CommandIntent::RemoveAdmin);
        }
    }

    #[test]
    fn test_parse_subtype_ignores_case() {
        assert_eq!(
            parse("ADD TextCommand x y").unwrap(),
            CommandIntent::AddText {
                name: "x".to_string(),
                response: "y".to_string(),
                admin_only: false,
            }
        );
        assert_eq!(
            parse("Remove RoleCommand welcome <@&3>").unwrap(),
            CommandIntent::RemoveRole { name: "welcome".to_string() }
        );
        assert_eq!(parse("add SU <@1>").unwrap(), CommandIntent::AddAdmin);
        assert_eq!(parse("remove SuperUser").unwrap(), CommandIntent::RemoveAdmin);
    }

    #[test]
    fn test_parse_list_and_invoke() {
        assert_eq!(parse("commands").unwrap(), CommandIntent::List);
        assert_eq!(parse("Commands please").unwrap(), CommandIntent::List);
        assert_eq!(
            parse("Welcome to the server").unwrap(),
            CommandIntent::Invoke { name: "welcome".to_string() }
        );
    }

    #[test]
    fn test_parse_malformed() {
        for text in [
            "",
            "add",
            "add widget foo",
            "add textcommand",
            "add textcommand greet",
            "add textcommand greet \"\"",
            "add textcommand greet \"\" admin",
            "remove textcommand",
            "remove textcommand greet extra",
            "add rolecommand",
        ] {
            let result = parse(text);
            assert!(
                matches!(result, Err(Error::MalformedCommand(_))),
                "expected malformed for {:?}, got {:?}",
                text,
                result
            );
        }
    }

    #[test]
    fn test_builtins() {
        assert!(is_admin_command("remove"));
        assert!(!is_admin_command("commands"));
        assert_eq!(command_word("  ADD su"), "add");
        assert_eq!(command_word(""), "");
    }
}
