//! Console adapter for driving the bot from a terminal.
//!
//! Lines look like `<user_id>: <text>`, or plain text when the sender is
//! fixed. Mentions use the `<@id>` / `<@!id>` and `<@&id>` forms.

use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::Result;
use crate::store::{RoleId, UserId};

use super::dispatcher::{Dispatcher, InboundMessage, Messenger};

/// Prints replies and role grants to stdout.
pub struct ConsoleMessenger;

#[async_trait]
impl Messenger for ConsoleMessenger {
    async fn send_text(&self, text: &str) -> Result<()> {
        println!("{}", text);
        Ok(())
    }

    async fn grant_role(&self, user: UserId, role: RoleId) -> Result<()> {
        println!("[grant] role {} -> user {}", role, user);
        Ok(())
    }
}

/// Extract user and role mentions, in order of first appearance.
pub fn extract_mentions(text: &str) -> (Vec<UserId>, Vec<RoleId>) {
    let mut users = Vec::new();
    let mut roles = Vec::new();

    let re = match Regex::new(r"<@(!|&)?(\d+)>") {
        Ok(r) => r,
        Err(_) => return (users, roles),
    };

    for caps in re.captures_iter(text) {
        let Some(id) = caps.get(2).and_then(|m| m.as_str().parse::<i64>().ok()) else {
            continue;
        };
        if caps.get(1).map(|m| m.as_str()) == Some("&") {
            let role = RoleId(id);
            if !roles.contains(&role) {
                roles.push(role);
            }
        } else {
            let user = UserId(id);
            if !users.contains(&user) {
                users.push(user);
            }
        }
    }

    (users, roles)
}

/// Build a message from one console line.
pub fn parse_console_line(line: &str, sender: Option<UserId>) -> Option<InboundMessage> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (sender, text) = match sender {
        Some(sender) => (sender, line),
        None => {
            let (id, text) = line.split_once(':')?;
            (id.parse().ok()?, text.trim_start())
        }
    };

    let (mentions, role_mentions) = extract_mentions(text);
    Some(
        InboundMessage::new(sender, text)
            .with_mentions(mentions)
            .with_role_mentions(role_mentions),
    )
}

/// Read messages from stdin until EOF.
pub async fn run_console(dispatcher: &Dispatcher, sender: Option<UserId>) -> Result<()> {
    let messenger = ConsoleMessenger;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    tracing::info!("Console ready (prefix '{}')", dispatcher.prefix());

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let Some(msg) = parse_console_line(&line, sender) else {
            eprintln!("Expected '<user_id>: <message>'");
            continue;
        };
        if !dispatcher.on_message(&msg, &messenger).await? {
            tracing::debug!("Ignored message without prefix from {}", msg.sender);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_mentions() {
        let (users, roles) = extract_mentions("!!add admin <@1> <@!2> <@1> and <@&30> <@&31> <@&30>");
        assert_eq!(users, vec![UserId(1), UserId(2)]);
        assert_eq!(roles, vec![RoleId(30), RoleId(31)]);

        let (users, roles) = extract_mentions("no mentions <@abc> here");
        assert!(users.is_empty());
        assert!(roles.is_empty());
    }

    #[test]
    fn test_parse_console_line_with_sender_prefix() {
        let msg = parse_console_line("42: !!add su <@7>\n", None).unwrap();
        assert_eq!(msg.sender, UserId(42));
        assert_eq!(msg.text, "!!add su <@7>");
        assert_eq!(msg.mentions, vec![UserId(7)]);
        assert!(!msg.from_self);

        assert!(parse_console_line("!!commands", None).is_none());
        assert!(parse_console_line("bob: !!commands", None).is_none());
    }

    #[test]
    fn test_parse_console_line_with_fixed_sender() {
        let msg = parse_console_line("!!welcome: now", Some(UserId(9))).unwrap();
        assert_eq!(msg.sender, UserId(9));
        assert_eq!(msg.text, "!!welcome: now");
    }
}
