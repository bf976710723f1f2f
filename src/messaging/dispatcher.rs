//! Inbound message handling.

use async_trait::async_trait;

use crate::core::{CommandRequest, Router};
use crate::error::Result;
use crate::store::{RoleId, UserId};

/// Sent when the command store cannot be reached.
pub const STORAGE_FAILURE: &str = "Something went wrong, please try again later.";

/// A message as delivered by the chat platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender: UserId,
    /// Set for messages the bot itself sent.
    pub from_self: bool,
    pub text: String,
    pub mentions: Vec<UserId>,
    pub role_mentions: Vec<RoleId>,
}

impl InboundMessage {
    pub fn new(sender: UserId, text: &str) -> Self {
        Self {
            sender,
            from_self: false,
            text: text.to_string(),
            mentions: Vec::new(),
            role_mentions: Vec::new(),
        }
    }

    pub fn with_mentions(mut self, mentions: Vec<UserId>) -> Self {
        self.mentions = mentions;
        self
    }

    pub fn with_role_mentions(mut self, role_mentions: Vec<RoleId>) -> Self {
        self.role_mentions = role_mentions;
        self
    }
}

/// What the chat platform must be able to do for the bot.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Reply in the channel the message came from.
    async fn send_text(&self, text: &str) -> Result<()>;

    /// Give `role` to `user` in the originating server.
    async fn grant_role(&self, user: UserId, role: RoleId) -> Result<()>;
}

/// Runs prefixed messages through the router and acts on the result.
pub struct Dispatcher {
    prefix: String,
    router: Router,
}

impl Dispatcher {
    pub fn new(prefix: &str, router: Router) -> Self {
        Self {
            prefix: prefix.to_string(),
            router,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Handle one message. Returns `false` when the message was not for the bot.
    pub async fn on_message(&self, msg: &InboundMessage, messenger: &dyn Messenger) -> Result<bool> {
        if msg.from_self {
            return Ok(false);
        }
        let Some(body) = msg.text.strip_prefix(self.prefix.as_str()) else {
            return Ok(false);
        };

        let request = CommandRequest {
            sender: msg.sender,
            text: body,
            mentions: &msg.mentions,
            role_mentions: &msg.role_mentions,
        };

        let reply = match self.router.route(&request) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Failed to handle command from {}: {}", msg.sender, e);
                messenger.send_text(STORAGE_FAILURE).await?;
                return Ok(true);
            }
        };

        for grant in &reply.grants {
            if let Err(e) = messenger.grant_role(grant.user, grant.role).await {
                tracing::warn!("Failed to grant role {} to {}: {}", grant.role, grant.user, e);
            }
        }

        messenger.send_text(&reply.text).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::router::{INVALID_COMMAND, ROLES_GRANTED};
    use crate::error::Error;
    use crate::store::CommandStore;
    use std::sync::{Arc, Mutex};

    const BOOTSTRAP: UserId = UserId(1);

    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<String>>,
        granted: Mutex<Vec<(UserId, RoleId)>>,
        fail_role: Option<RoleId>,
    }

    #[async_trait]
    impl Messenger for RecordingMessenger {
        async fn send_text(&self, text: &str) -> Result<()> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn grant_role(&self, user: UserId, role: RoleId) -> Result<()> {
            if self.fail_role == Some(role) {
                return Err(Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "missing permission")));
            }
            self.granted.lock().unwrap().push((user, role));
            Ok(())
        }
    }

    fn dispatcher() -> (Dispatcher, Arc<CommandStore>) {
        let store = Arc::new(CommandStore::open_in_memory(BOOTSTRAP).unwrap());
        (Dispatcher::new("!!", Router::new(store.clone())), store)
    }

    #[tokio::test]
    async fn test_ignores_unprefixed_and_own_messages() {
        let (dispatcher, _) = dispatcher();
        let messenger = RecordingMessenger::default();

        let handled = dispatcher
            .on_message(&InboundMessage::new(UserId(5), "commands"), &messenger)
            .await
            .unwrap();
        assert!(!handled);

        let mut own = InboundMessage::new(UserId(5), "!!commands");
        own.from_self = true;
        assert!(!dispatcher.on_message(&own, &messenger).await.unwrap());

        assert!(messenger.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replies_to_prefixed_message() {
        let (dispatcher, _) = dispatcher();
        let messenger = RecordingMessenger::default();

        let handled = dispatcher
            .on_message(&InboundMessage::new(UserId(5), "!!nothing"), &messenger)
            .await
            .unwrap();
        assert!(handled);
        assert_eq!(*messenger.sent.lock().unwrap(), vec![INVALID_COMMAND.to_string()]);
    }

    #[tokio::test]
    async fn test_admin_session_end_to_end() {
        let (dispatcher, _) = dispatcher();
        let messenger = RecordingMessenger::default();

        let add = InboundMessage::new(BOOTSTRAP, "!!add rolecommand welcome <@&10> <@&11>")
            .with_role_mentions(vec![RoleId(10), RoleId(11)]);
        dispatcher.on_message(&add, &messenger).await.unwrap();

        let invoke = InboundMessage::new(UserId(5), "!!welcome");
        dispatcher.on_message(&invoke, &messenger).await.unwrap();

        assert_eq!(
            *messenger.granted.lock().unwrap(),
            vec![(UserId(5), RoleId(10)), (UserId(5), RoleId(11))]
        );
        assert_eq!(messenger.sent.lock().unwrap().last().unwrap(), ROLES_GRANTED);
    }

    #[tokio::test]
    async fn test_failed_grant_does_not_stop_others() {
        let (dispatcher, store) = dispatcher();
        store.add_role_command("welcome", &[RoleId(10), RoleId(11)]).unwrap();
        let messenger = RecordingMessenger {
            fail_role: Some(RoleId(10)),
            ..Default::default()
        };

        dispatcher
            .on_message(&InboundMessage::new(UserId(5), "!!welcome"), &messenger)
            .await
            .unwrap();

        assert_eq!(*messenger.granted.lock().unwrap(), vec![(UserId(5), RoleId(11))]);
        assert_eq!(*messenger.sent.lock().unwrap(), vec![ROLES_GRANTED.to_string()]);
    }

    struct BrokenPermissions;

    impl crate::core::PermissionResolver for BrokenPermissions {
        fn is_admin(&self, _user_id: UserId) -> Result<bool> {
            Err(Error::StorageUnavailable("disk gone".to_string()))
        }
    }

    #[tokio::test]
    async fn test_storage_failure_answers_generically() {
        let store = Arc::new(CommandStore::open_in_memory(BOOTSTRAP).unwrap());
        let router = Router::with_permissions(store, Arc::new(BrokenPermissions));
        let dispatcher = Dispatcher::new("!!", router);
        let messenger = RecordingMessenger::default();

        let handled = dispatcher
            .on_message(&InboundMessage::new(UserId(5), "!!commands"), &messenger)
            .await
            .unwrap();
        assert!(handled);
        assert_eq!(*messenger.sent.lock().unwrap(), vec![STORAGE_FAILURE.to_string()]);
    }
}
