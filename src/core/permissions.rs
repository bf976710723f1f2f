//! Caller classification.

use std::sync::Arc;

use crate::error::Result;
use crate::store::{CommandStore, UserId};

/// Decides whether a user may run privileged commands.
pub trait PermissionResolver: Send + Sync {
    fn is_admin(&self, user_id: UserId) -> Result<bool>;
}

/// Admin status straight from the command store's admin table.
#[derive(Clone)]
pub struct StorePermissions {
    store: Arc<CommandStore>,
}

impl StorePermissions {
    pub fn new(store: Arc<CommandStore>) -> Self {
        Self { store }
    }
}

impl PermissionResolver for StorePermissions {
    fn is_admin(&self, user_id: UserId) -> Result<bool> {
        self.store.is_admin(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_permissions_follow_admin_table() {
        let store = Arc::new(CommandStore::open_in_memory(UserId(1)).unwrap());
        let permissions = StorePermissions::new(store.clone());

        assert!(permissions.is_admin(UserId(1)).unwrap());
        assert!(!permissions.is_admin(UserId(2)).unwrap());

        store.add_admin(UserId(2)).unwrap();
        assert!(permissions.is_admin(UserId(2)).unwrap());

        store.remove_admin(UserId(2)).unwrap();
        assert!(!permissions.is_admin(UserId(2)).unwrap());
    }
}
