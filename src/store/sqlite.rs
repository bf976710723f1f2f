//! SQLite-backed command store for admins, text commands and role commands.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, Transaction};

use crate::error::{Error, Result};

use super::types::{is_builtin, Entity, RoleCommand, RoleId, StoreSnapshot, TextCommand, UserId};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS admins (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL UNIQUE
    );
    CREATE TABLE IF NOT EXISTS text_commands (
        id INTEGER PRIMARY KEY,
        command_name TEXT NOT NULL UNIQUE,
        response TEXT NOT NULL,
        admin INTEGER NOT NULL DEFAULT 0
    );
    CREATE TABLE IF NOT EXISTS role_commands (
        id INTEGER PRIMARY KEY,
        command_name TEXT NOT NULL UNIQUE
    );
    CREATE TABLE IF NOT EXISTS role_grants (
        id INTEGER PRIMARY KEY,
        role_id INTEGER NOT NULL UNIQUE,
        role_command_id INTEGER NOT NULL REFERENCES role_commands(id)
    );
    CREATE INDEX IF NOT EXISTS idx_role_grants_command ON role_grants(role_command_id);
"#;

/// Persistent owner of the admin, text command and role command collections.
///
/// Holds a single long-lived connection. Every mutation runs in its own
/// transaction, so a failure partway through leaves the tables untouched.
pub struct CommandStore {
    conn: Mutex<Connection>,
    bootstrap_admin: UserId,
}

fn storage(context: &str) -> impl FnOnce(rusqlite::Error) -> Error + '_ {
    move |e| Error::StorageUnavailable(format!("sqlite {}: {}", context, e))
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        }
        _ => false,
    }
}

/// Map an insert failure, turning unique-constraint violations into `DuplicateKey`.
fn insert_error(entity: Entity, key: String, context: &str) -> impl FnOnce(rusqlite::Error) -> Error + '_ {
    move |e| {
        if is_unique_violation(&e) {
            Error::DuplicateKey(entity, key)
        } else {
            Error::StorageUnavailable(format!("sqlite {}: {}", context, e))
        }
    }
}

impl CommandStore {
    /// Open (or create) the store at `path` and make sure the bootstrap admin exists.
    pub fn open(path: &Path, bootstrap_admin: UserId) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(storage("open"))?;
        tracing::debug!("Opened command store at {}", path.display());
        Self::init(conn, bootstrap_admin)
    }

    /// Open a private in-memory store.
    pub fn open_in_memory(bootstrap_admin: UserId) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage("open"))?;
        Self::init(conn, bootstrap_admin)
    }

    fn init(mut conn: Connection, bootstrap_admin: UserId) -> Result<Self> {
        let tx = conn.transaction().map_err(storage("begin init"))?;
        tx.execute_batch(SCHEMA).map_err(storage("init schema"))?;
        tx.execute(
            "INSERT OR IGNORE INTO admins (user_id) VALUES (?1)",
            params![bootstrap_admin.0],
        )
        .map_err(storage("seed bootstrap admin"))?;
        tx.commit().map_err(storage("commit init"))?;

        // Pragmas are ignored inside a transaction.
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(storage("enable foreign keys"))?;

        Ok(Self {
            conn: Mutex::new(conn),
            bootstrap_admin,
        })
    }

    /// Flush and close the underlying connection.
    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| Error::StorageUnavailable("connection lock poisoned".to_string()))?;
        conn.close().map_err(|(_, e)| storage("close")(e))?;
        tracing::debug!("Closed command store");
        Ok(())
    }

    /// The admin seeded at initialization.
    pub fn bootstrap_admin(&self) -> UserId {
        self.bootstrap_admin
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::StorageUnavailable("connection lock poisoned".to_string()))
    }

    // Admins

    pub fn add_admin(&self, user_id: UserId) -> Result<()> {
        self.add_admins(&[user_id])
    }

    /// Add several admins as one unit; any duplicate aborts the whole batch.
    pub fn add_admins(&self, user_ids: &[UserId]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(storage("begin add admin"))?;
        for user_id in user_ids {
            tx.execute("INSERT INTO admins (user_id) VALUES (?1)", params![user_id.0])
                .map_err(insert_error(Entity::Admin, user_id.to_string(), "insert admin"))?;
        }
        tx.commit().map_err(storage("commit add admin"))?;
        tracing::info!("Added admins {:?}", user_ids);
        Ok(())
    }

    /// Remove an admin. Absent ids are not an error.
    pub fn remove_admin(&self, user_id: UserId) -> Result<()> {
        self.remove_admins(&[user_id])
    }

    pub fn remove_admins(&self, user_ids: &[UserId]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(storage("begin remove admin"))?;
        let mut removed = 0;
        for user_id in user_ids {
            removed += tx
                .execute("DELETE FROM admins WHERE user_id = ?1", params![user_id.0])
                .map_err(storage("delete admin"))?;
        }
        tx.commit().map_err(storage("commit remove admin"))?;
        if removed > 0 {
            tracing::info!("Removed {} admin(s) from {:?}", removed, user_ids);
        }
        Ok(())
    }

    pub fn is_admin(&self, user_id: UserId) -> Result<bool> {
        let conn = self.lock()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM admins WHERE user_id = ?1",
                params![user_id.0],
                |_| Ok(()),
            )
            .optional()
            .map_err(storage("select admin"))?;
        Ok(found.is_some())
    }

    pub fn list_admins(&self) -> Result<Vec<UserId>> {
        let conn = self.lock()?;
        admins_in(&conn)
    }

    // Text commands

    pub fn add_text_command(&self, name: &str, response: &str, admin_only: bool) -> Result<()> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(Error::MalformedCommand(format!("invalid command name '{}'", name)));
        }
        if response.is_empty() {
            return Err(Error::MalformedCommand("empty response".to_string()));
        }
        if is_builtin(name) {
            return Err(Error::ReservedName(name.to_string()));
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(storage("begin add text command"))?;
        tx.execute(
            "INSERT INTO text_commands (command_name, response, admin) VALUES (?1, ?2, ?3)",
            params![name, response, admin_only],
        )
        .map_err(insert_error(Entity::TextCommand, name.to_string(), "insert text command"))?;
        tx.commit().map_err(storage("commit add text command"))?;
        tracing::info!("Added text command '{}' (admin_only={})", name, admin_only);
        Ok(())
    }

    /// Remove a text command. Absent names are not an error.
    pub fn remove_text_command(&self, name: &str) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(storage("begin remove text command"))?;
        let removed = tx
            .execute("DELETE FROM text_commands WHERE command_name = ?1", params![name])
            .map_err(storage("delete text command"))?;
        tx.commit().map_err(storage("commit remove text command"))?;
        if removed > 0 {
            tracing::info!("Removed text command '{}'", name);
        }
        Ok(())
    }

    /// Look up a text command, hiding admin-only ones unless `include_admin_only`.
    pub fn find_text_command(&self, name: &str, include_admin_only: bool) -> Result<Option<TextCommand>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT command_name, response, admin FROM text_commands
             WHERE command_name = ?1 AND (?2 OR admin = 0)",
            params![name, include_admin_only],
            |row| {
                Ok(TextCommand {
                    name: row.get(0)?,
                    response: row.get(1)?,
                    admin_only: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(storage("select text command"))
    }

    pub fn list_text_commands(&self, include_admin_only: bool) -> Result<Vec<TextCommand>> {
        let conn = self.lock()?;
        text_commands_in(&conn, include_admin_only)
    }

    // Role commands

    /// Create a role command and one grant per role, in order, as one unit.
    pub fn add_role_command(&self, name: &str, role_ids: &[RoleId]) -> Result<()> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(Error::MalformedCommand(format!("invalid command name '{}'", name)));
        }
        if role_ids.is_empty() {
            return Err(Error::MalformedCommand(format!(
                "role command '{}' needs at least one role",
                name
            )));
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(storage("begin add role command"))?;
        tx.execute(
            "INSERT INTO role_commands (command_name) VALUES (?1)",
            params![name],
        )
        .map_err(insert_error(Entity::RoleCommand, name.to_string(), "insert role command"))?;
        let command_id = tx.last_insert_rowid();

        for role_id in role_ids {
            tx.execute(
                "INSERT INTO role_grants (role_id, role_command_id) VALUES (?1, ?2)",
                params![role_id.0, command_id],
            )
            .map_err(insert_error(Entity::RoleGrant, role_id.to_string(), "insert role grant"))?;
        }
        tx.commit().map_err(storage("commit add role command"))?;
        tracing::info!("Added role command '{}' granting {:?}", name, role_ids);
        Ok(())
    }

    /// Remove a role command and its grants. Fails with `NotFound` if absent.
    pub fn remove_role_command(&self, name: &str) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(storage("begin remove role command"))?;
        let command_id = role_command_id(&tx, name)?
            .ok_or_else(|| Error::NotFound(Entity::RoleCommand, name.to_string()))?;

        // Grants first so no row ever references a missing command.
        tx.execute(
            "DELETE FROM role_grants WHERE role_command_id = ?1",
            params![command_id],
        )
        .map_err(storage("delete role grants"))?;
        tx.execute("DELETE FROM role_commands WHERE id = ?1", params![command_id])
            .map_err(storage("delete role command"))?;
        tx.commit().map_err(storage("commit remove role command"))?;
        tracing::info!("Removed role command '{}'", name);
        Ok(())
    }

    /// Roles granted by `name`, in insertion order.
    pub fn find_role_command(&self, name: &str) -> Result<Option<Vec<RoleId>>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(storage("begin find role command"))?;
        let roles = match role_command_id(&tx, name)? {
            Some(command_id) => Some(grants_for(&tx, command_id)?),
            None => None,
        };
        tx.commit().map_err(storage("commit find role command"))?;
        Ok(roles)
    }

    pub fn list_role_commands(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT command_name FROM role_commands ORDER BY id")
            .map_err(storage("prepare list role commands"))?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(storage("list role commands"))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage("read role commands"))
    }

    /// Read every table inside one transaction.
    pub fn snapshot(&self) -> Result<StoreSnapshot> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(storage("begin snapshot"))?;

        let admins = admins_in(&tx)?;
        let text_commands = text_commands_in(&tx, true)?;
        let commands: Vec<(i64, String)> = {
            let mut stmt = tx
                .prepare("SELECT id, command_name FROM role_commands ORDER BY id")
                .map_err(storage("prepare snapshot"))?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
                .map_err(storage("snapshot role commands"))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(storage("read role commands"))?
        };
        let mut role_commands = Vec::with_capacity(commands.len());
        for (command_id, name) in commands {
            role_commands.push(RoleCommand {
                name,
                roles: grants_for(&tx, command_id)?,
            });
        }
        tx.commit().map_err(storage("commit snapshot"))?;

        Ok(StoreSnapshot {
            admins,
            text_commands,
            role_commands,
        })
    }

    #[cfg(test)]
    fn grant_rows(&self) -> Result<i64> {
        let conn = self.lock()?;
        conn.query_row("SELECT COUNT(*) FROM role_grants", [], |row| row.get(0))
            .map_err(storage("count role grants"))
    }
}

fn admins_in(conn: &Connection) -> Result<Vec<UserId>> {
    let mut stmt = conn
        .prepare("SELECT user_id FROM admins ORDER BY id")
        .map_err(storage("prepare list admins"))?;
    let rows = stmt
        .query_map([], |row| row.get(0).map(UserId))
        .map_err(storage("list admins"))?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(storage("read admins"))
}

fn text_commands_in(conn: &Connection, include_admin_only: bool) -> Result<Vec<TextCommand>> {
    let mut stmt = conn
        .prepare(
            "SELECT command_name, response, admin FROM text_commands
             WHERE ?1 OR admin = 0 ORDER BY id",
        )
        .map_err(storage("prepare list text commands"))?;
    let rows = stmt
        .query_map(params![include_admin_only], |row| {
            Ok(TextCommand {
                name: row.get(0)?,
                response: row.get(1)?,
                admin_only: row.get(2)?,
            })
        })
        .map_err(storage("list text commands"))?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(storage("read text commands"))
}

fn role_command_id(tx: &Transaction<'_>, name: &str) -> Result<Option<i64>> {
    tx.query_row(
        "SELECT id FROM role_commands WHERE command_name = ?1",
        params![name],
        |row| row.get(0),
    )
    .optional()
    .map_err(storage("select role command"))
}

fn grants_for(tx: &Transaction<'_>, command_id: i64) -> Result<Vec<RoleId>> {
    let mut stmt = tx
        .prepare("SELECT role_id FROM role_grants WHERE role_command_id = ?1 ORDER BY id")
        .map_err(storage("prepare role grants"))?;
    let rows = stmt
        .query_map(params![command_id], |row| row.get(0).map(RoleId))
        .map_err(storage("select role grants"))?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(storage("read role grants"))
}
