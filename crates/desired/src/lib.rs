//! # Desired
//!
//! The users, groups and memberships an administrator wants on the host.
//!
//! This crate provides:
//! - The [`DesiredState`] contract consumed by the reconciliation engine
//! - [`Store`], a SQLite implementation of it with CRUD helpers
//!
//! IDs are optional: a record without a UID or GID lets the OS choose one,
//! which is then learned back through [`DesiredState::update_group_gid`]
//! and [`DesiredState::update_user_ids`].
//!
//! ## Example
//!
//! ```no_run
//! use desired::{DesiredGroup, DesiredState, DesiredUser, Store};
//! use std::path::Path;
//!
//! let mut store = Store::open(Path::new("/data/app.db"))?;
//! store.upsert_group(&DesiredGroup::new("eltern"))?;
//! store.upsert_user(&DesiredUser::new("vater").with_uid(1000))?;
//! store.set_user_groups("vater", &["eltern".to_string()])?;
//!
//! for group in store.list_groups()? {
//!     println!("{} gid={:?}", group.name, group.gid);
//! }
//! # Ok::<(), desired::Error>(())
//! ```

mod error;
mod types;

pub use error::{Error, Result};
pub use types::{DesiredGroup, DesiredMembership, DesiredUser};

use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::time::Duration;

/// How long a writer waits for a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        name TEXT PRIMARY KEY,
        uid INTEGER NULL,
        gid INTEGER NULL,
        created_at TEXT DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS groups (
        name TEXT PRIMARY KEY,
        gid INTEGER NULL,
        created_at TEXT DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS user_groups (
        user_name TEXT NOT NULL,
        group_name TEXT NOT NULL,
        PRIMARY KEY (user_name, group_name),
        FOREIGN KEY (user_name) REFERENCES users(name) ON DELETE CASCADE,
        FOREIGN KEY (group_name) REFERENCES groups(name) ON DELETE CASCADE
    );
";

/// Read and learn-back access to desired identity state.
///
/// Lists are ordered by name (memberships by user, then group).
pub trait DesiredState {
    /// All desired groups.
    fn list_groups(&self) -> Result<Vec<DesiredGroup>>;

    /// All desired users.
    fn list_users(&self) -> Result<Vec<DesiredUser>>;

    /// All desired supplementary memberships.
    fn list_memberships(&self) -> Result<Vec<DesiredMembership>>;

    /// Record the GID the OS assigned to a group.
    fn update_group_gid(&self, name: &str, gid: u32) -> Result<()>;

    /// Record the UID and primary GID of a user.
    fn update_user_ids(&self, name: &str, uid: u32, gid: u32) -> Result<()>;
}

/// SQLite-backed desired state
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create the store at the given path
    ///
    /// Creates the parent directory and the tables if they don't exist.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        Self::init(Connection::open(db_path)?)
    }

    /// Open a private in-memory store
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    // =========================================================================
    // Groups
    // =========================================================================

    /// Insert a group or replace its GID
    pub fn upsert_group(&self, group: &DesiredGroup) -> Result<()> {
        self.conn.execute(
            "INSERT INTO groups (name, gid) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET gid = excluded.gid",
            params![group.name, group.gid],
        )?;
        Ok(())
    }

    /// Delete a group and its memberships
    pub fn delete_group(&self, name: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM groups WHERE name = ?1", [name])?;
        Ok(())
    }

    pub fn get_group(&self, name: &str) -> Result<Option<DesiredGroup>> {
        let group = self
            .conn
            .query_row(
                "SELECT name, gid FROM groups WHERE name = ?1",
                [name],
                |row| {
                    Ok(DesiredGroup {
                        name: row.get(0)?,
                        gid: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(group)
    }

    /// Number of users assigned to a group
    pub fn count_group_assignments(&self, group: &str) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM user_groups WHERE group_name = ?1",
            [group],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert a user or replace its IDs
    pub fn upsert_user(&self, user: &DesiredUser) -> Result<()> {
        self.conn.execute(
            "INSERT INTO users (name, uid, gid) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET uid = excluded.uid, gid = excluded.gid",
            params![user.name, user.uid, user.gid],
        )?;
        Ok(())
    }

    /// Delete a user and its memberships
    pub fn delete_user(&self, name: &str) -> Result<()> {
        self.conn.execute("DELETE FROM users WHERE name = ?1", [name])?;
        Ok(())
    }

    pub fn get_user(&self, name: &str) -> Result<Option<DesiredUser>> {
        let user = self
            .conn
            .query_row(
                "SELECT name, uid, gid FROM users WHERE name = ?1",
                [name],
                |row| {
                    Ok(DesiredUser {
                        name: row.get(0)?,
                        uid: row.get(1)?,
                        gid: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    // =========================================================================
    // Memberships
    // =========================================================================

    /// Group names a user is assigned to, sorted
    pub fn list_user_groups(&self, user: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT group_name FROM user_groups WHERE user_name = ?1 ORDER BY group_name",
        )?;
        let groups = stmt
            .query_map([user], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(groups)
    }

    /// Replace all group assignments of a user in one transaction
    ///
    /// Both the user and every group must already exist.
    pub fn set_user_groups(&mut self, user: &str, groups: &[String]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM user_groups WHERE user_name = ?1", [user])?;
        {
            let mut insert = tx.prepare(
                "INSERT OR IGNORE INTO user_groups (user_name, group_name) VALUES (?1, ?2)",
            )?;
            for group in groups {
                insert.execute(params![user, group])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl DesiredState for Store {
    fn list_groups(&self) -> Result<Vec<DesiredGroup>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, gid FROM groups ORDER BY name")?;
        let groups = stmt
            .query_map([], |row| {
                Ok(DesiredGroup {
                    name: row.get(0)?,
                    gid: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(groups)
    }

    fn list_users(&self) -> Result<Vec<DesiredUser>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, uid, gid FROM users ORDER BY name")?;
        let users = stmt
            .query_map([], |row| {
                Ok(DesiredUser {
                    name: row.get(0)?,
                    uid: row.get(1)?,
                    gid: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    fn list_memberships(&self) -> Result<Vec<DesiredMembership>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_name, group_name FROM user_groups ORDER BY user_name, group_name",
        )?;
        let memberships = stmt
            .query_map([], |row| {
                Ok(DesiredMembership {
                    user: row.get(0)?,
                    group: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(memberships)
    }

    fn update_group_gid(&self, name: &str, gid: u32) -> Result<()> {
        self.conn.execute(
            "UPDATE groups SET gid = ?1 WHERE name = ?2",
            params![gid, name],
        )?;
        Ok(())
    }

    fn update_user_ids(&self, name: &str, uid: u32, gid: u32) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET uid = ?1, gid = ?2 WHERE name = ?3",
            params![uid, gid, name],
        )?;
        Ok(())
    }
}
