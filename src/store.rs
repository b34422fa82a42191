use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Durable key-value storage for tokens, preferences and suppression flags.
///
/// Every key is written independently; there are no cross-key transactions.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
}

impl SqliteStore {
    pub fn open(data_dir: Option<&Path>) -> Result<Self> {
        let path = match data_dir {
            Some(dir) => dir.join("herhub.db"),
            None => Self::default_path(),
        };
        Self::open_at(path)
    }

    pub fn open_at(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory {}", parent.display()))?;
        }
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open store at {}", path.display()))?;
        let store = Self { conn, path };
        store.init()?;
        Ok(store)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn default_path() -> PathBuf {
        // XDG data directory, or the current directory when there is no home
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "herhub") {
            proj_dirs.data_dir().join("herhub.db")
        } else {
            PathBuf::from("herhub.db")
        }
    }

    fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;
        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()
            .with_context(|| format!("Failed to read key '{}'", key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
                params![key, value],
            )
            .with_context(|| format!("Failed to write key '{}'", key))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", [key])
            .with_context(|| format!("Failed to remove key '{}'", key))?;
        Ok(())
    }
}

/// Session-lived store, used in tests and for `--ephemeral` runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.items.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.items.borrow_mut().remove(key);
        Ok(())
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &S {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("herhub.db");

        {
            let store = SqliteStore::open_at(path.clone()).unwrap();
            store.set("token", "abc").unwrap();
            store.set("visited_42", "true").unwrap();
        }

        let store = SqliteStore::open_at(path).unwrap();
        assert_eq!(store.get("token").unwrap().as_deref(), Some("abc"));
        assert_eq!(store.get("visited_42").unwrap().as_deref(), Some("true"));
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn test_sqlite_store_overwrites_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(Some(dir.path())).unwrap();
        assert_eq!(store.path(), &dir.path().join("herhub.db"));

        store.set("lang", "en").unwrap();
        store.set("lang", "fr").unwrap();
        assert_eq!(store.get("lang").unwrap().as_deref(), Some("fr"));

        store.remove("lang").unwrap();
        assert_eq!(store.get("lang").unwrap(), None);
        // removing a missing key is not an error
        store.remove("lang").unwrap();
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
    }
}
