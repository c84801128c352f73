//! View store trait and its storage backends.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::JournalError;

use super::keys::{KeyPattern, ViewKey};

/// One stored view entry.
#[derive(Debug, Clone)]
pub struct StoredView {
  pub value: Value,
  /// Flagged entries are re-fetched on the next read regardless of age.
  pub stale: bool,
  pub cached_at: DateTime<Utc>,
}

/// Storage backend for cached views.
pub trait ViewStore: Send + Sync {
  /// Store a fresh value for `key`, replacing any previous entry and
  /// clearing its stale flag.
  fn put(&self, key: &ViewKey, value: Value) -> Result<(), JournalError>;

  /// Load the entry for `key`, stale or not.
  fn get(&self, key: &ViewKey) -> Result<Option<StoredView>, JournalError>;

  /// Flag every entry matching `pattern` as stale.
  fn mark_stale(&self, pattern: &KeyPattern) -> Result<(), JournalError>;

  /// Drop every entry matching `pattern`.
  fn remove(&self, pattern: &KeyPattern) -> Result<(), JournalError>;
}

/// Ephemeral store for single-run invocations and tests.
#[derive(Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<ViewKey, StoredView>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl ViewStore for MemoryStore {
  fn put(&self, key: &ViewKey, value: Value) -> Result<(), JournalError> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| JournalError::Cache(format!("lock poisoned: {}", e)))?;
    entries.insert(
      key.clone(),
      StoredView {
        value,
        stale: false,
        cached_at: Utc::now(),
      },
    );
    Ok(())
  }

  fn get(&self, key: &ViewKey) -> Result<Option<StoredView>, JournalError> {
    let entries = self
      .entries
      .lock()
      .map_err(|e| JournalError::Cache(format!("lock poisoned: {}", e)))?;
    Ok(entries.get(key).cloned())
  }

  fn mark_stale(&self, pattern: &KeyPattern) -> Result<(), JournalError> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| JournalError::Cache(format!("lock poisoned: {}", e)))?;
    for (key, entry) in entries.iter_mut() {
      if pattern.matches(key) {
        entry.stale = true;
      }
    }
    Ok(())
  }

  fn remove(&self, pattern: &KeyPattern) -> Result<(), JournalError> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| JournalError::Cache(format!("lock poisoned: {}", e)))?;
    entries.retain(|key, _| !pattern.matches(key));
    Ok(())
  }
}

/// Schema for the persistent view cache.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS view_cache (
    view_hash TEXT PRIMARY KEY,
    scope TEXT NOT NULL,
    network TEXT NOT NULL,
    description TEXT NOT NULL,
    data BLOB NOT NULL,
    stale INTEGER NOT NULL DEFAULT 0,
    cached_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_view_cache_scope
    ON view_cache(network, scope);
"#;

/// SQLite-backed store so views survive across runs.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open or create the store at the default location.
  pub fn open() -> Result<Self, JournalError> {
    let path = Self::default_path()?;

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| JournalError::Cache(format!("failed to create cache directory: {}", e)))?;
    }

    let conn = Connection::open(&path).map_err(|e| {
      JournalError::Cache(format!("failed to open cache at {}: {}", path.display(), e))
    })?;

    Self::from_connection(conn)
  }

  /// Open a throwaway in-memory store.
  pub fn open_in_memory() -> Result<Self, JournalError> {
    let conn = Connection::open_in_memory()
      .map_err(|e| JournalError::Cache(format!("failed to open in-memory cache: {}", e)))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self, JournalError> {
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  fn default_path() -> Result<PathBuf, JournalError> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| JournalError::Cache("could not determine data directory".into()))?;

    Ok(data_dir.join("jotter").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<(), JournalError> {
    let conn = self.lock_conn()?;
    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| JournalError::Cache(format!("failed to run cache migrations: {}", e)))?;
    Ok(())
  }

  fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, JournalError> {
    self
      .conn
      .lock()
      .map_err(|e| JournalError::Cache(format!("lock poisoned: {}", e)))
  }
}

impl ViewStore for SqliteStore {
  fn put(&self, key: &ViewKey, value: Value) -> Result<(), JournalError> {
    let conn = self.lock_conn()?;
    let data = serde_json::to_vec(&value)
      .map_err(|e| JournalError::Cache(format!("failed to serialize view: {}", e)))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO view_cache (view_hash, scope, network, description, data, stale, cached_at)
         VALUES (?, ?, ?, ?, ?, 0, datetime('now'))",
        params![
          key.cache_hash(),
          key.scope(),
          key.network().as_str(),
          key.description(),
          data
        ],
      )
      .map_err(|e| JournalError::Cache(format!("failed to store view: {}", e)))?;

    Ok(())
  }

  fn get(&self, key: &ViewKey) -> Result<Option<StoredView>, JournalError> {
    let conn = self.lock_conn()?;

    let mut stmt = conn
      .prepare("SELECT data, stale, cached_at FROM view_cache WHERE view_hash = ?")
      .map_err(|e| JournalError::Cache(format!("failed to prepare query: {}", e)))?;

    let row: Option<(Vec<u8>, bool, String)> = stmt
      .query_row(params![key.cache_hash()], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
      })
      .ok();

    match row {
      Some((data, stale, cached_at)) => {
        let value: Value = serde_json::from_slice(&data)
          .map_err(|e| JournalError::Cache(format!("failed to deserialize view: {}", e)))?;
        Ok(Some(StoredView {
          value,
          stale,
          cached_at: parse_datetime(&cached_at)?,
        }))
      }
      None => Ok(None),
    }
  }

  fn mark_stale(&self, pattern: &KeyPattern) -> Result<(), JournalError> {
    let conn = self.lock_conn()?;
    let result = match pattern {
      KeyPattern::Key(key) => conn.execute(
        "UPDATE view_cache SET stale = 1 WHERE view_hash = ?",
        params![key.cache_hash()],
      ),
      KeyPattern::Scope { scope, network } => conn.execute(
        "UPDATE view_cache SET stale = 1 WHERE scope = ? AND network = ?",
        params![scope, network.as_str()],
      ),
      KeyPattern::Network(network) => conn.execute(
        "UPDATE view_cache SET stale = 1 WHERE network = ?",
        params![network.as_str()],
      ),
    };

    result.map_err(|e| JournalError::Cache(format!("failed to mark views stale: {}", e)))?;
    Ok(())
  }

  fn remove(&self, pattern: &KeyPattern) -> Result<(), JournalError> {
    let conn = self.lock_conn()?;
    let result = match pattern {
      KeyPattern::Key(key) => conn.execute(
        "DELETE FROM view_cache WHERE view_hash = ?",
        params![key.cache_hash()],
      ),
      KeyPattern::Scope { scope, network } => conn.execute(
        "DELETE FROM view_cache WHERE scope = ? AND network = ?",
        params![scope, network.as_str()],
      ),
      KeyPattern::Network(network) => conn.execute(
        "DELETE FROM view_cache WHERE network = ?",
        params![network.as_str()],
      ),
    };

    result.map_err(|e| JournalError::Cache(format!("failed to remove views: {}", e)))?;
    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, JournalError> {
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| JournalError::Cache(format!("failed to parse datetime '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use crate::ledger::types::{Address, Network};

  use super::*;

  fn collection_key() -> ViewKey {
    ViewKey::AllRecords {
      network: Network::Localnet,
    }
  }

  fn record_key(id: &str) -> ViewKey {
    ViewKey::Record {
      network: Network::Localnet,
      identifier: Address::new(id),
    }
  }

  fn stores() -> Vec<Box<dyn ViewStore>> {
    vec![
      Box::new(MemoryStore::new()),
      Box::new(SqliteStore::open_in_memory().unwrap()),
    ]
  }

  #[test]
  fn test_put_then_get_round_trips() {
    for store in stores() {
      store.put(&collection_key(), json!([1, 2, 3])).unwrap();

      let entry = store.get(&collection_key()).unwrap().unwrap();
      assert_eq!(entry.value, json!([1, 2, 3]));
      assert!(!entry.stale);
    }
  }

  #[test]
  fn test_get_missing_returns_none() {
    for store in stores() {
      assert!(store.get(&record_key("nope")).unwrap().is_none());
    }
  }

  #[test]
  fn test_mark_stale_by_exact_key() {
    for store in stores() {
      store.put(&collection_key(), json!([])).unwrap();
      store.put(&record_key("a"), json!({})).unwrap();

      store
        .mark_stale(&KeyPattern::Key(collection_key()))
        .unwrap();

      assert!(store.get(&collection_key()).unwrap().unwrap().stale);
      assert!(!store.get(&record_key("a")).unwrap().unwrap().stale);
    }
  }

  #[test]
  fn test_mark_stale_by_scope() {
    for store in stores() {
      store.put(&collection_key(), json!([])).unwrap();
      store.put(&record_key("a"), json!({})).unwrap();
      store.put(&record_key("b"), json!({})).unwrap();

      store
        .mark_stale(&KeyPattern::Scope {
          scope: "record",
          network: Network::Localnet,
        })
        .unwrap();

      assert!(!store.get(&collection_key()).unwrap().unwrap().stale);
      assert!(store.get(&record_key("a")).unwrap().unwrap().stale);
      assert!(store.get(&record_key("b")).unwrap().unwrap().stale);
    }
  }

  #[test]
  fn test_put_clears_stale_flag() {
    for store in stores() {
      store.put(&collection_key(), json!([])).unwrap();
      store
        .mark_stale(&KeyPattern::Network(Network::Localnet))
        .unwrap();
      store.put(&collection_key(), json!([4])).unwrap();

      let entry = store.get(&collection_key()).unwrap().unwrap();
      assert!(!entry.stale);
      assert_eq!(entry.value, json!([4]));
    }
  }

  #[test]
  fn test_remove_by_pattern() {
    for store in stores() {
      store.put(&collection_key(), json!([])).unwrap();
      store.put(&record_key("a"), json!({})).unwrap();

      store.remove(&KeyPattern::Key(record_key("a"))).unwrap();

      assert!(store.get(&record_key("a")).unwrap().is_none());
      assert!(store.get(&collection_key()).unwrap().is_some());
    }
  }
}
