//! View cache orchestrating staleness, refresh, and invalidation.

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

use crate::error::JournalError;

use super::keys::{KeyPattern, ViewKey};
use super::storage::ViewStore;

/// Cache of derived views keyed by [`ViewKey`].
///
/// Entries are created on first read, replaced by [`refresh`](Self::refresh)
/// after a settled mutation, and otherwise left alone until flagged by
/// [`invalidate`](Self::invalidate) or aged past the stale time. There is no
/// background revalidation.
pub struct ViewCache {
  store: Arc<dyn ViewStore>,
  /// How long before cached data is considered stale.
  stale_time: Duration,
  serve_stale_on_error: bool,
}

impl ViewCache {
  pub fn new(store: Arc<dyn ViewStore>) -> Self {
    Self {
      store,
      stale_time: Duration::minutes(5),
      serve_stale_on_error: false,
    }
  }

  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  /// Serve the previous value when a re-fetch fails instead of propagating
  /// the error. Off by default so read failures reach the caller.
  pub fn with_serve_stale_on_error(mut self, enabled: bool) -> Self {
    self.serve_stale_on_error = enabled;
    self
  }

  fn is_expired(&self, cached_at: DateTime<Utc>) -> bool {
    Utc::now() - cached_at > self.stale_time
  }

  /// Read through the cache: serve a fresh entry, otherwise fetch, store,
  /// and return.
  pub async fn read_through<T, F, Fut>(&self, key: &ViewKey, fetcher: F) -> Result<T, JournalError>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, JournalError>>,
  {
    let cached = self.store.get(key)?;

    if let Some(entry) = &cached {
      if !entry.stale && !self.is_expired(entry.cached_at) {
        return decode(key, entry.value.clone());
      }
    }

    match fetcher().await {
      Ok(value) => {
        self.store.put(key, encode(key, &value)?)?;
        Ok(value)
      }
      Err(err) => {
        if self.serve_stale_on_error {
          if let Some(entry) = cached {
            warn!(
              view = %key.description(),
              error = %err,
              "serving stale view after fetch failure"
            );
            return decode(key, entry.value);
          }
        }
        Err(err)
      }
    }
  }

  /// Force a fetch and store, bypassing any cached entry.
  pub async fn refresh<T, F, Fut>(&self, key: &ViewKey, fetcher: F) -> Result<T, JournalError>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, JournalError>>,
  {
    let value = fetcher().await?;
    self.store.put(key, encode(key, &value)?)?;
    Ok(value)
  }

  /// Flag matching entries stale; the next read re-fetches them.
  pub fn invalidate(&self, pattern: &KeyPattern) -> Result<(), JournalError> {
    self.store.mark_stale(pattern)
  }

  /// Drop matching entries entirely.
  pub fn evict(&self, pattern: &KeyPattern) -> Result<(), JournalError> {
    self.store.remove(pattern)
  }
}

impl Clone for ViewCache {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      stale_time: self.stale_time,
      serve_stale_on_error: self.serve_stale_on_error,
    }
  }
}

fn encode<T: Serialize>(key: &ViewKey, value: &T) -> Result<serde_json::Value, JournalError> {
  serde_json::to_value(value).map_err(|e| {
    JournalError::Cache(format!("failed to encode {}: {}", key.description(), e))
  })
}

fn decode<T: DeserializeOwned>(key: &ViewKey, value: serde_json::Value) -> Result<T, JournalError> {
  serde_json::from_value(value).map_err(|e| {
    JournalError::Cache(format!("failed to decode {}: {}", key.description(), e))
  })
}
