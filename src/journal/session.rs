//! Record Session: reads and mutations scoped to one record identifier.

use std::sync::Arc;

use crate::cache::ViewKey;
use crate::error::JournalError;
use crate::ledger::types::{Address, Network};
use crate::mutation::Mutation;

use super::directory::JournalCore;
use super::types::Record;

/// A session over one record on one network.
///
/// Mutations address the record by its natural key, the title; the
/// backend-assigned identifier only scopes this session's cached view.
pub struct RecordSession {
  core: Arc<JournalCore>,
  network: Network,
  identifier: Address,
}

impl RecordSession {
  pub(crate) fn new(core: Arc<JournalCore>, network: Network, identifier: Address) -> Self {
    Self {
      core,
      network,
      identifier,
    }
  }

  pub fn identifier(&self) -> &Address {
    &self.identifier
  }

  pub fn network(&self) -> Network {
    self.network
  }

  /// The record's current value, served through its single-record view.
  pub async fn get_record(&self) -> Result<Record, JournalError> {
    let handle = self.core.resolver.resolve(self.network)?;
    let key = ViewKey::Record {
      network: self.network,
      identifier: self.identifier.clone(),
    };

    self
      .core
      .cache
      .read_through(&key, || self.core.fetch_record(&handle, &self.identifier))
      .await
  }

  /// Replace the record's message.
  ///
  /// `title` must still match the record's current title: it participates
  /// in the derived account address, so a stale title fails `NotFound`
  /// without touching any cached view. On settlement this session's record
  /// view and the collection view are both refreshed. Renaming is not
  /// supported; only the message is mutable in place.
  pub fn update_record(&self, title: impl Into<String>, message: impl Into<String>) -> Mutation {
    let core = Arc::clone(&self.core);
    let network = self.network;
    let identifier = self.identifier.clone();
    let title = title.into();
    let message = message.into();

    Mutation::new(move || async move { core.run_update(network, identifier, title, message).await })
  }

  /// Delete the record addressed by `title`.
  ///
  /// On settlement the collection view is refreshed so the record
  /// disappears from listings, and this session's record view is dropped.
  pub fn delete_record(&self, title: impl Into<String>) -> Mutation {
    let core = Arc::clone(&self.core);
    let network = self.network;
    let identifier = self.identifier.clone();
    let title = title.into();

    Mutation::new(move || async move { core.run_delete(network, identifier, title).await })
  }
}
