//! Record Directory: network-wide reads and record creation.

use std::sync::Arc;

use tracing::warn;

use crate::cache::{KeyPattern, ViewCache, ViewKey};
use crate::error::JournalError;
use crate::ledger::ops::{Instruction, OperationDescriptor};
use crate::ledger::types::{derive_record_address, Address, Identity, Network, Signature};
use crate::mutation::Mutation;
use crate::notify::{Notifier, NotifyKind};

use super::resolver::{BackendHandle, BackendResolver};
use super::session::RecordSession;
use super::types::{PresenceInfo, Record};

/// Shared state threaded through the directory and every session: the
/// backend resolver, the view cache, and the notification channel.
pub(crate) struct JournalCore {
  pub(crate) resolver: BackendResolver,
  pub(crate) cache: ViewCache,
  pub(crate) notifier: Arc<dyn Notifier>,
}

impl JournalCore {
  pub(crate) async fn fetch_records(
    &self,
    handle: &BackendHandle,
  ) -> Result<Vec<Record>, JournalError> {
    // Deployment check first so a missing program surfaces as
    // BackendUnavailable rather than an empty collection.
    if handle.rpc.get_account(&handle.program).await?.is_none() {
      return Err(JournalError::BackendUnavailable {
        address: handle.program.clone(),
        network: handle.network,
      });
    }

    let accounts = handle.rpc.get_program_accounts(&handle.program).await?;
    accounts.iter().map(Record::from_account).collect()
  }

  pub(crate) async fn fetch_record(
    &self,
    handle: &BackendHandle,
    identifier: &Address,
  ) -> Result<Record, JournalError> {
    let account = handle
      .rpc
      .get_account(identifier)
      .await?
      .ok_or_else(|| JournalError::NotFound {
        address: identifier.clone(),
      })?;

    Record::from_account(&account)
  }

  /// Re-fetch the collection view after a settled mutation. A failed
  /// refresh degrades to an invalidation so the next read retries.
  pub(crate) async fn refresh_collection(&self, handle: &Arc<BackendHandle>) {
    let key = ViewKey::AllRecords {
      network: handle.network,
    };

    if let Err(err) = self
      .cache
      .refresh(&key, || self.fetch_records(handle))
      .await
    {
      warn!(
        view = %key.description(),
        error = %err,
        "view refresh after settlement failed"
      );
      if let Err(err) = self.cache.invalidate(&KeyPattern::Key(key)) {
        warn!(error = %err, "failed to invalidate collection view");
      }
    }
  }

  pub(crate) async fn refresh_record(&self, handle: &Arc<BackendHandle>, identifier: &Address) {
    let key = ViewKey::Record {
      network: handle.network,
      identifier: identifier.clone(),
    };

    if let Err(err) = self
      .cache
      .refresh(&key, || self.fetch_record(handle, identifier))
      .await
    {
      warn!(
        view = %key.description(),
        error = %err,
        "view refresh after settlement failed"
      );
      if let Err(err) = self.cache.invalidate(&KeyPattern::Key(key)) {
        warn!(error = %err, "failed to invalidate record view");
      }
    }
  }

  pub(crate) async fn run_create(
    &self,
    network: Network,
    title: String,
    message: String,
    owner: Identity,
  ) -> Result<Signature, JournalError> {
    let submitted = async move {
      if owner != *self.resolver.signer() {
        return Err(JournalError::SignerMismatch {
          owner: owner.to_string(),
          signer: self.resolver.signer().to_string(),
        });
      }

      let handle = self.resolver.resolve(network)?;
      let op = OperationDescriptor {
        program: handle.program.clone(),
        signer: owner,
        instruction: Instruction::CreateEntry { title, message },
      };
      let signature = handle.rpc.submit(&op).await?;
      Ok((handle, signature))
    }
    .await;

    match submitted {
      Ok((handle, signature)) => {
        self.notifier.notify(NotifyKind::Success, signature.as_str());
        self.refresh_collection(&handle).await;
        Ok(signature)
      }
      Err(err) => {
        self
          .notifier
          .notify(NotifyKind::Error, &format!("Error creating entry: {}", err));
        Err(err)
      }
    }
  }

  pub(crate) async fn run_update(
    &self,
    network: Network,
    identifier: Address,
    title: String,
    message: String,
  ) -> Result<Signature, JournalError> {
    let submitted = async move {
      let handle = self.resolver.resolve(network)?;

      // The derived address embeds the title: a stale title resolves to a
      // missing account, so fail NotFound before submitting anything.
      let target = derive_record_address(&handle.program, self.resolver.signer(), &title);
      if handle.rpc.get_account(&target).await?.is_none() {
        return Err(JournalError::NotFound { address: target });
      }

      let op = OperationDescriptor {
        program: handle.program.clone(),
        signer: self.resolver.signer().clone(),
        instruction: Instruction::UpdateEntry { title, message },
      };
      let signature = handle.rpc.submit(&op).await?;
      Ok((handle, signature))
    }
    .await;

    match submitted {
      Ok((handle, signature)) => {
        self.notifier.notify(NotifyKind::Success, signature.as_str());
        // Refreshing only the record view would leave listings stale, so
        // both affected views refresh on settlement.
        futures::join!(
          self.refresh_record(&handle, &identifier),
          self.refresh_collection(&handle)
        );
        Ok(signature)
      }
      Err(err) => {
        self
          .notifier
          .notify(NotifyKind::Error, &format!("Error updating entry: {}", err));
        Err(err)
      }
    }
  }

  pub(crate) async fn run_delete(
    &self,
    network: Network,
    identifier: Address,
    title: String,
  ) -> Result<Signature, JournalError> {
    let submitted = async move {
      let handle = self.resolver.resolve(network)?;

      let target = derive_record_address(&handle.program, self.resolver.signer(), &title);
      if handle.rpc.get_account(&target).await?.is_none() {
        return Err(JournalError::NotFound { address: target });
      }

      let op = OperationDescriptor {
        program: handle.program.clone(),
        signer: self.resolver.signer().clone(),
        instruction: Instruction::DeleteEntry { title },
      };
      let signature = handle.rpc.submit(&op).await?;
      Ok((handle, signature))
    }
    .await;

    match submitted {
      Ok((handle, signature)) => {
        self.notifier.notify(NotifyKind::Success, signature.as_str());

        // The record is gone: drop its view so nothing serves it, then
        // refresh listings.
        let record_key = ViewKey::Record {
          network: handle.network,
          identifier,
        };
        if let Err(err) = self.cache.evict(&KeyPattern::Key(record_key)) {
          warn!(error = %err, "failed to evict deleted record view");
        }
        self.refresh_collection(&handle).await;
        Ok(signature)
      }
      Err(err) => {
        self
          .notifier
          .notify(NotifyKind::Error, &format!("Error deleting entry: {}", err));
        Err(err)
      }
    }
  }
}

/// Entry point for the whole collection on any configured network.
pub struct RecordDirectory {
  core: Arc<JournalCore>,
}

impl RecordDirectory {
  pub fn new(resolver: BackendResolver, cache: ViewCache, notifier: Arc<dyn Notifier>) -> Self {
    Self {
      core: Arc::new(JournalCore {
        resolver,
        cache,
        notifier,
      }),
    }
  }

  /// Resolve the backend handle for `network`; memoized, stable identity.
  pub fn resolve_backend(&self, network: Network) -> Result<Arc<BackendHandle>, JournalError> {
    self.core.resolver.resolve(network)
  }

  /// The current record collection on `network`, served through the
  /// collection view.
  pub async fn list_records(&self, network: Network) -> Result<Vec<Record>, JournalError> {
    let handle = self.core.resolver.resolve(network)?;
    let key = ViewKey::AllRecords { network };

    self
      .core
      .cache
      .read_through(&key, || self.core.fetch_records(&handle))
      .await
  }

  /// Whether the backend program exists on `network`. `Ok(None)` means the
  /// address has no account, which is the expected outcome on a network
  /// the program was never deployed to.
  pub async fn check_backend_presence(
    &self,
    network: Network,
  ) -> Result<Option<PresenceInfo>, JournalError> {
    let handle = self.core.resolver.resolve(network)?;
    let key = ViewKey::BackendPresence { network };

    self
      .core
      .cache
      .read_through(&key, || async move {
        let account = handle.rpc.get_account(&handle.program).await?;
        Ok(account.map(PresenceInfo::from_account))
      })
      .await
  }

  /// Flag every cached view on `network` stale, as a network or signer
  /// context change requires; subsequent reads re-fetch.
  pub fn invalidate_network(&self, network: Network) -> Result<(), JournalError> {
    self.core.cache.invalidate(&KeyPattern::Network(network))
  }

  /// Create a record owned by `owner`.
  ///
  /// Returns an idle [`Mutation`]; `submit` signs and sends the operation.
  /// Callers are expected to pass a non-empty title and message, and to
  /// keep the trigger disabled while the mutation is pending. On settlement
  /// the outcome lands on the notification channel and, on success, the
  /// collection view for `network` is refreshed exactly once; a failure
  /// leaves every cached view untouched.
  pub fn create_record(
    &self,
    network: Network,
    title: impl Into<String>,
    message: impl Into<String>,
    owner: Identity,
  ) -> Mutation {
    let core = Arc::clone(&self.core);
    let title = title.into();
    let message = message.into();

    Mutation::new(move || async move { core.run_create(network, title, message, owner).await })
  }

  /// Open a session scoped to one record identifier.
  pub fn session(&self, network: Network, identifier: Address) -> RecordSession {
    RecordSession::new(Arc::clone(&self.core), network, identifier)
  }
}

#[cfg(test)]
mod tests {
  use crate::error::JournalError;
  use crate::journal::testing::{test_journal, test_journal_undeployed, OWNER};
  use crate::ledger::types::{Identity, Network};
  use crate::notify::NotifyKind;

  #[tokio::test]
  async fn test_list_records_reads_through_the_collection_view() {
    let t = test_journal();
    t.seed_record("Day 1", "Went well").await;

    let records = t.directory.list_records(t.network).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "Day 1");
    assert_eq!(records[0].owner, Identity::new(OWNER));

    // Second read is served from cache.
    t.directory.list_records(t.network).await.unwrap();
    assert_eq!(t.ledger.program_account_calls(), 1);
  }

  #[tokio::test]
  async fn test_list_records_without_deployed_backend_fails() {
    let t = test_journal_undeployed();

    let result = t.directory.list_records(t.network).await;
    assert!(matches!(
      result,
      Err(JournalError::BackendUnavailable { .. })
    ));
  }

  #[tokio::test]
  async fn test_presence_check_reports_deployment() {
    let t = test_journal();

    let presence = t.directory.check_backend_presence(t.network).await.unwrap();
    let info = presence.expect("program is deployed");
    assert_eq!(info.address, t.program);
    assert!(info.executable);
  }

  #[tokio::test]
  async fn test_presence_check_absent_is_none_not_error() {
    let t = test_journal_undeployed();

    let presence = t.directory.check_backend_presence(t.network).await.unwrap();
    assert!(presence.is_none());
  }

  #[tokio::test]
  async fn test_create_refreshes_collection_exactly_once() {
    let t = test_journal();

    let before = t.directory.list_records(t.network).await.unwrap();
    assert!(before.is_empty());
    assert_eq!(t.ledger.program_account_calls(), 1);

    let mut mutation =
      t.directory
        .create_record(t.network, "Day 1", "Went well", Identity::new(OWNER));
    mutation.submit();
    let state = mutation.settled().await;
    assert!(state.is_settled());

    // One forced refresh on settlement, and the next read hits the cache.
    assert_eq!(t.ledger.program_account_calls(), 2);
    let after = t.directory.list_records(t.network).await.unwrap();
    assert_eq!(after.len(), before.len() + 1);
    assert_eq!(t.ledger.program_account_calls(), 2);

    let notifications = t.notifier.taken();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].0, NotifyKind::Success);
  }

  #[tokio::test]
  async fn test_create_with_foreign_owner_fails_signer_mismatch() {
    let t = test_journal();

    let mut mutation =
      t.directory
        .create_record(t.network, "Day 1", "Went well", Identity::new("mallory"));
    mutation.submit();
    let state = mutation.settled().await;

    assert!(state.is_failed());
    assert!(state.error().unwrap().contains("does not match"));
    assert_eq!(t.ledger.submitted_count(), 0);

    let notifications = t.notifier.taken();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].0, NotifyKind::Error);
    assert!(notifications[0].1.starts_with("Error creating entry"));
  }

  #[tokio::test]
  async fn test_failed_create_leaves_collection_untouched() {
    let t = test_journal();

    t.directory.list_records(t.network).await.unwrap();
    assert_eq!(t.ledger.program_account_calls(), 1);

    t.ledger.set_fail_submits(true);
    let mut mutation =
      t.directory
        .create_record(t.network, "Day 1", "Went well", Identity::new(OWNER));
    mutation.submit();
    let state = mutation.settled().await;
    assert!(state.is_failed());

    // No refresh fired and the cached (empty) collection is still served.
    assert_eq!(t.ledger.program_account_calls(), 1);
    t.ledger.set_fail_submits(false);
    let records = t.directory.list_records(t.network).await.unwrap();
    assert!(records.is_empty());
    assert_eq!(t.ledger.program_account_calls(), 1);
  }

  #[tokio::test]
  async fn test_transport_failure_propagates_to_the_reader() {
    let t = test_journal();
    t.ledger.set_fail_reads(true);

    let result = t.directory.list_records(t.network).await;
    assert!(matches!(result, Err(JournalError::Rpc(_))));
  }

  #[tokio::test]
  async fn test_invalidate_network_forces_refetch() {
    let t = test_journal();

    t.directory.list_records(t.network).await.unwrap();
    assert_eq!(t.ledger.program_account_calls(), 1);

    t.directory.invalidate_network(t.network).unwrap();
    t.directory.list_records(t.network).await.unwrap();
    assert_eq!(t.ledger.program_account_calls(), 2);
  }

  #[tokio::test]
  async fn test_resolve_backend_is_stable_across_calls() {
    let t = test_journal();

    let a = t.directory.resolve_backend(t.network).unwrap();
    let b = t.directory.resolve_backend(t.network).unwrap();
    assert!(std::sync::Arc::ptr_eq(&a, &b));
  }

  #[tokio::test]
  async fn test_unconfigured_network_surfaces_config_error() {
    let t = test_journal();

    let result = t.directory.list_records(Network::Mainnet).await;
    assert!(matches!(result, Err(JournalError::Config(_))));
  }
}
