//! Error taxonomy for the synchronization layer.
//!
//! Read failures propagate to the caller, which renders a
//! loading/error/empty tri-state. Mutation failures are intercepted by the
//! mutation lifecycle and surface as a `Failed` state plus an error
//! notification, never as a propagated error.

use thiserror::Error;

use crate::ledger::types::{Address, Network};

#[derive(Debug, Error)]
pub enum JournalError {
  /// Transport or connectivity failure talking to the ledger RPC.
  #[error("rpc failure: {0}")]
  Rpc(String),

  /// No account exists at the derived address. Expected (not exceptional)
  /// for presence checks; a hard failure for record reads and mutations.
  #[error("no record account at {address}")]
  NotFound { address: Address },

  /// The backend program has no deployed account on the selected network.
  #[error("backend program {address} is not deployed on {network}")]
  BackendUnavailable { address: Address, network: Network },

  /// The submitted owner does not match the active signer identity.
  #[error("owner {owner} does not match the active signer {signer}")]
  SignerMismatch { owner: String, signer: String },

  /// Empty title or message, rejected before submission. Enforced by the
  /// calling layer, not by the directory/session contract.
  #[error("{0}")]
  Validation(String),

  /// The local view cache failed.
  #[error("cache failure: {0}")]
  Cache(String),

  /// Configuration is missing or unusable.
  #[error("config error: {0}")]
  Config(String),
}

impl JournalError {
  pub fn rpc(err: impl std::fmt::Display) -> Self {
    Self::Rpc(err.to_string())
  }

  pub fn cache(err: impl std::fmt::Display) -> Self {
    Self::Cache(err.to_string())
  }
}
