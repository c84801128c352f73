use serde::{Deserialize, Serialize};

use crate::error::JournalError;
use crate::ledger::types::{AccountInfo, Address, Identity};

/// One journal record, as materialized from its ledger account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
  /// Backend-assigned account address; stable for the record's lifetime.
  pub identifier: Address,
  /// Display label and the natural key for update/delete.
  pub title: String,
  pub message: String,
  /// Authoring client; set at creation, immutable thereafter.
  pub owner: Identity,
}

/// Payload stored in a record account.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordPayload {
  title: String,
  message: String,
  owner: Identity,
}

impl Record {
  pub(crate) fn from_account(account: &AccountInfo) -> Result<Self, JournalError> {
    let payload: RecordPayload = serde_json::from_value(account.data.clone()).map_err(|e| {
      JournalError::Rpc(format!(
        "malformed record account {}: {}",
        account.address, e
      ))
    })?;

    Ok(Self {
      identifier: account.address.clone(),
      title: payload.title,
      message: payload.message,
      owner: payload.owner,
    })
  }
}

/// What the presence check learned about the backend account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceInfo {
  pub address: Address,
  pub executable: bool,
  /// Loader that owns the backend account.
  pub program: Address,
}

impl PresenceInfo {
  pub(crate) fn from_account(account: AccountInfo) -> Self {
    Self {
      address: account.address,
      executable: account.executable,
      program: account.program,
    }
  }
}
