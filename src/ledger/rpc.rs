//! Ledger RPC boundary: account reads plus operation submission.
//!
//! The ledger is an opaque collaborator reachable through three effectful
//! shapes: fetch one account, fetch a program's accounts, submit a signed
//! operation. Everything above this trait is transport-agnostic; tests run
//! against an in-memory fake.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::JournalError;

use super::ops::OperationDescriptor;
use super::types::{AccountInfo, Address, Signature};

#[async_trait]
pub trait LedgerRpc: Send + Sync {
  /// Fetch the account at `address`, or `None` when the ledger has no
  /// account there. Absence is a normal outcome, not an error.
  async fn get_account(&self, address: &Address) -> Result<Option<AccountInfo>, JournalError>;

  /// Fetch every account owned by `program`.
  async fn get_program_accounts(
    &self,
    program: &Address,
  ) -> Result<Vec<AccountInfo>, JournalError>;

  /// Sign and submit an operation. Resolves only once the operation is
  /// durably settled; the returned signature is the confirmation.
  async fn submit(&self, op: &OperationDescriptor) -> Result<Signature, JournalError>;
}

/// JSON-RPC 2.0 client over HTTP.
pub struct HttpLedgerRpc {
  http: reqwest::Client,
  endpoint: url::Url,
}

impl HttpLedgerRpc {
  pub fn new(endpoint: &str) -> Result<Self, JournalError> {
    let endpoint = url::Url::parse(endpoint)
      .map_err(|e| JournalError::Config(format!("invalid rpc url {}: {}", endpoint, e)))?;

    Ok(Self {
      http: reqwest::Client::new(),
      endpoint,
    })
  }

  async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, JournalError> {
    let body = json!({
      "jsonrpc": "2.0",
      "id": 1,
      "method": method,
      "params": params,
    });

    let response = self
      .http
      .post(self.endpoint.clone())
      .json(&body)
      .send()
      .await
      .map_err(JournalError::rpc)?;

    let response: RpcResponse<T> = response.json().await.map_err(JournalError::rpc)?;

    if let Some(err) = response.error {
      return Err(JournalError::Rpc(format!(
        "{} (code {})",
        err.message, err.code
      )));
    }

    response
      .result
      .ok_or_else(|| JournalError::Rpc(format!("empty response for {}", method)))
  }
}

#[async_trait]
impl LedgerRpc for HttpLedgerRpc {
  async fn get_account(&self, address: &Address) -> Result<Option<AccountInfo>, JournalError> {
    // `value` is null when no account exists at the address.
    let response: GetAccountResponse = self.call("getAccountInfo", json!([address])).await?;

    Ok(response.value.map(|raw| raw.into_info(address.clone())))
  }

  async fn get_program_accounts(
    &self,
    program: &Address,
  ) -> Result<Vec<AccountInfo>, JournalError> {
    let response: Vec<KeyedAccount> = self.call("getProgramAccounts", json!([program])).await?;

    Ok(
      response
        .into_iter()
        .map(|keyed| keyed.account.into_info(keyed.address))
        .collect(),
    )
  }

  async fn submit(&self, op: &OperationDescriptor) -> Result<Signature, JournalError> {
    self.call("submitOperation", json!([op])).await
  }
}

#[derive(Deserialize)]
struct RpcResponse<T> {
  result: Option<T>,
  error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
  code: i64,
  message: String,
}

#[derive(Deserialize)]
struct GetAccountResponse {
  value: Option<RawAccount>,
}

#[derive(Deserialize)]
struct KeyedAccount {
  address: Address,
  account: RawAccount,
}

#[derive(Deserialize)]
struct RawAccount {
  program: Address,
  #[serde(default)]
  executable: bool,
  data: Value,
}

impl RawAccount {
  fn into_info(self, address: Address) -> AccountInfo {
    AccountInfo {
      address,
      program: self.program,
      executable: self.executable,
      data: self.data,
    }
  }
}

#[cfg(test)]
pub(crate) mod testing {
  //! In-memory ledger implementing the real backend's record semantics:
  //! accounts derived from (program, owner, title), create-only-once,
  //! update/delete against the derived address.

  use std::collections::HashMap;
  use std::sync::{Arc, Mutex};

  use serde_json::json;

  use crate::error::JournalError;
  use crate::ledger::ops::{Instruction, OperationDescriptor};
  use crate::ledger::types::{derive_record_address, AccountInfo, Address, Identity, Signature};

  use super::*;

  #[derive(Default)]
  struct FakeState {
    accounts: HashMap<Address, AccountInfo>,
    next_sig: u64,
    program_account_calls: u64,
    fail_reads: bool,
    fail_submits: bool,
    submitted: Vec<OperationDescriptor>,
  }

  #[derive(Default)]
  pub(crate) struct FakeLedger {
    state: Mutex<FakeState>,
  }

  impl FakeLedger {
    pub fn new() -> Arc<Self> {
      Arc::new(Self::default())
    }

    /// Place an executable account at `program`, as a deployment would.
    pub fn deploy(&self, program: &Address) {
      let mut state = self.state.lock().unwrap();
      state.accounts.insert(
        program.clone(),
        AccountInfo {
          address: program.clone(),
          program: Address::new("loader"),
          executable: true,
          data: json!({}),
        },
      );
    }

    pub fn set_fail_reads(&self, fail: bool) {
      self.state.lock().unwrap().fail_reads = fail;
    }

    pub fn set_fail_submits(&self, fail: bool) {
      self.state.lock().unwrap().fail_submits = fail;
    }

    /// How many times the full collection was fetched.
    pub fn program_account_calls(&self) -> u64 {
      self.state.lock().unwrap().program_account_calls
    }

    pub fn submitted_count(&self) -> usize {
      self.state.lock().unwrap().submitted.len()
    }

    /// Place a record account directly, as a previously settled create
    /// would have left it. Bypasses the submit path so it is not counted
    /// as a submitted operation.
    pub fn seed_record(
      &self,
      program: &Address,
      owner: &Identity,
      title: &str,
      message: &str,
    ) -> Address {
      let address = derive_record_address(program, owner, title);
      let mut state = self.state.lock().unwrap();
      state.accounts.insert(
        address.clone(),
        AccountInfo {
          address: address.clone(),
          program: program.clone(),
          executable: false,
          data: json!({
            "title": title,
            "message": message,
            "owner": owner,
          }),
        },
      );
      address
    }
  }

  #[async_trait]
  impl LedgerRpc for FakeLedger {
    async fn get_account(&self, address: &Address) -> Result<Option<AccountInfo>, JournalError> {
      let state = self.state.lock().unwrap();
      if state.fail_reads {
        return Err(JournalError::Rpc("connection refused".into()));
      }
      Ok(state.accounts.get(address).cloned())
    }

    async fn get_program_accounts(
      &self,
      program: &Address,
    ) -> Result<Vec<AccountInfo>, JournalError> {
      let mut state = self.state.lock().unwrap();
      state.program_account_calls += 1;
      if state.fail_reads {
        return Err(JournalError::Rpc("connection refused".into()));
      }
      Ok(
        state
          .accounts
          .values()
          .filter(|a| a.program == *program && !a.executable)
          .cloned()
          .collect(),
      )
    }

    async fn submit(&self, op: &OperationDescriptor) -> Result<Signature, JournalError> {
      let mut state = self.state.lock().unwrap();
      if state.fail_submits {
        return Err(JournalError::Rpc("submission rejected".into()));
      }
      state.submitted.push(op.clone());

      match &op.instruction {
        Instruction::CreateEntry { title, message } => {
          let address = derive_record_address(&op.program, &op.signer, title);
          if state.accounts.contains_key(&address) {
            return Err(JournalError::Rpc(format!("account {} already in use", address)));
          }
          state.accounts.insert(
            address.clone(),
            AccountInfo {
              address,
              program: op.program.clone(),
              executable: false,
              data: json!({
                "title": title,
                "message": message,
                "owner": op.signer,
              }),
            },
          );
        }
        Instruction::UpdateEntry { title, message } => {
          let address = derive_record_address(&op.program, &op.signer, title);
          let account = state
            .accounts
            .get_mut(&address)
            .ok_or(JournalError::NotFound { address })?;
          if let Some(data) = account.data.as_object_mut() {
            data.insert("message".into(), json!(message));
          }
        }
        Instruction::DeleteEntry { title } => {
          let address = derive_record_address(&op.program, &op.signer, title);
          if state.accounts.remove(&address).is_none() {
            return Err(JournalError::NotFound { address });
          }
        }
      }

      state.next_sig += 1;
      Ok(Signature::new(format!("fake-signature-{}", state.next_sig)))
    }
  }
}
