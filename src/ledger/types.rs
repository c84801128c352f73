use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Network the backend program is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
  Localnet,
  Devnet,
  Mainnet,
}

impl Network {
  pub fn as_str(&self) -> &'static str {
    match self {
      Network::Localnet => "localnet",
      Network::Devnet => "devnet",
      Network::Mainnet => "mainnet",
    }
  }
}

impl fmt::Display for Network {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl std::str::FromStr for Network {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "localnet" => Ok(Network::Localnet),
      "devnet" => Ok(Network::Devnet),
      "mainnet" => Ok(Network::Mainnet),
      other => Err(format!(
        "unknown network '{}' (expected localnet, devnet, or mainnet)",
        other
      )),
    }
  }
}

/// Account address on the ledger, hex-rendered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
  pub fn new(raw: impl Into<String>) -> Self {
    Self(raw.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Address {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Identity of a signing client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
  pub fn new(raw: impl Into<String>) -> Self {
    Self(raw.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Identity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Confirmation identifier returned once a submitted operation is durably
/// settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
  pub fn new(raw: impl Into<String>) -> Self {
    Self(raw.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Signature {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Raw account state as returned by the ledger reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
  pub address: Address,
  /// Program that owns the account.
  pub program: Address,
  pub executable: bool,
  /// JSON-parsed account payload.
  pub data: serde_json::Value,
}

/// Derive the address of a record account from its addressing seeds.
///
/// The backend derives record accounts from the entry title and the owner
/// identity under its program address, so update/delete must carry the
/// record's exact current title; a renamed title addresses a different
/// account entirely.
pub fn derive_record_address(program: &Address, owner: &Identity, title: &str) -> Address {
  let mut hasher = Sha256::new();
  hasher.update(b"journal-entry");
  hasher.update(program.as_str().as_bytes());
  hasher.update(owner.as_str().as_bytes());
  hasher.update(title.as_bytes());
  Address(hex::encode(hasher.finalize()))
}
