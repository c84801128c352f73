//! Structured keys for cached views.

use sha2::{Digest, Sha256};

use crate::ledger::types::{Address, Network};

/// Key of one cached view.
///
/// Every key embeds the network it was derived against: switching networks
/// addresses a disjoint set of views, so nothing cached on one network can
/// leak into another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewKey {
  /// The full record collection on a network.
  AllRecords { network: Network },
  /// A single record by its backend-assigned identifier.
  Record { network: Network, identifier: Address },
  /// Whether the backend program exists on a network.
  BackendPresence { network: Network },
}

impl ViewKey {
  pub fn scope(&self) -> &'static str {
    match self {
      ViewKey::AllRecords { .. } => "all-records",
      ViewKey::Record { .. } => "record",
      ViewKey::BackendPresence { .. } => "backend-presence",
    }
  }

  pub fn network(&self) -> Network {
    match self {
      ViewKey::AllRecords { network }
      | ViewKey::Record { network, .. }
      | ViewKey::BackendPresence { network } => *network,
    }
  }

  /// Stable, fixed-length key for storage.
  pub fn cache_hash(&self) -> String {
    let input = match self {
      ViewKey::AllRecords { network } => format!("all-records:{}", network),
      ViewKey::Record {
        network,
        identifier,
      } => format!("record:{}:{}", network, identifier),
      ViewKey::BackendPresence { network } => format!("backend-presence:{}", network),
    };

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  /// Human-readable label for logs and store rows.
  pub fn description(&self) -> String {
    match self {
      ViewKey::AllRecords { network } => format!("all records on {}", network),
      ViewKey::Record {
        network,
        identifier,
      } => format!("record {} on {}", identifier, network),
      ViewKey::BackendPresence { network } => format!("backend presence on {}", network),
    }
  }
}

/// Pattern selecting view keys for invalidation.
#[derive(Debug, Clone)]
pub enum KeyPattern {
  /// Exactly one view.
  Key(ViewKey),
  /// Every view of one scope on one network.
  Scope {
    scope: &'static str,
    network: Network,
  },
  /// Every view on one network.
  Network(Network),
}

impl KeyPattern {
  pub fn matches(&self, key: &ViewKey) -> bool {
    match self {
      KeyPattern::Key(k) => k == key,
      KeyPattern::Scope { scope, network } => {
        key.scope() == *scope && key.network() == *network
      }
      KeyPattern::Network(network) => key.network() == *network,
    }
  }
}
