//! Backend handle resolution, memoized per (signer, network).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::NetworkConfig;
use crate::error::JournalError;
use crate::ledger::rpc::{HttpLedgerRpc, LedgerRpc};
use crate::ledger::types::{Address, Identity, Network};

/// Resolved backend: the program address plus the RPC client used to reach
/// it on one network.
pub struct BackendHandle {
  pub network: Network,
  pub program: Address,
  pub rpc: Arc<dyn LedgerRpc>,
}

type RpcFactory =
  dyn Fn(Network, &NetworkConfig) -> Result<Arc<dyn LedgerRpc>, JournalError> + Send + Sync;

/// Derives backend handles from configuration.
///
/// Resolution is a pure function of the network, but the handle is memoized
/// per `(signer, network)` so repeated calls return the same `Arc` identity;
/// downstream cache keys and effect dependencies rely on that stability.
pub struct BackendResolver {
  signer: Identity,
  networks: HashMap<Network, NetworkConfig>,
  factory: Box<RpcFactory>,
  handles: Mutex<HashMap<(Identity, Network), Arc<BackendHandle>>>,
}

impl BackendResolver {
  pub fn new(signer: Identity, networks: HashMap<Network, NetworkConfig>) -> Self {
    Self::with_rpc_factory(
      signer,
      networks,
      Box::new(|_, config| {
        let rpc: Arc<dyn LedgerRpc> = Arc::new(HttpLedgerRpc::new(&config.rpc_url)?);
        Ok(rpc)
      }),
    )
  }

  pub(crate) fn with_rpc_factory(
    signer: Identity,
    networks: HashMap<Network, NetworkConfig>,
    factory: Box<RpcFactory>,
  ) -> Self {
    Self {
      signer,
      networks,
      factory,
      handles: Mutex::new(HashMap::new()),
    }
  }

  /// The identity operations are signed with.
  pub fn signer(&self) -> &Identity {
    &self.signer
  }

  /// Resolve the backend handle for `network`.
  pub fn resolve(&self, network: Network) -> Result<Arc<BackendHandle>, JournalError> {
    let memo_key = (self.signer.clone(), network);

    let mut handles = self
      .handles
      .lock()
      .map_err(|e| JournalError::Cache(format!("lock poisoned: {}", e)))?;

    if let Some(handle) = handles.get(&memo_key) {
      return Ok(Arc::clone(handle));
    }

    let config = self.networks.get(&network).ok_or_else(|| {
      JournalError::Config(format!("network {} is not configured", network))
    })?;

    let handle = Arc::new(BackendHandle {
      network,
      program: config.program_address.clone(),
      rpc: (self.factory)(network, config)?,
    });
    handles.insert(memo_key, Arc::clone(&handle));

    Ok(handle)
  }
}
