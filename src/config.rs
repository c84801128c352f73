use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::JournalError;
use crate::ledger::types::{Address, Identity, Network};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Network operated on when no override is given.
  pub network: Network,
  /// Backend address and RPC endpoint per network.
  pub networks: HashMap<Network, NetworkConfig>,
  #[serde(default)]
  pub signer: SignerConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
  pub rpc_url: String,
  pub program_address: Address,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignerConfig {
  /// Identity submitted as the owner of new records.
  pub identity: Option<Identity>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Persist views across runs (SQLite) instead of keeping them in memory.
  pub persistent: bool,
  /// Minutes before a cached view is considered stale.
  pub stale_minutes: i64,
  /// Serve the previous value when a re-fetch fails instead of erroring.
  pub serve_stale_on_error: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      persistent: true,
      stale_minutes: 5,
      serve_stale_on_error: false,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./jotter.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/jotter/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self, JournalError> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(JournalError::Config(format!(
          "config file not found: {}",
          p.display()
        )));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(JournalError::Config(
        "no configuration file found. Create one at ~/.config/jotter/config.yaml".to_string(),
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("jotter.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("jotter").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self, JournalError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
      JournalError::Config(format!("failed to read config file {}: {}", path.display(), e))
    })?;

    let config: Config = serde_yaml::from_str(&contents).map_err(|e| {
      JournalError::Config(format!(
        "failed to parse config file {}: {}",
        path.display(),
        e
      ))
    })?;

    Ok(config)
  }

  /// The active signer identity.
  ///
  /// JOTTER_SIGNER overrides the configured value from the environment.
  pub fn signer_identity(&self) -> Result<Identity, JournalError> {
    if let Ok(identity) = std::env::var("JOTTER_SIGNER") {
      return Ok(Identity::new(identity));
    }

    self.signer.identity.clone().ok_or_else(|| {
      JournalError::Config(
        "no signer identity configured. Set signer.identity or the JOTTER_SIGNER environment variable.".to_string(),
      )
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SAMPLE: &str = r#"
network: devnet
networks:
  localnet:
    rpc_url: http://127.0.0.1:8899
    program_address: 11111111aaaa
  devnet:
    rpc_url: https://rpc.devnet.example.org
    program_address: 22222222bbbb
signer:
  identity: alice
cache:
  persistent: false
  stale_minutes: 2
"#;

  #[test]
  fn test_parse_sample_config() {
    let config: Config = serde_yaml::from_str(SAMPLE).unwrap();

    assert_eq!(config.network, Network::Devnet);
    assert_eq!(config.networks.len(), 2);
    assert_eq!(
      config.networks[&Network::Devnet].program_address,
      Address::new("22222222bbbb")
    );
    assert_eq!(config.signer.identity, Some(Identity::new("alice")));
    assert!(!config.cache.persistent);
    assert_eq!(config.cache.stale_minutes, 2);
    assert!(!config.cache.serve_stale_on_error);
  }

  #[test]
  fn test_cache_config_defaults() {
    let minimal = r#"
network: localnet
networks:
  localnet:
    rpc_url: http://127.0.0.1:8899
    program_address: 11111111aaaa
"#;
    let config: Config = serde_yaml::from_str(minimal).unwrap();

    assert!(config.cache.persistent);
    assert_eq!(config.cache.stale_minutes, 5);
    assert!(config.signer.identity.is_none());
  }
}
