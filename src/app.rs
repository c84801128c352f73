//! Thin CLI driver over the directory/session layer.
//!
//! Everything here is presentation glue: validate input, invoke one
//! operation, observe its outcome, print. The synchronization rules all
//! live below in `journal`, `cache`, and `mutation`.

use std::sync::Arc;

use chrono::Duration;
use color_eyre::eyre::eyre;
use color_eyre::Result;

use crate::cache::{MemoryStore, SqliteStore, ViewCache, ViewStore};
use crate::config::Config;
use crate::error::JournalError;
use crate::journal::directory::RecordDirectory;
use crate::journal::resolver::BackendResolver;
use crate::journal::session::RecordSession;
use crate::ledger::types::{derive_record_address, Identity, Network};
use crate::mutation::{Mutation, MutationState};
use crate::notify::StdoutNotifier;

pub struct App {
  directory: RecordDirectory,
  network: Network,
  signer: Identity,
}

impl App {
  pub fn new(config: &Config, network_override: Option<Network>) -> Result<Self> {
    let network = network_override.unwrap_or(config.network);
    let signer = config.signer_identity()?;

    let store: Arc<dyn ViewStore> = if config.cache.persistent {
      Arc::new(SqliteStore::open()?)
    } else {
      Arc::new(MemoryStore::new())
    };
    let cache = ViewCache::new(store)
      .with_stale_time(Duration::minutes(config.cache.stale_minutes))
      .with_serve_stale_on_error(config.cache.serve_stale_on_error);

    let resolver = BackendResolver::new(signer.clone(), config.networks.clone());
    let directory = RecordDirectory::new(resolver, cache, Arc::new(StdoutNotifier::default()));

    Ok(Self {
      directory,
      network,
      signer,
    })
  }

  pub async fn status(&self) -> Result<()> {
    match self.directory.check_backend_presence(self.network).await? {
      Some(info) => {
        println!(
          "backend {} is deployed on {} (owned by {})",
          info.address, self.network, info.program
        );
      }
      None => {
        // Expected on undeployed networks; informational, not an error.
        println!(
          "backend program not found on {}. Deploy it or pick another network.",
          self.network
        );
      }
    }
    Ok(())
  }

  pub async fn list(&self) -> Result<()> {
    match self.directory.list_records(self.network).await {
      Ok(records) if records.is_empty() => {
        println!("no records on {}. Create one to get started.", self.network);
      }
      Ok(records) => {
        for record in records {
          println!("{}  {}  {}", record.identifier, record.title, record.message);
        }
      }
      Err(JournalError::BackendUnavailable { .. }) => {
        println!(
          "backend program not found on {}. Deploy it or pick another network.",
          self.network
        );
      }
      Err(err) => return Err(err.into()),
    }
    Ok(())
  }

  /// Flag every cached view on the active network stale, then re-list.
  pub async fn refresh(&self) -> Result<()> {
    self.directory.invalidate_network(self.network)?;
    self.list().await
  }

  pub async fn show(&self, title: &str) -> Result<()> {
    validate_title(title)?;
    let record = self.session_for(title)?.get_record().await?;

    println!("{}", record.title);
    println!("{}", record.message);
    println!("owner: {}", record.owner);
    println!("identifier: {}", record.identifier);
    Ok(())
  }

  pub async fn create(&self, title: String, message: String, owner: Option<String>) -> Result<()> {
    validate_entry(&title, &message)?;
    let owner = owner.map(Identity::new).unwrap_or_else(|| self.signer.clone());

    let mutation = self
      .directory
      .create_record(self.network, title, message, owner);
    self.drive("create", mutation).await
  }

  pub async fn update(&self, title: String, message: String) -> Result<()> {
    validate_entry(&title, &message)?;

    let mutation = self.session_for(&title)?.update_record(title, message);
    self.drive("update", mutation).await
  }

  pub async fn delete(&self, title: String) -> Result<()> {
    validate_title(&title)?;

    let mutation = self.session_for(&title)?.delete_record(title);
    self.drive("delete", mutation).await
  }

  fn session_for(&self, title: &str) -> Result<RecordSession> {
    let handle = self.directory.resolve_backend(self.network)?;
    let identifier = derive_record_address(&handle.program, &self.signer, title);
    Ok(self.directory.session(self.network, identifier))
  }

  /// Submit and wait out one mutation. The notifier already surfaced the
  /// outcome; this only sets the exit status.
  async fn drive(&self, action: &str, mut mutation: Mutation) -> Result<()> {
    mutation.submit();
    match mutation.settled().await {
      MutationState::Settled(_) => Ok(()),
      MutationState::Failed(_) => Err(eyre!("{} did not settle cleanly", action)),
      state => Err(eyre!("{} left in unexpected state {:?}", action, state)),
    }
  }
}

fn validate_title(title: &str) -> Result<(), JournalError> {
  if title.trim().is_empty() {
    return Err(JournalError::Validation("title must not be empty".into()));
  }
  Ok(())
}

fn validate_entry(title: &str, message: &str) -> Result<(), JournalError> {
  validate_title(title)?;
  if message.trim().is_empty() {
    return Err(JournalError::Validation("message must not be empty".into()));
  }
  Ok(())
}
