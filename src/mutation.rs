//! Observable lifecycle for record-mutating operations.
//!
//! A [`Mutation`] wraps one operation from trigger to durable settlement:
//!
//! ```ignore
//! let mut mutation = directory.create_record(network, title, message, owner);
//!
//! // Trigger submission (no-op while a submission is pending)
//! mutation.submit();
//!
//! // Either poll from an event loop...
//! if mutation.poll() {
//!     match mutation.state() {
//!         MutationState::Settled(sig) => render_signature(sig),
//!         MutationState::Failed(err) => render_error(err),
//!         _ => {}
//!     }
//! }
//!
//! // ...or wait for settlement.
//! let state = mutation.settled().await;
//! ```
//!
//! The operation runs in its own task. Dropping the handle abandons
//! observation, not the operation: a submitted operation cannot be
//! withdrawn, so it still settles out-of-band and its settlement side
//! effects (notification, cache refresh) still run, exactly once.

use std::future::Future;

use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::error::JournalError;
use crate::ledger::types::Signature;

/// The state of a mutation.
#[derive(Debug, Clone)]
pub enum MutationState {
  /// Not yet submitted.
  Idle,
  /// Submitted, awaiting durable settlement.
  Pending,
  /// Durably settled; carries the transaction signature.
  Settled(Signature),
  /// Settled into failure; carries the user-facing error text. Nothing
  /// retries automatically; re-invoke the operation to try again.
  Failed(String),
}

impl MutationState {
  pub fn is_pending(&self) -> bool {
    matches!(self, MutationState::Pending)
  }

  pub fn is_settled(&self) -> bool {
    matches!(self, MutationState::Settled(_))
  }

  pub fn is_failed(&self) -> bool {
    matches!(self, MutationState::Failed(_))
  }

  pub fn signature(&self) -> Option<&Signature> {
    match self {
      MutationState::Settled(sig) => Some(sig),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      MutationState::Failed(err) => Some(err),
      _ => None,
    }
  }
}

type OpFuture = BoxFuture<'static, Result<Signature, JournalError>>;

/// Handle observing one operation's path through
/// `Idle -> Pending -> {Settled, Failed}`.
pub struct Mutation {
  state: MutationState,
  op: Option<Box<dyn FnOnce() -> OpFuture + Send>>,
  receiver: Option<mpsc::UnboundedReceiver<Result<Signature, JournalError>>>,
}

impl Mutation {
  /// Wrap an operation without submitting it.
  pub(crate) fn new<F, Fut>(op: F) -> Self
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Signature, JournalError>> + Send + 'static,
  {
    Self {
      state: MutationState::Idle,
      op: Some(Box::new(move || Box::pin(op()))),
      receiver: None,
    }
  }

  pub fn state(&self) -> &MutationState {
    &self.state
  }

  pub fn is_pending(&self) -> bool {
    self.state.is_pending()
  }

  /// Submit the operation.
  ///
  /// No-op while a submission is pending or once the mutation has settled;
  /// a settled-into-failure mutation is retried by invoking the directory
  /// or session operation again, not by resubmitting this handle.
  pub fn submit(&mut self) {
    if self.state.is_pending() {
      return;
    }
    let Some(op) = self.op.take() else {
      return;
    };

    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = MutationState::Pending;

    tokio::spawn(async move {
      let result = op().await;
      // The observer may be gone; the operation itself already settled and
      // its side effects ran above.
      let _ = tx.send(result);
    });
  }

  /// Poll for settlement without blocking.
  ///
  /// Returns `true` when the state changed. Call from an event-loop tick.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(result) => {
        self.state = settle(result);
        self.receiver = None;
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        self.state = MutationState::Failed("operation task stopped before settling".to_string());
        self.receiver = None;
        true
      }
    }
  }

  /// Wait until the mutation settles and return the final state.
  pub async fn settled(mut self) -> MutationState {
    if let Some(mut rx) = self.receiver.take() {
      self.state = match rx.recv().await {
        Some(result) => settle(result),
        None => MutationState::Failed("operation task stopped before settling".to_string()),
      };
    }
    self.state
  }
}

fn settle(result: Result<Signature, JournalError>) -> MutationState {
  match result {
    Ok(sig) => MutationState::Settled(sig),
    Err(err) => MutationState::Failed(err.to_string()),
  }
}

impl std::fmt::Debug for Mutation {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Mutation")
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}
