//! User-visible notification channel for settled operations.
//!
//! Fire-and-forget: the sync layer pushes one notification per settlement
//! (the signature on success, a message bound to the action on failure) and
//! never consumes a return value.

use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
  Success,
  Error,
}

/// Notification sink. Implementations must not block.
pub trait Notifier: Send + Sync {
  fn notify(&self, kind: NotifyKind, text: &str);
}

/// Routes notifications into the tracing stream.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
  fn notify(&self, kind: NotifyKind, text: &str) {
    match kind {
      NotifyKind::Success => info!(target: "jotter::notify", "{}", text),
      NotifyKind::Error => error!(target: "jotter::notify", "{}", text),
    }
  }
}

/// Prints notifications for interactive runs, mirroring them into tracing.
#[derive(Debug, Default)]
pub struct StdoutNotifier {
  inner: TracingNotifier,
}

impl Notifier for StdoutNotifier {
  fn notify(&self, kind: NotifyKind, text: &str) {
    match kind {
      NotifyKind::Success => println!("✓ {}", text),
      NotifyKind::Error => eprintln!("✗ {}", text),
    }
    self.inner.notify(kind, text);
  }
}

#[cfg(test)]
pub(crate) mod testing {
  use std::sync::Mutex;

  use super::*;

  /// Records notifications for assertions.
  #[derive(Default)]
  pub(crate) struct RecordingNotifier {
    events: Mutex<Vec<(NotifyKind, String)>>,
  }

  impl RecordingNotifier {
    pub fn taken(&self) -> Vec<(NotifyKind, String)> {
      std::mem::take(&mut *self.events.lock().unwrap())
    }
  }

  impl Notifier for RecordingNotifier {
    fn notify(&self, kind: NotifyKind, text: &str) {
      self.events.lock().unwrap().push((kind, text.to_string()));
    }
  }
}
