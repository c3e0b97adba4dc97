// meshwork - shared gRPC server/client libraries
// Copyright Meshwork, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt


use std::sync::Arc;
use tokio::sync::watch;

//
// ShutdownTriggerHandle
//

/// A non-owning handle to a shutdown trigger. Holding one does not block shutdown completion, but
/// it allows creating [`Shutdown`] watchers deep inside a component tree without circular
/// references back to the trigger.
#[derive(Clone, Debug)]
pub struct ShutdownTriggerHandle {
  draining_tx: Arc<watch::Sender<bool>>,
}

impl ShutdownTriggerHandle {
  #[must_use]
  pub fn make_shutdown(&self) -> Shutdown {
    Shutdown {
      draining_rx: self.draining_tx.subscribe(),
    }
  }
}

//
// ShutdownTrigger
//

// Owns shutdown initiation for a component and everything spawned under it.
#[derive(Debug)]
pub struct ShutdownTrigger {
  draining_tx: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownTrigger {
  fn default() -> Self {
    let (draining_tx, _) = watch::channel(false);
    Self {
      draining_tx: Arc::new(draining_tx),
    }
  }
}

impl ShutdownTrigger {
  #[must_use]
  pub fn make_handle(&self) -> ShutdownTriggerHandle {
    ShutdownTriggerHandle {
      draining_tx: self.draining_tx.clone(),
    }
  }

  #[must_use]
  pub fn make_shutdown(&self) -> Shutdown {
    Shutdown {
      draining_rx: self.draining_tx.subscribe(),
    }
  }

  // Signal shutdown and wait until every Shutdown watcher has dropped.
  pub async fn shutdown(self) {
    self.draining_tx.send_replace(true);
    self.draining_tx.closed().await;
  }
}

//
// Shutdown
//

/// A watcher held by a running component. The trigger knows the component has finished draining
/// when this drops.
#[derive(Clone, Debug)]
pub struct Shutdown {
  draining_rx: watch::Receiver<bool>,
}

impl Shutdown {
  /// Resolves once shutdown has been signaled, immediately if it already was.
  pub async fn cancelled(&mut self) {
    if *self.draining_rx.borrow_and_update() {
      return;
    }
    let _ignored = self.draining_rx.changed().await;
  }

  #[must_use]
  pub fn is_draining(&self) -> bool {
    *self.draining_rx.borrow()
  }
}
