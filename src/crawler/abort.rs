//! Run-level abort signal
//!
//! Aborting stops further admission. Fetches already started keep running
//! in the background but their results are never dispatched.

use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable handle used by the embedding code to stop a run
#[derive(Debug, Clone)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl AbortHandle {
    /// Creates a handle and the signal the tracker listens on
    pub fn new() -> (Self, AbortSignal) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, AbortSignal { rx })
    }

    /// Requests the run to stop; later calls are no-ops
    pub fn abort(&self) {
        if !self.tx.send_replace(true) {
            tracing::info!("abort requested");
        }
    }

    /// Returns whether abort has been requested
    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }

    /// Creates another signal observing this handle
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiving side of an [`AbortHandle`]
#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        let (_, signal) = AbortHandle::new();
        signal
    }

    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once abort has been requested
    ///
    /// If every handle is dropped without aborting, this never resolves.
    pub async fn aborted(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
