//! Cooperative shutdown signal shared by the three worker loops (§4.10, §5).
//!
//! A `tokio::sync::watch<bool>` rather than `tokio_util::sync::CancellationToken`: the teacher
//! stack already carries `tokio`'s own sync primitives and nothing else pulls in `tokio-util`'s
//! cancellation module, so a `watch` channel gets the same "checked once per loop iteration"
//! shape without a new dependency (§9).

use tokio::sync::watch;

/// The sending half: held by whoever orchestrates worker lifetimes (the node binary's `main`).
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

/// The receiving half: held by each worker loop, polled once per iteration.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

/// Build a fresh, not-yet-signaled shutdown channel.
#[must_use]
pub fn channel() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, ShutdownSignal { rx })
}

impl ShutdownHandle {
    /// Signal every worker holding a [`ShutdownSignal`] from this channel to stop.
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

impl ShutdownSignal {
    /// Whether shutdown has been signaled. Workers check this at the top of each loop iteration.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        *self.rx.borrow()
    }
}
