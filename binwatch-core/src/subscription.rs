//! Scoped subscription resource over a bin-change channel.

use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::model::BinEvent;

/// Handle to a running change listener.
///
/// The subscription is released exactly once, when the handle drops, no
/// matter how the owning scope exits. Console views hold one of these while
/// they are on screen and simply let it fall out of scope on navigation.
#[derive(Debug)]
pub struct ChangeListener {
    task: JoinHandle<()>,
}

impl ChangeListener {
    /// Spawn a listener task that forwards every event to `callback`.
    ///
    /// A receiver that lags behind the channel has missed events; it gets a
    /// single [`BinEvent::Resync`] instead so consumers reload their view.
    #[must_use]
    pub fn spawn<F>(mut receiver: Receiver<BinEvent>, mut callback: F) -> Self
    where
        F: FnMut(BinEvent) + Send + 'static,
    {
        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => callback(event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "change listener lagged, requesting resync");
                        callback(BinEvent::Resync);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Self { task }
    }

    /// Release the subscription now instead of at end of scope.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for ChangeListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}
