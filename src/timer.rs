// src/timer.rs - Single-shot timer feeding an actor queue
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// One-shot delayed message delivery into an actor's queue.
///
/// At most one fire is ever pending: arming cancels the previous one. The
/// timer never touches actor state - expiry only enqueues a message, so
/// there is no race between expiry and in-progress message handling.
#[derive(Debug)]
pub struct Timer<M> {
    tx: UnboundedSender<M>,
    pending: Option<JoinHandle<()>>,
}

impl<M: Send + 'static> Timer<M> {
    pub fn new(tx: UnboundedSender<M>) -> Self {
        Self { tx, pending: None }
    }

    /// Arm the timer. Any previously pending fire is cancelled first.
    pub fn start(&mut self, interval: Duration, msg: M) {
        self.stop();
        let tx = self.tx.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            // The receiver being gone just means the actor shut down.
            let _ = tx.send(msg);
        }));
    }

    /// Cancel the pending fire, if any.
    pub fn stop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl<M> Drop for Timer<M> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}
