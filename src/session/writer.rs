//! Serialized trainer control writes.
//!
//! ERG writes are queued to one task and applied in order, so a slow or
//! timed-out write never holds up the training tick and a final StopErg
//! always lands after every earlier target.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::sensors::link::LinkHandle;

/// A queued control write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlWrite {
    SetTargetPower(i16),
    StopErg,
}

/// Sending side of the write queue.
#[derive(Debug, Clone)]
pub struct ControlWriter {
    tx: mpsc::UnboundedSender<ControlWrite>,
}

impl ControlWriter {
    /// Start the writer task for `link`.
    pub fn spawn(link: LinkHandle) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_writer(link, rx));
        (Self { tx }, task)
    }

    /// Queue a write. Dropped silently once the writer has exited.
    pub fn submit(&self, write: ControlWrite) {
        if self.tx.send(write).is_err() {
            tracing::warn!("Control writer closed, dropping {:?}", write);
        }
    }
}

async fn run_writer(link: LinkHandle, mut rx: mpsc::UnboundedReceiver<ControlWrite>) {
    while let Some(write) = rx.recv().await {
        let result = match write {
            ControlWrite::SetTargetPower(watts) => link.set_target_power(watts).await,
            ControlWrite::StopErg => link.stop_erg().await,
        };
        match result {
            Ok(()) => tracing::debug!("Applied {:?}", write),
            Err(e) => tracing::warn!("Control write {:?} failed: {}", write, e),
        }
    }
    tracing::debug!("Control writer exiting");
}
