//! Harvest machinery: pacing, pooling, downloads, and the orchestrator

mod downloader;
mod orchestrator;
mod pool;
mod rate;

pub use downloader::{DownloadOutcome, FetchPipeline};
pub use orchestrator::Orchestrator;
pub use pool::SessionPool;
pub use rate::RateController;

use tokio::sync::watch;

/// Creates a linked stop handle and signal
///
/// The handle side belongs to whatever decides the run should end (a
/// Ctrl-C listener, a test); the signal side is polled by the harvest at
/// its safe points.
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopSignal { rx })
}

/// Requests a graceful stop
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }
}

/// Observes a stop request
#[derive(Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }
}
