use evmwatch_common::error::WatcherError;
use evmwatch_common::types::PollerResult;
use tokio::sync::mpsc;

/// The Emitter's half of the rendezvous: where it publishes results and
/// errors, and where it waits for the Engine's go-ahead.
pub struct EmitterHandle {
    pub(crate) result_tx: mpsc::Sender<PollerResult>,
    pub(crate) error_tx: mpsc::Sender<WatcherError>,
    pub(crate) sync_rx: mpsc::Receiver<()>,
}

/// The Engine's half of the rendezvous.
pub struct EngineHandle {
    pub(crate) result_rx: mpsc::Receiver<PollerResult>,
    pub(crate) error_rx: mpsc::Receiver<WatcherError>,
    pub(crate) sync_tx: mpsc::Sender<()>,
}

/// `tokio::mpsc` has no true zero-capacity channel, so the rendezvous
/// the design calls for is built from capacity-1 channels: the actual
/// back-pressure is the Emitter blocking on `sync_rx.recv()` before its
/// next iteration, not the channel buffer itself.
pub fn rendezvous() -> (EmitterHandle, EngineHandle) {
    let (result_tx, result_rx) = mpsc::channel(1);
    let (error_tx, error_rx) = mpsc::channel(1);
    let (sync_tx, sync_rx) = mpsc::channel(1);

    (
        EmitterHandle {
            result_tx,
            error_tx,
            sync_rx,
        },
        EngineHandle {
            result_rx,
            error_rx,
            sync_tx,
        },
    )
}
