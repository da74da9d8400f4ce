use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};

use crate::engine::StreamEngine;

/// Periodic driver for a [`StreamEngine`].
///
/// Runs the engine on a dedicated thread: one unconditional prime pass,
/// then a tick after every `check_interval`. The engine stays the single
/// mutator of streaming state, so no locks are involved; the thread only
/// suspends in the timed wait between ticks.
///
/// The loop is tied to this handle's lifetime: [`stop`](Self::stop)
/// returns the engine, and dropping the handle stops the loop before any
/// further tick fires.
pub struct StreamScheduler {
    handle: Option<JoinHandle<StreamEngine>>,
    stop_tx: Sender<()>,
}

impl StreamScheduler {
    /// Move the engine onto a new thread and start ticking it.
    pub fn spawn(mut engine: StreamEngine) -> io::Result<Self> {
        let interval = engine.config().check_interval;
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("tile-stream".into())
            .spawn(move || {
                engine.prime();
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => engine.tick(),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::debug!("stream scheduler stopped");
                engine
            })?;

        Ok(Self {
            handle: Some(handle),
            stop_tx,
        })
    }

    /// Stop the loop and get the engine back. Returns `None` if the
    /// worker thread panicked.
    pub fn stop(mut self) -> Option<StreamEngine> {
        let _ = self.stop_tx.send(());
        self.handle.take().and_then(|handle| handle.join().ok())
    }
}

impl Drop for StreamScheduler {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
