//! A store driven by one background thread.
//!
//! Requests are processed strictly in submission order, so a load issued
//! after a save of the same id sees the saved bytes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::error::StoreError;
use crate::store::ChunkStore;

/// Receives the stored bytes, or `None` when nothing usable was found.
pub type LoadCallback = Box<dyn FnOnce(Option<Vec<u8>>) + Send + 'static>;

enum Request {
    Put { id: String, bytes: Vec<u8> },
    Get { id: String, callback: LoadCallback },
}

/// Fire-and-forget front end for a [`ChunkStore`].
pub struct AsyncStore {
    store: Arc<dyn ChunkStore>,
    sender: Option<Sender<Request>>,
    worker: Option<JoinHandle<()>>,
    /// Set on shutdown: loads still queued are dropped, saves still run.
    closing: Arc<AtomicBool>,
    pending: Arc<AtomicUsize>,
}

impl AsyncStore {
    pub fn new(store: Arc<dyn ChunkStore>) -> Result<Self, StoreError> {
        let (sender, receiver) = unbounded();
        let closing = Arc::new(AtomicBool::new(false));
        let pending = Arc::new(AtomicUsize::new(0));

        let worker = {
            let store = Arc::clone(&store);
            let closing = Arc::clone(&closing);
            let pending = Arc::clone(&pending);
            std::thread::Builder::new()
                .name("strata-store".into())
                .spawn(move || run(store, receiver, closing, pending))
                .map_err(StoreError::Spawn)?
        };

        Ok(Self {
            store,
            sender: Some(sender),
            worker: Some(worker),
            closing,
            pending,
        })
    }

    /// The wrapped store, for synchronous access.
    pub fn store(&self) -> &Arc<dyn ChunkStore> {
        &self.store
    }

    pub fn put(&self, id: String, bytes: Vec<u8>) {
        self.submit(Request::Put { id, bytes });
    }

    /// Queues a load. The callback runs on the store thread.
    pub fn get(&self, id: String, callback: impl FnOnce(Option<Vec<u8>>) + Send + 'static) {
        self.submit(Request::Get {
            id,
            callback: Box::new(callback),
        });
    }

    /// Requests queued or in progress.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    fn submit(&self, request: Request) {
        let Some(sender) = &self.sender else {
            tracing::warn!("store request after shutdown ignored");
            return;
        };
        self.pending.fetch_add(1, Ordering::AcqRel);
        if sender.send(request).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            tracing::error!("store thread is gone; request dropped");
        }
    }

    /// Drops queued loads, writes every queued save, and joins the thread.
    pub fn shutdown(&mut self) {
        self.closing.store(true, Ordering::Release);
        // Closing the channel lets the worker drain and exit.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("store thread panicked");
            }
        }
    }
}

impl Drop for AsyncStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(
    store: Arc<dyn ChunkStore>,
    receiver: Receiver<Request>,
    closing: Arc<AtomicBool>,
    pending: Arc<AtomicUsize>,
) {
    while let Ok(request) = receiver.recv() {
        match request {
            Request::Put { id, bytes } => {
                if let Err(err) = store.put(&id, &bytes) {
                    tracing::error!(%id, error = %err, "failed to save");
                }
            }
            Request::Get { id, callback } => {
                if closing.load(Ordering::Acquire) {
                    tracing::trace!(%id, "dropping load during shutdown");
                } else {
                    let bytes = store.get(&id).unwrap_or_else(|err| {
                        tracing::error!(%id, error = %err, "failed to load");
                        None
                    });
                    callback(bytes);
                }
            }
        }
        pending.fetch_sub(1, Ordering::AcqRel);
    }
    tracing::debug!("store thread stopped");
}
