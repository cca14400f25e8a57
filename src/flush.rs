//! Coalesced saves: a single-slot pending write in front of a
//! [`DurableStore`].
//!
//! [`DebouncedStore::save`] only parks the document and nudges a background
//! thread. The thread writes once saves have been quiet for the configured
//! interval (or the pending write has waited four intervals, whichever comes
//! first), so a burst of saves costs one disk write. Only the latest document
//! is ever written.

use crate::error::Result;
use crate::persist::DurableStore;
use crate::Document;
use parking_lot::Mutex;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

struct Shared {
    store: DurableStore,
    pending: Mutex<Option<Document>>,
    // Held across take-and-write so an older document never lands after a
    // newer one.
    write_lock: Mutex<()>,
}

impl Shared {
    fn write_pending(&self) -> Result<()> {
        let _guard = self.write_lock.lock();
        let Some(doc) = self.pending.lock().take() else {
            return Ok(());
        };
        let saved = self.store.save(&doc);
        if saved.is_err() {
            let mut slot = self.pending.lock();
            if slot.is_none() {
                *slot = Some(doc);
            }
        }
        saved
    }
}

/// Debouncing decorator around a [`DurableStore`].
///
/// Dropping it writes whatever is still pending and joins the background
/// thread, which may block for one disk write.
pub struct DebouncedStore {
    shared: Arc<Shared>,
    tx: Option<mpsc::SyncSender<()>>,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl DebouncedStore {
    /// Wrap `store`, writing after `quiet` without new saves.
    pub fn new(store: DurableStore, quiet: Duration) -> Self {
        let shared = Arc::new(Shared {
            store,
            pending: Mutex::new(None),
            write_lock: Mutex::new(()),
        });
        // Room for one queued nudge so a save made while the worker is
        // writing is not lost.
        let (tx, rx) = mpsc::sync_channel::<()>(1);
        let worker = Arc::clone(&shared);
        let join_handle = thread::spawn(move || run(&worker, &rx, quiet));

        Self {
            shared,
            tx: Some(tx),
            join_handle: Some(join_handle),
        }
    }

    /// The wrapped store.
    pub fn store(&self) -> &DurableStore {
        &self.shared.store
    }

    /// Park `doc` as the next document to write, replacing any pending one.
    pub fn save(&self, doc: Document) {
        *self.shared.pending.lock() = Some(doc);
        if let Some(tx) = &self.tx {
            // Full means a nudge is already queued.
            let _ = tx.try_send(());
        }
    }

    /// The pending document if there is one, otherwise the one on disk.
    pub fn load(&self) -> Result<Document> {
        let _guard = self.shared.write_lock.lock();
        if let Some(doc) = self.shared.pending.lock().clone() {
            return Ok(doc);
        }
        self.shared.store.load()
    }

    /// `true` while a save is waiting to be written.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.shared.pending.lock().is_some()
    }

    /// Write the pending document now. A no-op when nothing is pending.
    pub fn flush(&self) -> Result<()> {
        self.shared.write_pending()
    }
}

fn run(shared: &Shared, rx: &mpsc::Receiver<()>, quiet: Duration) {
    let max_wait = quiet.saturating_mul(4);
    // Each outer turn waits for the first save of a burst.
    while rx.recv().is_ok() {
        let started = Instant::now();
        let mut disconnected = false;
        loop {
            let left = max_wait.saturating_sub(started.elapsed());
            if left.is_zero() {
                break;
            }
            match rx.recv_timeout(quiet.min(left)) {
                Ok(()) => continue,
                Err(mpsc::RecvTimeoutError::Timeout) => break,
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }
        write_logged(shared);
        if disconnected {
            return;
        }
    }
    write_logged(shared);
}

fn write_logged(shared: &Shared) {
    if let Err(e) = shared.write_pending() {
        tracing::warn!(
            path = %shared.store.file_path().display(),
            error = %e,
            "debounced settings save failed"
        );
    }
}

impl Drop for DebouncedStore {
    fn drop(&mut self) {
        drop(self.tx.take());
        if let Some(h) = self.join_handle.take() {
            let _ = h.join();
        }
    }
}

impl std::fmt::Debug for DebouncedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebouncedStore")
            .field("store", &self.shared.store)
            .field("pending", &self.has_pending())
            .finish_non_exhaustive()
    }
}
