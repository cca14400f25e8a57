//! Request/response channel between a restricted and a privileged context.
//!
//! [`channel`] pairs a [`ChannelTransport`] (handed to the restricted side
//! and plugged into [`Settings`](crate::Settings) as its transport) with a
//! [`PrivilegedHost`] that owns the [`DurableStore`] and answers requests.
//! The host handles one request at a time, so writes arriving through it
//! never overlap.
//!
//! Blocking calls on the transport park the calling thread. From a plain
//! thread that is all they do. On a multi-thread runtime worker the wait runs
//! under `block_in_place`. A current-thread runtime has nothing to hand its
//! work to, so there the call fails with [`Error::Transport`]. Use the async
//! methods there.

use crate::error::{Error, Result};
use crate::persist::DurableStore;
use crate::strategy::DocumentChannel;
use crate::Document;
use async_trait::async_trait;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::{mpsc, oneshot};

/// One request crossing the boundary, with the slot its answer goes into.
#[derive(Debug)]
pub enum Request {
    /// `load-document`
    LoadDocument {
        /// Answer slot.
        reply: oneshot::Sender<Result<Document>>,
    },
    /// `load-document-sync`
    LoadDocumentSync {
        /// Answer slot.
        reply: oneshot::Sender<Result<Document>>,
    },
    /// `save-document`
    SaveDocument {
        /// Document to write.
        doc: Document,
        /// Answer slot.
        reply: oneshot::Sender<Result<()>>,
    },
    /// `save-document-sync`
    SaveDocumentSync {
        /// Document to write.
        doc: Document,
        /// Answer slot.
        reply: oneshot::Sender<Result<()>>,
    },
}

impl Request {
    /// Wire name of the operation.
    pub fn operation(&self) -> &'static str {
        match self {
            Request::LoadDocument { .. } => "load-document",
            Request::LoadDocumentSync { .. } => "load-document-sync",
            Request::SaveDocument { .. } => "save-document",
            Request::SaveDocumentSync { .. } => "save-document-sync",
        }
    }
}

/// Create a connected transport/host pair. `capacity` bounds the number of
/// requests waiting for the host.
pub fn channel(store: DurableStore, capacity: usize) -> (ChannelTransport, PrivilegedHost) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelTransport { tx }, PrivilegedHost { store, rx })
}

/// Restricted-side end of the channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::Sender<Request>,
}

fn disconnected() -> Error {
    Error::Transport("privileged host is gone".to_string())
}

// Run a blocking round trip without tripping tokio's "cannot block inside a
// runtime" panic.
fn park<T>(wait: impl FnOnce() -> Result<T>) -> Result<T> {
    match Handle::try_current() {
        Err(_) => wait(),
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(wait)
        }
        Ok(_) => Err(Error::Transport(
            "blocking settings call inside a current-thread runtime, use the async API"
                .to_string(),
        )),
    }
}

#[async_trait]
impl DocumentChannel for ChannelTransport {
    fn load_document_sync(&self) -> Result<Document> {
        park(|| {
            let (reply, rx) = oneshot::channel();
            self.tx
                .blocking_send(Request::LoadDocumentSync { reply })
                .map_err(|_| disconnected())?;
            rx.blocking_recv().map_err(|_| disconnected())?
        })
    }

    fn save_document_sync(&self, doc: &Document) -> Result<()> {
        park(|| {
            let (reply, rx) = oneshot::channel();
            self.tx
                .blocking_send(Request::SaveDocumentSync {
                    doc: doc.clone(),
                    reply,
                })
                .map_err(|_| disconnected())?;
            rx.blocking_recv().map_err(|_| disconnected())?
        })
    }

    async fn load_document(&self) -> Result<Document> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::LoadDocument { reply })
            .await
            .map_err(|_| disconnected())?;
        rx.await.map_err(|_| disconnected())?
    }

    async fn save_document(&self, doc: &Document) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::SaveDocument {
                doc: doc.clone(),
                reply,
            })
            .await
            .map_err(|_| disconnected())?;
        rx.await.map_err(|_| disconnected())?
    }
}

/// Privileged-side end of the channel.
#[derive(Debug)]
pub struct PrivilegedHost {
    store: DurableStore,
    rx: mpsc::Receiver<Request>,
}

impl PrivilegedHost {
    /// The store requests are served from.
    pub fn store(&self) -> &DurableStore {
        &self.store
    }

    /// Answer requests until every [`ChannelTransport`] clone is dropped.
    ///
    /// `*-sync` requests run the blocking store API on tokio's blocking pool;
    /// the others use the async API.
    pub async fn serve(mut self) {
        while let Some(request) = self.rx.recv().await {
            self.handle(request).await;
        }
        tracing::debug!("all transports dropped, privileged host stopping");
    }

    async fn handle(&self, request: Request) {
        let operation = request.operation();
        tracing::debug!(operation, "serving settings request");
        let delivered = match request {
            Request::LoadDocument { reply } => reply.send(self.store.load_async().await).is_ok(),
            Request::SaveDocument { doc, reply } => {
                reply.send(self.store.save_async(&doc).await).is_ok()
            }
            Request::LoadDocumentSync { reply } => {
                let store = self.store.clone();
                reply.send(blocking(move || store.load()).await).is_ok()
            }
            Request::SaveDocumentSync { doc, reply } => {
                let store = self.store.clone();
                reply.send(blocking(move || store.save(&doc)).await).is_ok()
            }
        };
        if !delivered {
            tracing::debug!(operation, "caller went away before the reply");
        }
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Transport(format!("blocking task failed: {e}")))?
}
