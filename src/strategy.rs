//! Where document I/O actually happens.
//!
//! A process with file system access runs [`LocalExecution`]. A restricted
//! process (a sandboxed UI, say) runs [`RemoteDispatch`], which forwards the
//! four document operations to the privileged side over a transport. Which
//! one a [`Settings`](crate::Settings) uses is fixed when it is built, from
//! the [`Capability`] it is given.

use crate::error::Result;
use crate::persist::DurableStore;
use crate::Document;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// The four operations that cross the privilege boundary.
///
/// Blocking methods must stay blocking end to end; async methods must not
/// block the calling thread.
#[async_trait]
pub trait DocumentChannel: Send + Sync {
    /// Load the whole document, blocking.
    fn load_document_sync(&self) -> Result<Document>;

    /// Replace the whole document, blocking.
    fn save_document_sync(&self, doc: &Document) -> Result<()>;

    /// Load the whole document.
    async fn load_document(&self) -> Result<Document>;

    /// Replace the whole document.
    async fn save_document(&self, doc: &Document) -> Result<()>;
}

/// What the current process is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Capability {
    /// Can touch the file system.
    #[default]
    Privileged,
    /// Must ask a privileged process to do I/O.
    Restricted,
}

/// Runs document I/O in this process.
#[derive(Debug, Clone)]
pub struct LocalExecution {
    store: DurableStore,
}

impl LocalExecution {
    /// Execute against `store`.
    pub fn new(store: DurableStore) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &DurableStore {
        &self.store
    }
}

#[async_trait]
impl DocumentChannel for LocalExecution {
    fn load_document_sync(&self) -> Result<Document> {
        self.store.load()
    }

    fn save_document_sync(&self, doc: &Document) -> Result<()> {
        self.store.save(doc)
    }

    async fn load_document(&self) -> Result<Document> {
        self.store.load_async().await
    }

    async fn save_document(&self, doc: &Document) -> Result<()> {
        self.store.save_async(doc).await
    }
}

/// Forwards document I/O to a privileged process.
#[derive(Clone)]
pub struct RemoteDispatch {
    transport: Arc<dyn DocumentChannel>,
}

impl RemoteDispatch {
    /// Dispatch over `transport`.
    pub fn new(transport: Arc<dyn DocumentChannel>) -> Self {
        Self { transport }
    }
}

impl fmt::Debug for RemoteDispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteDispatch").finish_non_exhaustive()
    }
}

#[async_trait]
impl DocumentChannel for RemoteDispatch {
    fn load_document_sync(&self) -> Result<Document> {
        self.transport.load_document_sync()
    }

    fn save_document_sync(&self, doc: &Document) -> Result<()> {
        self.transport.save_document_sync(doc)
    }

    async fn load_document(&self) -> Result<Document> {
        self.transport.load_document().await
    }

    async fn save_document(&self, doc: &Document) -> Result<()> {
        self.transport.save_document(doc).await
    }
}

/// The strategy a [`Settings`](crate::Settings) was built with.
#[derive(Debug, Clone)]
pub enum Execution {
    /// See [`LocalExecution`].
    Local(LocalExecution),
    /// See [`RemoteDispatch`].
    Remote(RemoteDispatch),
}

impl Execution {
    /// `true` for [`Execution::Remote`].
    pub fn is_remote(&self) -> bool {
        matches!(self, Execution::Remote(_))
    }

    fn channel(&self) -> &dyn DocumentChannel {
        match self {
            Execution::Local(local) => local,
            Execution::Remote(remote) => remote,
        }
    }
}

#[async_trait]
impl DocumentChannel for Execution {
    fn load_document_sync(&self) -> Result<Document> {
        self.channel().load_document_sync()
    }

    fn save_document_sync(&self, doc: &Document) -> Result<()> {
        self.channel().save_document_sync(doc)
    }

    async fn load_document(&self) -> Result<Document> {
        self.channel().load_document().await
    }

    async fn save_document(&self, doc: &Document) -> Result<()> {
        self.channel().save_document(doc).await
    }
}
