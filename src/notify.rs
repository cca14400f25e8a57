//! Change notifications, sent after a mutation has been saved.

use crate::path::Token;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Number of changes a slow subscriber may fall behind before it starts
/// missing them.
pub const CHANNEL_CAPACITY: usize = 64;

/// What kind of mutation was saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A value was written at `path` (the root when `path` is empty).
    Set,
    /// The value at `path` was removed (everything when `path` is empty).
    Unset,
}

/// A saved mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Kind of mutation.
    pub kind: ChangeKind,
    /// Resolved path it applied to.
    pub path: Vec<Token>,
}

#[derive(Debug)]
pub(crate) struct Notifier {
    tx: broadcast::Sender<Change>,
}

impl Notifier {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.tx.subscribe()
    }

    pub(crate) fn publish(&self, kind: ChangeKind, path: Vec<Token>) {
        // No receivers is fine.
        let _ = self.tx.send(Change { kind, path });
    }
}
