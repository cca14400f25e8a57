//! The public settings API and its builder.

use crate::config::{Config, ConfigUpdate};
use crate::error::{Error, Result};
use crate::notify::{Change, ChangeKind, Notifier};
use crate::path::{KeyPath, Token};
use crate::persist::DurableStore;
use crate::strategy::{Capability, DocumentChannel, Execution, LocalExecution, RemoteDispatch};
use crate::tree;
use crate::Document;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Persistent settings document addressed by key paths.
///
/// Every call reads the document fresh, and every mutation is a full
/// load → change → save, so nothing half-applied is ever visible. Blocking
/// calls are naturally serialized; overlapping `*_async` mutations are not,
/// and the last save wins. Funnel writes through one task if that matters.
///
/// ```rust,no_run
/// use json_settings::Settings;
/// use serde_json::json;
///
/// let settings = Settings::in_dir("/tmp/my-app");
/// settings.set("color.name", "cerulean").unwrap();
/// assert_eq!(settings.get("color.name").unwrap(), Some(json!("cerulean")));
/// assert!(!settings.has("color.hue").unwrap());
/// ```
pub struct Settings {
    config: Arc<RwLock<Config>>,
    execution: Execution,
    notifier: Notifier,
}

impl Settings {
    /// Local settings with the given configuration.
    pub fn open(config: Config) -> Self {
        let config = Arc::new(RwLock::new(config));
        let store = DurableStore::with_shared_config(Arc::clone(&config));
        Self {
            config,
            execution: Execution::Local(LocalExecution::new(store)),
            notifier: Notifier::new(),
        }
    }

    /// Local settings stored as `settings.json` in `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::open(Config {
            directory: Some(dir.as_ref().to_path_buf()),
            ..Config::default()
        })
    }

    /// Start configuring a new instance.
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::new()
    }

    // ---- configuration ----

    /// Snapshot of the current configuration.
    #[must_use]
    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    /// Merge `update` into the configuration.
    pub fn configure(&self, update: ConfigUpdate) {
        self.config.write().merge(update);
    }

    /// Swap in a whole new configuration.
    pub fn replace_config(&self, config: Config) {
        *self.config.write() = config;
    }

    /// Go back to [`Config::default`].
    pub fn reset_config(&self) {
        *self.config.write() = Config::default();
    }

    /// Backing file under the current configuration. For a restricted
    /// instance this is only what the local configuration says; the
    /// privileged side decides where the document really lives.
    #[must_use]
    pub fn file_path(&self) -> PathBuf {
        self.config.read().file_path()
    }

    /// How I/O is carried out for this instance.
    #[must_use]
    pub fn execution(&self) -> &Execution {
        &self.execution
    }

    /// Receive a [`Change`] after every successful mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.notifier.subscribe()
    }

    // ---- blocking ----

    /// `true` if something exists at `path`. The root always exists.
    pub fn has(&self, path: impl Into<KeyPath>) -> Result<bool> {
        let tokens = path.into().resolve();
        let root = Value::Object(self.execution.load_document_sync()?);
        Ok(tree::has(&root, &tokens))
    }

    /// Value at `path`, or `None` when there is nothing there.
    pub fn get(&self, path: impl Into<KeyPath>) -> Result<Option<Value>> {
        let tokens = path.into().resolve();
        let root = Value::Object(self.execution.load_document_sync()?);
        Ok(lookup(root, &tokens))
    }

    /// Value at `path` deserialized into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, path: impl Into<KeyPath>) -> Result<Option<T>> {
        self.get(path)?.map(from_value).transpose()
    }

    /// The whole document.
    pub fn get_all(&self) -> Result<Document> {
        self.execution.load_document_sync()
    }

    /// Write `value` at `path`. With a root path, `value` replaces the whole
    /// document and must serialize to an object.
    pub fn set(&self, path: impl Into<KeyPath>, value: impl Serialize) -> Result<()> {
        let tokens = path.into().resolve();
        let value = to_value(value)?;
        let doc = if tokens.is_empty() {
            into_document(value)?
        } else {
            let mut root = Value::Object(self.execution.load_document_sync()?);
            tree::set(&mut root, &tokens, value)?;
            into_document(root)?
        };
        self.execution.save_document_sync(&doc)?;
        self.notifier.publish(ChangeKind::Set, tokens);
        Ok(())
    }

    /// Replace the whole document.
    pub fn set_all(&self, doc: impl Serialize) -> Result<()> {
        self.set(KeyPath::root(), doc)
    }

    /// Remove whatever is at `path`. Missing paths are not an error and leave
    /// the file alone. The root path empties the document.
    pub fn unset(&self, path: impl Into<KeyPath>) -> Result<()> {
        let tokens = path.into().resolve();
        let mut root = Value::Object(self.execution.load_document_sync()?);
        if !tree::delete(&mut root, &tokens) {
            return Ok(());
        }
        self.execution.save_document_sync(&into_document(root)?)?;
        self.notifier.publish(ChangeKind::Unset, tokens);
        Ok(())
    }

    /// Empty the document.
    pub fn clear(&self) -> Result<()> {
        self.unset(KeyPath::root())
    }

    // ---- async ----

    /// Async [`has`](Self::has).
    pub async fn has_async(&self, path: impl Into<KeyPath>) -> Result<bool> {
        let tokens = path.into().resolve();
        let root = Value::Object(self.execution.load_document().await?);
        Ok(tree::has(&root, &tokens))
    }

    /// Async [`get`](Self::get).
    pub async fn get_async(&self, path: impl Into<KeyPath>) -> Result<Option<Value>> {
        let tokens = path.into().resolve();
        let root = Value::Object(self.execution.load_document().await?);
        Ok(lookup(root, &tokens))
    }

    /// Async [`get_as`](Self::get_as).
    pub async fn get_as_async<T: DeserializeOwned>(
        &self,
        path: impl Into<KeyPath>,
    ) -> Result<Option<T>> {
        self.get_async(path).await?.map(from_value).transpose()
    }

    /// Async [`get_all`](Self::get_all).
    pub async fn get_all_async(&self) -> Result<Document> {
        self.execution.load_document().await
    }

    /// Async [`set`](Self::set).
    pub async fn set_async(&self, path: impl Into<KeyPath>, value: impl Serialize) -> Result<()> {
        let tokens = path.into().resolve();
        let value = to_value(value)?;
        let doc = if tokens.is_empty() {
            into_document(value)?
        } else {
            let mut root = Value::Object(self.execution.load_document().await?);
            tree::set(&mut root, &tokens, value)?;
            into_document(root)?
        };
        self.execution.save_document(&doc).await?;
        self.notifier.publish(ChangeKind::Set, tokens);
        Ok(())
    }

    /// Async [`set_all`](Self::set_all).
    pub async fn set_all_async(&self, doc: impl Serialize) -> Result<()> {
        self.set_async(KeyPath::root(), doc).await
    }

    /// Async [`unset`](Self::unset).
    pub async fn unset_async(&self, path: impl Into<KeyPath>) -> Result<()> {
        let tokens = path.into().resolve();
        let mut root = Value::Object(self.execution.load_document().await?);
        if !tree::delete(&mut root, &tokens) {
            return Ok(());
        }
        self.execution
            .save_document(&into_document(root)?)
            .await?;
        self.notifier.publish(ChangeKind::Unset, tokens);
        Ok(())
    }

    /// Async [`clear`](Self::clear).
    pub async fn clear_async(&self) -> Result<()> {
        self.unset_async(KeyPath::root()).await
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("config", &*self.config.read())
            .field("execution", &self.execution)
            .finish_non_exhaustive()
    }
}

fn lookup(root: Value, tokens: &[Token]) -> Option<Value> {
    if tokens.is_empty() {
        return Some(root);
    }
    tree::get(&root, tokens).cloned()
}

fn to_value(value: impl Serialize) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::Serialize(e.to_string()))
}

fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::Serialize(e.to_string()))
}

fn into_document(root: Value) -> Result<Document> {
    match root {
        Value::Object(doc) => Ok(doc),
        other => Err(Error::InvalidRootValue(tree::kind(&other))),
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Configures and creates a [`Settings`].
///
/// ```rust,no_run
/// use json_settings::Settings;
///
/// let settings = Settings::builder()
///     .directory("/tmp/my-app")
///     .prettify(true)
///     .indent_width(4)
///     .build()
///     .unwrap();
/// ```
pub struct SettingsBuilder {
    config: Config,
    capability: Capability,
    transport: Option<Arc<dyn DocumentChannel>>,
}

impl SettingsBuilder {
    fn new() -> Self {
        Self {
            config: Config::default(),
            capability: Capability::Privileged,
            transport: None,
        }
    }

    /// Start from a complete configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Directory for the document (default: platform user-data directory).
    pub fn directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.directory = Some(dir.into());
        self
    }

    /// File name inside the directory (default: `settings.json`).
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.config.file_name = name.into();
        self
    }

    /// Temp-file-and-rename saves (default: on).
    pub fn atomic_save(mut self, yes: bool) -> Self {
        self.config.atomic_save = yes;
        self
    }

    /// Human-readable JSON (default: compact).
    pub fn prettify(mut self, yes: bool) -> Self {
        self.config.prettify = yes;
        self
    }

    /// Spaces per indent level for pretty output (default: 2).
    pub fn indent_width(mut self, width: usize) -> Self {
        self.config.indent_width = width;
        self
    }

    /// Document written when the file is first created.
    pub fn defaults(mut self, doc: Document) -> Self {
        self.config.defaults = doc;
        self
    }

    /// Whether this process may do file I/O itself (default: privileged).
    pub fn capability(mut self, capability: Capability) -> Self {
        self.capability = capability;
        self
    }

    /// Channel to the privileged side, required for
    /// [`Capability::Restricted`].
    pub fn transport(mut self, transport: impl DocumentChannel + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Create the instance. Fails if a restricted instance has no transport.
    pub fn build(self) -> Result<Settings> {
        let config = Arc::new(RwLock::new(self.config));
        let execution = match self.capability {
            Capability::Privileged => Execution::Local(LocalExecution::new(
                DurableStore::with_shared_config(Arc::clone(&config)),
            )),
            Capability::Restricted => {
                let transport = self.transport.ok_or_else(|| {
                    Error::Config("a restricted context needs a transport".to_string())
                })?;
                Execution::Remote(RemoteDispatch::new(transport))
            }
        };
        Ok(Settings {
            config,
            execution,
            notifier: Notifier::new(),
        })
    }
}

impl std::fmt::Debug for SettingsBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsBuilder")
            .field("config", &self.config)
            .field("capability", &self.capability)
            .field("has_transport", &self.transport.is_some())
            .finish()
    }
}
