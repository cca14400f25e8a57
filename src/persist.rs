//! Disk I/O for the settings document: bootstrap, load, and atomic or
//! direct writes, each in a blocking and an async flavour.
//!
//! The rename-over approach is close to atomic on most platforms. On NTFS
//! and the usual Unix filesystems it's reliable; on FAT32 or network shares
//! there are no hard guarantees.
//!
//! Nothing here serializes concurrent callers. Two overlapping writers end in
//! last-writer-wins, never in a half-written file (with `atomic_save` on).

use crate::config::Config;
use crate::error::{Error, Result};
use crate::serializer::JsonSerializer;
use crate::Document;
use parking_lot::RwLock;
use std::fs;
use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Owns the on-disk form of one settings document.
///
/// Cheap to clone; clones share the same configuration.
#[derive(Clone, Debug)]
pub struct DurableStore {
    config: Arc<RwLock<Config>>,
}

impl DurableStore {
    /// Store driven by its own copy of `config`.
    pub fn new(config: Config) -> Self {
        Self::with_shared_config(Arc::new(RwLock::new(config)))
    }

    /// Store that reads `config` on every operation, so changes made through
    /// the lock are picked up by the next call.
    pub fn with_shared_config(config: Arc<RwLock<Config>>) -> Self {
        Self { config }
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    /// Path of the backing file under the current configuration.
    pub fn file_path(&self) -> PathBuf {
        self.config.read().file_path()
    }

    /// `true` if the backing file is present.
    pub fn exists(&self) -> Result<bool> {
        let path = self.file_path();
        path.try_exists().map_err(|e| io_error(&path, e))
    }

    /// Create the directory and an initial document if the file is missing.
    /// Never overwrites a file that already exists, including one that shows
    /// up while this call is running.
    pub fn ensure_exists(&self) -> Result<()> {
        ensure_exists_with(&self.config())
    }

    /// Read and parse the document, creating it first if needed.
    pub fn load(&self) -> Result<Document> {
        let config = self.config();
        ensure_exists_with(&config)?;
        let path = config.file_path();
        let bytes = fs::read(&path).map_err(|e| io_error(&path, e))?;
        JsonSerializer::from_config(&config).deserialize(&bytes, &path)
    }

    /// Write `doc` using the configured strategy.
    pub fn save(&self, doc: &Document) -> Result<()> {
        let config = self.config();
        let path = config.file_path();
        let bytes = JsonSerializer::from_config(&config).serialize(doc)?;
        ensure_parent_dir(&path)?;
        if config.atomic_save {
            atomic_write(&path, &bytes)
        } else {
            direct_write(&path, &bytes)
        }
    }

    /// Async [`exists`](Self::exists).
    pub async fn exists_async(&self) -> Result<bool> {
        let path = self.file_path();
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| io_error(&path, e))
    }

    /// Async [`ensure_exists`](Self::ensure_exists).
    pub async fn ensure_exists_async(&self) -> Result<()> {
        ensure_exists_with_async(&self.config()).await
    }

    /// Async [`load`](Self::load).
    pub async fn load_async(&self) -> Result<Document> {
        let config = self.config();
        ensure_exists_with_async(&config).await?;
        let path = config.file_path();
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| io_error(&path, e))?;
        JsonSerializer::from_config(&config).deserialize(&bytes, &path)
    }

    /// Async [`save`](Self::save).
    pub async fn save_async(&self, doc: &Document) -> Result<()> {
        let config = self.config();
        let path = config.file_path();
        let bytes = JsonSerializer::from_config(&config).serialize(doc)?;
        ensure_parent_dir_async(&path).await?;
        if config.atomic_save {
            atomic_write_async(&path, &bytes).await
        } else {
            direct_write_async(&path, &bytes).await
        }
    }
}

// ---- blocking ----------------------------------------------------------------

fn ensure_exists_with(config: &Config) -> Result<()> {
    let path = config.file_path();
    if path.try_exists().map_err(|e| io_error(&path, e))? {
        return Ok(());
    }
    ensure_parent_dir(&path)?;
    let bytes = JsonSerializer::from_config(config).serialize(&config.defaults)?;
    match write_new(&path, &bytes, config.atomic_save) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "created settings file");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(io_error(&path, e)),
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).map_err(|e| io_error(dir, e))
        }
        _ => Ok(()),
    }
}

// Publish `bytes` at `path` only if nothing is there yet.
fn write_new(path: &Path, bytes: &[u8], atomic: bool) -> io::Result<()> {
    write_new_with(path, bytes, atomic, |from, to| fs::hard_link(from, to))
}

// Filesystems without hard links (vfat, exFAT, many FUSE mounts) report
// anything from `Unsupported` to `PermissionDenied`; every failure except
// `AlreadyExists` falls back to `create_new`.
fn write_new_with<F>(path: &Path, bytes: &[u8], atomic: bool, link: F) -> io::Result<()>
where
    F: FnOnce(&Path, &Path) -> io::Result<()>,
{
    if !atomic {
        return create_new(path, bytes);
    }
    let tmp = temp_path_for(path);
    if let Err(e) = write_synced(&tmp, bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    let linked = link(&tmp, path);
    let _ = fs::remove_file(&tmp);
    match linked {
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(e),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "hard link failed, creating in place");
            create_new(path, bytes)
        }
        Ok(()) => Ok(()),
    }
}

fn create_new(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut f = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    f.write_all(bytes)?;
    f.sync_all()
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut f = fs::File::create(path)?;
    f.write_all(bytes)?;
    f.sync_all()
}

/// Write `bytes` to a temp file beside `path` and rename it over `path`. A
/// crash or failure at any point leaves the previous file untouched.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    atomic_write_with(path, bytes, |from, to| fs::rename(from, to))
}

pub(crate) fn atomic_write_with<F>(path: &Path, bytes: &[u8], rename: F) -> Result<()>
where
    F: FnOnce(&Path, &Path) -> io::Result<()>,
{
    let tmp = temp_path_for(path);
    if let Err(e) = write_synced(&tmp, bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(io_error(&tmp, e));
    }
    rename(&tmp, path).map_err(|e| {
        tracing::warn!(path = %path.display(), error = %e, "atomic save failed, discarding temp file");
        let _ = fs::remove_file(&tmp);
        io_error(path, e)
    })
}

/// Truncate `path` and write `bytes` straight into it.
pub fn direct_write(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).map_err(|e| io_error(path, e))
}

// ---- async -------------------------------------------------------------------

async fn ensure_exists_with_async(config: &Config) -> Result<()> {
    let path = config.file_path();
    if tokio::fs::try_exists(&path)
        .await
        .map_err(|e| io_error(&path, e))?
    {
        return Ok(());
    }
    ensure_parent_dir_async(&path).await?;
    let bytes = JsonSerializer::from_config(config).serialize(&config.defaults)?;
    match write_new_async(&path, &bytes, config.atomic_save).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "created settings file");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(io_error(&path, e)),
    }
}

async fn ensure_parent_dir_async(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| io_error(dir, e)),
        _ => Ok(()),
    }
}

async fn write_new_async(path: &Path, bytes: &[u8], atomic: bool) -> io::Result<()> {
    if !atomic {
        return create_new_async(path, bytes).await;
    }
    let tmp = temp_path_for(path);
    if let Err(e) = write_synced_async(&tmp, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    let linked = tokio::fs::hard_link(&tmp, path).await;
    let _ = tokio::fs::remove_file(&tmp).await;
    match linked {
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(e),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "hard link failed, creating in place");
            create_new_async(path, bytes).await
        }
        Ok(()) => Ok(()),
    }
}

async fn create_new_async(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut f = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    f.write_all(bytes).await?;
    f.sync_all().await
}

async fn write_synced_async(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut f = tokio::fs::File::create(path).await?;
    f.write_all(bytes).await?;
    f.sync_all().await
}

/// Async [`atomic_write`].
pub async fn atomic_write_async(path: &Path, bytes: &[u8]) -> Result<()> {
    atomic_write_async_with(path, bytes, |from, to| tokio::fs::rename(from, to)).await
}

pub(crate) async fn atomic_write_async_with<F, Fut>(
    path: &Path,
    bytes: &[u8],
    rename: F,
) -> Result<()>
where
    F: FnOnce(PathBuf, PathBuf) -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    let tmp = temp_path_for(path);
    if let Err(e) = write_synced_async(&tmp, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(io_error(&tmp, e));
    }
    if let Err(e) = rename(tmp.clone(), path.to_path_buf()).await {
        tracing::warn!(path = %path.display(), error = %e, "atomic save failed, discarding temp file");
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(io_error(path, e));
    }
    Ok(())
}

/// Async [`direct_write`].
pub async fn direct_write_async(path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| io_error(path, e))
}

// ---- helpers -----------------------------------------------------------------

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

// `.settings.json.<pid>.<seq>.tmp` next to the target, unique per process and
// per call so concurrent writers never share a temp file.
fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "settings".to_string());
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{name}.{}.{seq}.tmp", std::process::id()))
}

fn io_error(path: &Path, err: io::Error) -> Error {
    Error::Io(format!("{}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn store_in(dir: &Path) -> DurableStore {
        DurableStore::new(Config {
            directory: Some(dir.to_path_buf()),
            ..Config::default()
        })
    }

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn leftover_temps(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count()
    }

    #[test]
    fn load_bootstraps_nested_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("a").join("b");
        let store = store_in(&dir);
        assert!(!store.exists().unwrap());
        assert_eq!(store.load().unwrap(), Document::new());
        assert!(store.exists().unwrap());
        assert_eq!(fs::read_to_string(store.file_path()).unwrap(), "{}");
    }

    #[test]
    fn ensure_uses_configured_defaults() {
        let temp = TempDir::new().unwrap();
        let store = DurableStore::new(Config {
            directory: Some(temp.path().to_path_buf()),
            defaults: doc(json!({"theme": "dark"})),
            ..Config::default()
        });
        assert_eq!(store.load().unwrap(), doc(json!({"theme": "dark"})));
    }

    #[test]
    fn ensure_never_clobbers() {
        for atomic in [true, false] {
            let temp = TempDir::new().unwrap();
            let path = temp.path().join("settings.json");
            fs::write(&path, r#"{"keep":true}"#).unwrap();
            assert!(write_new(&path, b"{}", atomic)
                .is_err_and(|e| e.kind() == io::ErrorKind::AlreadyExists));
            let store = store_in(temp.path());
            store.ensure_exists().unwrap();
            assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"keep":true}"#);
            assert_eq!(leftover_temps(temp.path()), 0);
        }
    }

    #[test]
    fn save_then_load() {
        for atomic in [true, false] {
            let temp = TempDir::new().unwrap();
            let store = DurableStore::new(Config {
                directory: Some(temp.path().join("nested")),
                atomic_save: atomic,
                ..Config::default()
            });
            let d = doc(json!({"a": [1, 2], "b": {"c": null}}));
            store.save(&d).unwrap();
            assert_eq!(store.load().unwrap(), d);
            assert_eq!(leftover_temps(&temp.path().join("nested")), 0);
        }
    }

    #[test]
    fn failed_rename_keeps_original() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        fs::write(&path, r#"{"version":1}"#).unwrap();

        let err = atomic_write_with(&path, br#"{"version":2}"#, |from, _| {
            assert!(from.exists(), "temp file should be written before rename");
            Err(io::Error::other("injected rename failure"))
        })
        .unwrap_err();

        assert!(matches!(err, Error::Io(msg) if msg.contains("injected")));
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"version":1}"#);
        assert_eq!(leftover_temps(temp.path()), 0);
    }

    #[tokio::test]
    async fn failed_async_rename_keeps_original() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        fs::write(&path, r#"{"version":1}"#).unwrap();

        let err = atomic_write_async_with(&path, br#"{"version":2}"#, |from, _| async move {
            assert!(from.exists(), "temp file should be written before rename");
            Err(io::Error::other("injected rename failure"))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Io(msg) if msg.contains("injected")));
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"version":1}"#);
        assert_eq!(leftover_temps(temp.path()), 0);
    }

    #[test]
    fn missing_hard_links_fall_back_to_create_new() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        write_new_with(&path, br#"{"fresh":true}"#, true, |_, _| {
            Err(io::Error::from(io::ErrorKind::PermissionDenied))
        })
        .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"fresh":true}"#);
        assert_eq!(leftover_temps(temp.path()), 0);

        // An existing file still wins over the fallback.
        let err = write_new_with(&path, b"{}", true, |_, _| {
            Err(io::Error::from(io::ErrorKind::PermissionDenied))
        })
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"fresh":true}"#);
    }

    #[test]
    fn failed_temp_write_leaves_nothing_behind() {
        let temp = TempDir::new().unwrap();
        // Parent is a regular file, so neither the temp file nor the target
        // can be created.
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let path = blocker.join("settings.json");
        assert!(write_new(&path, b"{}", true).is_err());
        assert_eq!(leftover_temps(temp.path()), 0);
    }

    #[test]
    fn corrupt_file_is_reported_not_reset() {
        let temp = TempDir::new().unwrap();
        let store = store_in(temp.path());
        fs::write(store.file_path(), "{not json").unwrap();
        assert!(matches!(store.load(), Err(Error::CorruptDocument { .. })));
        assert_eq!(fs::read_to_string(store.file_path()).unwrap(), "{not json");
    }

    #[test]
    fn pretty_output_follows_config() {
        let temp = TempDir::new().unwrap();
        let store = DurableStore::new(Config {
            directory: Some(temp.path().to_path_buf()),
            prettify: true,
            indent_width: 3,
            ..Config::default()
        });
        store.save(&doc(json!({"a": 1}))).unwrap();
        assert_eq!(
            fs::read_to_string(store.file_path()).unwrap(),
            "{\n   \"a\": 1\n}"
        );
    }

    #[test]
    fn shared_config_is_read_per_call() {
        let temp = TempDir::new().unwrap();
        let shared = Arc::new(RwLock::new(Config {
            directory: Some(temp.path().to_path_buf()),
            ..Config::default()
        }));
        let store = DurableStore::with_shared_config(Arc::clone(&shared));
        store.save(&doc(json!({"n": 1}))).unwrap();
        shared.write().file_name = "other.json".into();
        assert_eq!(store.load().unwrap(), Document::new());
        assert!(temp.path().join("other.json").exists());
    }

    #[test]
    fn temp_names_are_unique() {
        let p = Path::new("/x/settings.json");
        let a = temp_path_for(p);
        let b = temp_path_for(p);
        assert_ne!(a, b);
        assert_eq!(a.parent(), p.parent());
    }

    #[tokio::test]
    async fn async_round_trip() {
        for atomic in [true, false] {
            let temp = TempDir::new().unwrap();
            let store = DurableStore::new(Config {
                directory: Some(temp.path().join("deep").join("er")),
                atomic_save: atomic,
                ..Config::default()
            });
            assert_eq!(store.load_async().await.unwrap(), Document::new());
            let d = doc(json!({"x": "y"}));
            store.save_async(&d).await.unwrap();
            assert_eq!(store.load_async().await.unwrap(), d);
            assert_eq!(store.load().unwrap(), d);
        }
    }
}
