use json_settings::transport::{self, ChannelTransport};
use json_settings::{Capability, Config, DocumentChannel, DurableStore, Error, Settings};
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

fn store_in(dir: &Path) -> DurableStore {
    DurableStore::new(Config {
        directory: Some(dir.to_path_buf()),
        ..Config::default()
    })
}

fn restricted(transport: ChannelTransport) -> Settings {
    Settings::builder()
        .capability(Capability::Restricted)
        .transport(transport)
        .build()
        .unwrap()
}

#[tokio::test]
async fn restricted_async_calls_go_through_host() {
    let temp = TempDir::new().unwrap();
    let (client, host) = transport::channel(store_in(temp.path()), 8);
    let host_task = tokio::spawn(host.serve());

    let s = restricted(client);
    assert!(s.execution().is_remote());
    s.set_async("color.name", "cerulean").await.unwrap();
    assert_eq!(
        s.get_async("color.name").await.unwrap(),
        Some(json!("cerulean"))
    );

    // The privileged side wrote the file.
    let local = Settings::in_dir(temp.path());
    assert_eq!(local.get("color.name").unwrap(), Some(json!("cerulean")));

    drop(s);
    host_task.await.unwrap();
}

#[test]
fn restricted_blocking_calls_stay_blocking() {
    let temp = TempDir::new().unwrap();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();
    let (client, host) = transport::channel(store_in(temp.path()), 8);
    let host_task = runtime.spawn(host.serve());

    // Called from a plain thread, outside the runtime.
    let s = restricted(client);
    s.set("list", [1, 2, 3]).unwrap();
    s.unset("list[0]").unwrap();
    assert_eq!(s.get("list").unwrap(), Some(json!([2, 3])));
    assert!(s.has("list[1]").unwrap());
    assert!(!s.has("list[2]").unwrap());

    drop(s);
    runtime.block_on(host_task).unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocking_calls_inside_multi_thread_runtime() {
    let temp = TempDir::new().unwrap();
    let (client, host) = transport::channel(store_in(temp.path()), 8);
    let host_task = tokio::spawn(host.serve());

    let s = restricted(client);
    assert_eq!(s.get("a").unwrap(), None);
    s.set("a", 1).unwrap();
    assert!(s.has("a").unwrap());
    assert_eq!(s.get_async("a").await.unwrap(), Some(json!(1)));

    drop(s);
    host_task.await.unwrap();
}

#[tokio::test]
async fn blocking_calls_inside_current_thread_runtime_fail_cleanly() {
    let temp = TempDir::new().unwrap();
    let (client, host) = transport::channel(store_in(temp.path()), 8);
    tokio::spawn(host.serve());

    let s = restricted(client);
    assert!(matches!(s.get("a"), Err(Error::Transport(_))));
    assert!(matches!(s.set("a", 1), Err(Error::Transport(_))));
    // The async path still works on the same runtime.
    s.set_async("a", 1).await.unwrap();
    assert_eq!(s.get_async("a").await.unwrap(), Some(json!(1)));
}

#[tokio::test]
async fn host_errors_reach_the_caller() {
    let temp = TempDir::new().unwrap();
    let store = store_in(temp.path());
    std::fs::write(store.file_path(), "garbage").unwrap();
    let (client, host) = transport::channel(store, 1);
    tokio::spawn(host.serve());

    assert!(matches!(
        client.load_document().await,
        Err(Error::CorruptDocument { .. })
    ));
}

#[tokio::test]
async fn caller_side_errors_never_reach_the_host() {
    let temp = TempDir::new().unwrap();
    let (client, host) = transport::channel(store_in(temp.path()), 1);
    tokio::spawn(host.serve());

    let s = restricted(client);
    assert_eq!(s.set_async("", 1).await, Err(Error::InvalidRootValue("number")));
    assert!(!temp.path().join("settings.json").exists());
}

#[tokio::test]
async fn dropped_host_is_a_transport_error() {
    let temp = TempDir::new().unwrap();
    let (client, host) = transport::channel(store_in(temp.path()), 1);
    drop(host);

    let s = restricted(client);
    assert!(matches!(s.get_async("a").await, Err(Error::Transport(_))));
}

#[test]
fn request_names() {
    let (tx, _rx) = tokio::sync::oneshot::channel();
    let req = transport::Request::SaveDocumentSync {
        doc: Default::default(),
        reply: tx,
    };
    assert_eq!(req.operation(), "save-document-sync");
}
