use json_settings::{Error, Settings};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn async_color_scenario() {
    let temp = TempDir::new().unwrap();
    let s = Settings::in_dir(temp.path().join("app"));

    s.set_async("color.name", "cerulean").await.unwrap();
    assert_eq!(
        s.get_async("color.name").await.unwrap(),
        Some(json!("cerulean"))
    );
    assert!(!s.has_async("color.hue").await.unwrap());
    assert_eq!(s.get_async("color.hue").await.unwrap(), None);

    s.set_async("color.code", json!({"rgb": [0, 179, 230], "hex": "#003BE6"}))
        .await
        .unwrap();
    assert_eq!(
        s.get_as_async::<u8>("color.code.rgb[1]").await.unwrap(),
        Some(179)
    );

    s.unset_async("color.name").await.unwrap();
    assert!(!s.has_async("color.name").await.unwrap());
    assert!(s.has_async("color.code").await.unwrap());
}

#[tokio::test]
async fn async_unset_of_missing_path_skips_the_save() {
    let temp = TempDir::new().unwrap();
    let s = Settings::in_dir(temp.path());
    std::fs::write(s.file_path(), r#"{ "keep": true }"#).unwrap();
    let mut rx = s.subscribe();

    s.unset_async("keep.inner").await.unwrap();

    assert_eq!(
        std::fs::read_to_string(s.file_path()).unwrap(),
        r#"{ "keep": true }"#
    );
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn async_and_blocking_see_the_same_file() {
    let temp = TempDir::new().unwrap();
    let s = Settings::in_dir(temp.path());
    s.set_async("a", 1).await.unwrap();
    assert_eq!(s.get("a").unwrap(), Some(json!(1)));
    s.set("b", 2).unwrap();
    assert_eq!(
        s.get_all_async().await.unwrap(),
        json!({"a": 1, "b": 2}).as_object().cloned().unwrap()
    );
}

#[tokio::test]
async fn async_root_operations() {
    let temp = TempDir::new().unwrap();
    let s = Settings::in_dir(temp.path());
    s.set_all_async(json!({"x": true})).await.unwrap();
    assert_eq!(s.get_async("").await.unwrap(), Some(json!({"x": true})));
    assert_eq!(
        s.set_all_async("nope").await,
        Err(Error::InvalidRootValue("string"))
    );
    s.clear_async().await.unwrap();
    assert_eq!(s.get_async("").await.unwrap(), Some(json!({})));
}

#[tokio::test]
async fn async_errors_come_through_the_future() {
    let temp = TempDir::new().unwrap();
    let s = Settings::in_dir(temp.path());
    tokio::fs::write(s.file_path(), b"[]").await.unwrap();
    assert!(matches!(
        s.get_async("a").await,
        Err(Error::CorruptDocument { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_writes_never_corrupt_the_file() {
    let temp = TempDir::new().unwrap();
    let s = Arc::new(Settings::in_dir(temp.path()));
    s.set_async("seed", 0).await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..16 {
        let s = Arc::clone(&s);
        tasks.push(tokio::spawn(async move {
            s.set_async(format!("k{i}"), i).await
        }));
    }
    for t in tasks {
        t.await.unwrap().unwrap();
    }

    // Last writer wins: some keys may be lost, but the document is whole.
    let doc = s.get_all_async().await.unwrap();
    assert!(doc.contains_key("seed"));
    assert!(doc.keys().all(|k| k == "seed" || k.starts_with('k')));
    let leftovers = std::fs::read_dir(temp.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .count();
    assert_eq!(leftovers, 0);
}
