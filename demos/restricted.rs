use json_settings::transport;
use json_settings::{Capability, Config, DurableStore, Settings};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), json_settings::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let dir = std::env::temp_dir().join("json_settings_demo_restricted");

    // The privileged side owns the file...
    let store = DurableStore::new(Config {
        directory: Some(dir.clone()),
        prettify: true,
        ..Config::default()
    });
    let (client, host) = transport::channel(store, 16);
    let host = tokio::spawn(host.serve());

    // ...and the restricted side only talks to it.
    let settings = Settings::builder()
        .capability(Capability::Restricted)
        .transport(client)
        .build()?;

    settings.set_async("ui.sidebar.width", 240).await?;
    settings.set_async("ui.recent", json!(["a.txt", "b.txt"])).await?;
    settings.unset_async("ui.recent[0]").await?;
    println!("ui = {:?}", settings.get_async("ui").await?);

    drop(settings);
    let _ = host.await;
    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}
