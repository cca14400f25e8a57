use json_settings::{ChangeKind, Settings};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Serialize, Deserialize)]
struct Window {
    width: u32,
    height: u32,
}

fn main() -> Result<(), json_settings::Error> {
    let dir = std::env::temp_dir().join("json_settings_demo_builder");

    // pretty-printed JSON with 4-space indents, seeded with defaults
    let settings = Settings::builder()
        .directory(&dir)
        .file_name("preferences.json")
        .prettify(true)
        .indent_width(4)
        .defaults(json!({"theme": "dark"}).as_object().cloned().unwrap_or_default())
        .build()?;

    let mut changes = settings.subscribe();

    settings.set("window.main", Window { width: 1280, height: 720 })?;
    let window: Option<Window> = settings.get_as("window.main")?;
    println!("window = {window:?}");

    while let Ok(change) = changes.try_recv() {
        let verb = match change.kind {
            ChangeKind::Set => "set",
            ChangeKind::Unset => "unset",
        };
        println!("{verb} {:?}", change.path);
    }

    let contents = std::fs::read_to_string(settings.file_path())?;
    println!("On-disk JSON:\n{contents}");
    println!("\nDebug output: {settings:?}");

    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}
