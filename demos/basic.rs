use json_settings::Settings;
use serde_json::json;

fn main() -> Result<(), json_settings::Error> {
    let dir = std::env::temp_dir().join("json_settings_demo_basic");
    let settings = Settings::in_dir(&dir);

    // set / get / has
    settings.set("color.name", "cerulean")?;
    println!("color.name = {:?}", settings.get("color.name")?);
    println!("has color.hue? {}", settings.has("color.hue")?);

    // nested values and array indices
    settings.set("color.code", json!({"rgb": [0, 179, 230], "hex": "#003BE6"}))?;
    println!("green channel = {:?}", settings.get("color.code.rgb[1]")?);

    // keys containing dots
    settings.set("hosts.example\\.com.port", 8080)?;
    println!("hosts = {:?}", settings.get("hosts")?);

    // unset
    settings.unset("color.name")?;
    println!("whole document = {:?}", settings.get("")?);
    println!("stored at {}", settings.file_path().display());

    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}
