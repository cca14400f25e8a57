//! Store configuration and the default user-data directory.
//!
//! A [`Config`] is held by each [`Settings`](crate::Settings) instance and
//! shared with its [`DurableStore`](crate::DurableStore); the store reads it
//! fresh on every I/O operation, so reconfiguring takes effect on the next
//! call.

use crate::Document;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default backing file name.
pub const DEFAULT_FILE_NAME: &str = "settings.json";

/// Default indent width for pretty output.
pub const DEFAULT_INDENT_WIDTH: usize = 2;

/// How and where the settings document is stored.
///
/// ```
/// use json_settings::Config;
///
/// let config = Config::default();
/// assert!(config.atomic_save);
/// assert_eq!(config.file_name, "settings.json");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Write to a temp file and rename it over the target.
    pub atomic_save: bool,

    /// Directory holding the document. `None` means the platform user-data
    /// directory (see [`platform_user_data_dir`]).
    pub directory: Option<PathBuf>,

    /// File name inside `directory`.
    pub file_name: String,

    /// Pretty-print the document.
    pub prettify: bool,

    /// Spaces per indent level when `prettify` is on. Zero means compact.
    pub indent_width: usize,

    /// Document written the first time the file is found missing.
    pub defaults: Document,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            atomic_save: true,
            directory: None,
            file_name: DEFAULT_FILE_NAME.to_string(),
            prettify: false,
            indent_width: DEFAULT_INDENT_WIDTH,
            defaults: Document::new(),
        }
    }
}

impl Config {
    /// Directory the document lives in.
    pub fn resolved_directory(&self) -> PathBuf {
        self.directory
            .clone()
            .unwrap_or_else(platform_user_data_dir)
    }

    /// Full path of the backing file.
    pub fn file_path(&self) -> PathBuf {
        self.resolved_directory().join(&self.file_name)
    }

    /// Apply the fields set in `update`, leaving the rest alone.
    pub fn merge(&mut self, update: ConfigUpdate) {
        if let Some(atomic_save) = update.atomic_save {
            self.atomic_save = atomic_save;
        }
        if let Some(directory) = update.directory {
            self.directory = directory;
        }
        if let Some(file_name) = update.file_name {
            self.file_name = file_name;
        }
        if let Some(prettify) = update.prettify {
            self.prettify = prettify;
        }
        if let Some(indent_width) = update.indent_width {
            self.indent_width = indent_width;
        }
        if let Some(defaults) = update.defaults {
            self.defaults = defaults;
        }
    }
}

/// Partial configuration for [`Config::merge`]. Unset fields keep their
/// current value.
///
/// `directory` is doubly optional: `Some(None)` switches back to the
/// platform directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigUpdate {
    /// See [`Config::atomic_save`].
    pub atomic_save: Option<bool>,
    /// See [`Config::directory`].
    pub directory: Option<Option<PathBuf>>,
    /// See [`Config::file_name`].
    pub file_name: Option<String>,
    /// See [`Config::prettify`].
    pub prettify: Option<bool>,
    /// See [`Config::indent_width`].
    pub indent_width: Option<usize>,
    /// See [`Config::defaults`].
    pub defaults: Option<Document>,
}

/// Per-application user-data directory: the OS config directory joined with
/// the running executable's name. Falls back to `.` when the platform has no
/// config directory.
pub fn platform_user_data_dir() -> PathBuf {
    let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join(app_name())
}

fn app_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults() {
        let c = Config::default();
        assert!(c.atomic_save);
        assert!(!c.prettify);
        assert_eq!(c.indent_width, 2);
        assert!(c.directory.is_none());
        assert!(c.defaults.is_empty());
    }

    #[test]
    fn file_path_uses_directory() {
        let c = Config {
            directory: Some(PathBuf::from("/srv/app")),
            file_name: "prefs.json".into(),
            ..Config::default()
        };
        assert_eq!(c.file_path(), PathBuf::from("/srv/app/prefs.json"));
    }

    #[test]
    fn default_directory_is_platform_dir() {
        let c = Config::default();
        assert_eq!(c.resolved_directory(), platform_user_data_dir());
        assert!(c.file_path().ends_with(DEFAULT_FILE_NAME));
    }

    #[test]
    fn merge_only_touches_set_fields() {
        let mut c = Config::default();
        c.merge(ConfigUpdate {
            prettify: Some(true),
            indent_width: Some(4),
            ..ConfigUpdate::default()
        });
        assert!(c.prettify);
        assert_eq!(c.indent_width, 4);
        assert!(c.atomic_save);
        assert_eq!(c.file_name, DEFAULT_FILE_NAME);
    }

    #[test]
    fn merge_can_clear_directory() {
        let mut c = Config {
            directory: Some(PathBuf::from("/x")),
            ..Config::default()
        };
        c.merge(ConfigUpdate {
            directory: Some(None),
            ..ConfigUpdate::default()
        });
        assert!(c.directory.is_none());
    }

    #[test]
    fn partial_json_config() {
        let c: Config = serde_json::from_value(json!({"prettify": true})).unwrap();
        assert!(c.prettify);
        assert!(c.atomic_save);
        assert_eq!(c.file_name, DEFAULT_FILE_NAME);
    }
}
