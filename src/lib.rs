//! Persistent JSON settings store for desktop applications.
//!
//! One JSON object on disk, read and written through dotted key paths
//! (`color.code.rgb[1]`), with atomic saves, blocking and async variants of
//! every operation, and an optional split between a privileged process that
//! owns the file and restricted processes that talk to it over a channel.
//!
//! ```rust,no_run
//! use json_settings::Settings;
//! use serde_json::json;
//!
//! let settings = Settings::in_dir("/tmp/my-app");
//! settings.set("color.code", json!({"rgb": [0, 179, 230], "hex": "#003BE6"})).unwrap();
//! assert_eq!(settings.get("color.code.rgb[1]").unwrap(), Some(json!(179)));
//! settings.unset("color.code.hex").unwrap();
//! ```
//!
//! **Last write wins.** Nothing locks the file. With `atomic_save` on (the
//! default) concurrent writers can lose each other's changes but can never
//! leave a half-written file behind.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod flush;
pub mod notify;
pub mod path;
pub mod persist;
pub mod serializer;
pub mod settings;
pub mod strategy;
pub mod transport;
pub mod tree;

pub use config::{platform_user_data_dir, Config, ConfigUpdate};
pub use error::{Error, Result};
pub use flush::DebouncedStore;
pub use notify::{Change, ChangeKind};
pub use path::{KeyPath, Token};
pub use persist::DurableStore;
pub use settings::{Settings, SettingsBuilder};
pub use strategy::{Capability, DocumentChannel, Execution, LocalExecution, RemoteDispatch};
pub use transport::{ChannelTransport, PrivilegedHost};

/// The root settings object. Always an object, never an array or scalar.
pub type Document = serde_json::Map<String, serde_json::Value>;
