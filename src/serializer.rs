//! Document encoding. Compact or pretty JSON via serde_json.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::tree::kind;
use crate::Document;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::path::Path;

/// JSON encoder for whole settings documents.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JsonSerializer {
    indent: Option<usize>,
}

impl JsonSerializer {
    /// Compact JSON (single line, no extra whitespace).
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretty-printed JSON indented by `width` spaces per level. A width of
    /// zero falls back to compact output.
    pub fn pretty(width: usize) -> Self {
        Self {
            indent: (width > 0).then_some(width),
        }
    }

    /// Pick compact or pretty output the way `config` asks for it.
    pub fn from_config(config: &Config) -> Self {
        if config.prettify {
            Self::pretty(config.indent_width)
        } else {
            Self::new()
        }
    }

    /// Encode a document to bytes.
    pub fn serialize(&self, doc: &Document) -> Result<Vec<u8>> {
        match self.indent {
            None => serde_json::to_vec(doc).map_err(Error::from),
            Some(width) => {
                let indent = vec![b' '; width];
                let mut buf = Vec::with_capacity(128);
                let mut ser = serde_json::Serializer::with_formatter(
                    &mut buf,
                    PrettyFormatter::with_indent(&indent),
                );
                doc.serialize(&mut ser)?;
                Ok(buf)
            }
        }
    }

    /// Decode file contents. Anything that isn't a JSON object, including an
    /// empty file, is a corrupt document.
    pub fn deserialize(&self, bytes: &[u8], path: &Path) -> Result<Document> {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(doc)) => Ok(doc),
            Ok(other) => Err(Error::corrupt(
                path,
                format!("expected an object at the top level, found {}", kind(&other)),
            )),
            Err(e) => Err(Error::corrupt(path, e)),
        }
    }
}
