//! Key paths: parsing dotted/bracketed strings into access tokens.
//!
//! A key path is either text like `color.code.rgb[1]` or an explicit list of
//! [`Token`]s. Text uses `.` as the separator, `\.` for a literal dot inside a
//! key and trailing `[n]` suffixes for array indices. Token lists are taken
//! verbatim, which is how you address keys that contain dots or brackets.
//!
//! The empty string, the single string `"."` and the empty list all denote the
//! document root.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One resolved step into the document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Token {
    /// Object member access.
    Key(String),
    /// Array element access.
    Index(usize),
}

impl Token {
    /// Create a key token.
    #[inline]
    pub fn key(k: impl Into<String>) -> Self {
        Token::Key(k.into())
    }

    /// Create an index token.
    #[inline]
    pub fn index(i: usize) -> Self {
        Token::Index(i)
    }

    /// Parse one element of a structured path.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(Token::Key(s.clone())),
            Value::Number(n) => n
                .as_u64()
                .and_then(|i| usize::try_from(i).ok())
                .map(Token::Index)
                .ok_or_else(|| Error::InvalidPathSegment(format!("{n} is not an array index"))),
            other => Err(Error::InvalidPathSegment(format!(
                "{other} is neither a string nor an integer"
            ))),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Key(k) => write!(f, ".{k}"),
            Token::Index(i) => write!(f, "[{i}]"),
        }
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Token::Key(s.to_owned())
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Token::Key(s)
    }
}

impl From<usize> for Token {
    fn from(i: usize) -> Self {
        Token::Index(i)
    }
}

/// Address of a location inside the settings document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyPath {
    /// Dotted/bracketed text, parsed on resolve.
    Text(String),
    /// Explicit tokens, used as-is.
    Tokens(Vec<Token>),
}

impl KeyPath {
    /// The document root.
    pub fn root() -> Self {
        KeyPath::Tokens(Vec::new())
    }

    /// Turn this path into the tokens a tree walk consumes.
    pub fn resolve(&self) -> Vec<Token> {
        match self {
            KeyPath::Text(text) => parse(text),
            KeyPath::Tokens(tokens) => tokens.clone(),
        }
    }

    /// `true` when the path addresses the whole document.
    pub fn is_root(&self) -> bool {
        match self {
            KeyPath::Text(text) => text.is_empty() || text == ".",
            KeyPath::Tokens(tokens) => tokens.is_empty(),
        }
    }
}

impl Default for KeyPath {
    fn default() -> Self {
        KeyPath::root()
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPath::Text(text) => f.write_str(text),
            KeyPath::Tokens(tokens) => f.write_str(&to_text(tokens)),
        }
    }
}

impl From<&str> for KeyPath {
    fn from(s: &str) -> Self {
        KeyPath::Text(s.to_owned())
    }
}

impl From<String> for KeyPath {
    fn from(s: String) -> Self {
        KeyPath::Text(s)
    }
}

impl From<&String> for KeyPath {
    fn from(s: &String) -> Self {
        KeyPath::Text(s.clone())
    }
}

impl From<Vec<Token>> for KeyPath {
    fn from(tokens: Vec<Token>) -> Self {
        KeyPath::Tokens(tokens)
    }
}

impl From<&[Token]> for KeyPath {
    fn from(tokens: &[Token]) -> Self {
        KeyPath::Tokens(tokens.to_vec())
    }
}

impl<const N: usize> From<[Token; N]> for KeyPath {
    fn from(tokens: [Token; N]) -> Self {
        KeyPath::Tokens(tokens.into())
    }
}

impl TryFrom<Value> for KeyPath {
    type Error = Error;

    /// Accepts `null` (root), a string, or an array of strings and
    /// non-negative integers.
    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(KeyPath::root()),
            Value::String(s) => Ok(KeyPath::Text(s)),
            Value::Array(items) => items
                .iter()
                .map(Token::from_json)
                .collect::<Result<Vec<_>>>()
                .map(KeyPath::Tokens),
            other => Err(Error::InvalidPathSegment(format!(
                "{other} is not a key path"
            ))),
        }
    }
}

/// Resolve any key path into tokens.
pub fn resolve(path: impl Into<KeyPath>) -> Vec<Token> {
    path.into().resolve()
}

/// Parse dotted/bracketed text. Never fails: anything that is not a valid
/// index suffix stays part of the key name.
pub fn parse(text: &str) -> Vec<Token> {
    if text.is_empty() || text == "." {
        return Vec::new();
    }
    let mut tokens = Vec::new();
    for segment in split_unescaped(text) {
        push_segment(segment, &mut tokens);
    }
    tokens
}

/// Render tokens back to text that [`parse`] reads as the same tokens, as
/// long as no key ends in something that looks like an index suffix and no
/// empty key sits right before an index. An empty key renders as nothing, so
/// `[Key(""), Index(0)]` comes out as `[0]` and `[Key("")]` alone as the
/// root. Keep such paths as tokens.
pub fn to_text(tokens: &[Token]) -> String {
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::Key(k) => {
                if i > 0 {
                    out.push('.');
                }
                out.push_str(&k.replace('.', "\\."));
            }
            Token::Index(idx) => {
                out.push('[');
                out.push_str(&idx.to_string());
                out.push(']');
            }
        }
    }
    out
}

// Split on `.` not preceded by `\`, turning `\.` back into `.`.
fn split_unescaped(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'.') => {
                current.push('.');
                chars.next();
            }
            '.' => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    segments.push(current);
    segments
}

fn push_segment(segment: String, out: &mut Vec<Token>) {
    let mut rest = segment.as_str();
    let mut indices = Vec::new();
    while let Some((head, index)) = strip_index_suffix(rest) {
        indices.push(index);
        rest = head;
    }
    if indices.is_empty() {
        out.push(Token::Key(segment));
        return;
    }
    if !rest.is_empty() {
        out.push(Token::Key(rest.to_owned()));
    }
    out.extend(indices.into_iter().rev().map(Token::Index));
}

fn strip_index_suffix(s: &str) -> Option<(&str, usize)> {
    let body = s.strip_suffix(']')?;
    let open = body.rfind('[')?;
    let digits = &body[open + 1..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index = digits.parse().ok()?;
    Some((&s[..open], index))
}
