//! Walking a JSON tree with resolved tokens.
//!
//! Reads never fail: a step that can't be satisfied just means "absent".
//! Writes create missing objects along the way but never grow arrays past
//! their end.

use crate::error::{Error, Result};
use crate::path::Token;
use serde_json::{Map, Value};

/// `true` if every token can be followed from `root`. The empty path always
/// exists.
pub fn has(root: &Value, tokens: &[Token]) -> bool {
    get(root, tokens).is_some()
}

/// Follow `tokens` from `root`, returning `None` at the first step that
/// doesn't exist.
pub fn get<'tree>(root: &'tree Value, tokens: &[Token]) -> Option<&'tree Value> {
    let mut cursor = root;
    for token in tokens {
        cursor = step(cursor, token)?;
    }
    Some(cursor)
}

fn step<'tree>(node: &'tree Value, token: &Token) -> Option<&'tree Value> {
    match (node, token) {
        (Value::Object(map), Token::Key(k)) => map.get(k),
        (Value::Array(arr), Token::Index(i)) => arr.get(*i),
        _ => None,
    }
}

fn step_mut<'tree>(node: &'tree mut Value, token: &Token) -> Option<&'tree mut Value> {
    match (node, token) {
        (Value::Object(map), Token::Key(k)) => map.get_mut(k),
        (Value::Array(arr), Token::Index(i)) => arr.get_mut(*i),
        _ => None,
    }
}

/// Assign `value` at `tokens`.
///
/// With no tokens the root itself is replaced, and the new root must be an
/// object. Missing (or non-object) nodes at key steps become empty objects;
/// index steps must land inside an existing array, except that the final
/// index may equal the length to append.
///
/// On error the tree may already contain objects created along the way;
/// callers that care work on a copy.
pub fn set(root: &mut Value, tokens: &[Token], value: Value) -> Result<()> {
    let Some((last, parents)) = tokens.split_last() else {
        if !value.is_object() {
            return Err(Error::InvalidRootValue(kind(&value)));
        }
        *root = value;
        return Ok(());
    };

    let mut cursor = root;
    for token in parents {
        cursor = match token {
            Token::Key(k) => as_object(cursor)
                .entry(k.clone())
                .or_insert_with(|| Value::Object(Map::new())),
            Token::Index(i) => match cursor {
                Value::Array(arr) => {
                    let len = arr.len();
                    arr.get_mut(*i).ok_or(Error::InvalidArrayIndex {
                        index: *i,
                        len: Some(len),
                    })?
                }
                _ => {
                    return Err(Error::InvalidArrayIndex {
                        index: *i,
                        len: None,
                    })
                }
            },
        };
    }

    match last {
        Token::Key(k) => {
            as_object(cursor).insert(k.clone(), value);
        }
        Token::Index(i) => match cursor {
            Value::Array(arr) if *i < arr.len() => arr[*i] = value,
            Value::Array(arr) if *i == arr.len() => arr.push(value),
            Value::Array(arr) => {
                return Err(Error::InvalidArrayIndex {
                    index: *i,
                    len: Some(arr.len()),
                })
            }
            _ => {
                return Err(Error::InvalidArrayIndex {
                    index: *i,
                    len: None,
                })
            }
        },
    }
    Ok(())
}

/// Remove whatever `tokens` points at. Returns `false` if there was nothing
/// there. With no tokens the root is emptied.
///
/// Removing an array element shifts the elements after it down by one.
pub fn delete(root: &mut Value, tokens: &[Token]) -> bool {
    let Some((last, parents)) = tokens.split_last() else {
        *root = Value::Object(Map::new());
        return true;
    };

    let mut cursor = root;
    for token in parents {
        match step_mut(cursor, token) {
            Some(next) => cursor = next,
            None => return false,
        }
    }

    match (cursor, last) {
        (Value::Object(map), Token::Key(k)) => map.shift_remove(k).is_some(),
        (Value::Array(arr), Token::Index(i)) if *i < arr.len() => {
            arr.remove(*i);
            true
        }
        _ => false,
    }
}

// Coerce a node into an object, replacing whatever was there.
fn as_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

/// Short JSON type name, for error messages.
pub(crate) fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
