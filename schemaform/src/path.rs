//! Slash-separated paths into form data.
//!
//! Paths are written like JSON pointers (`a/0/b` or `/a/0/b`, with `~0`/`~1`
//! escapes). Numeric segments address array positions and fall back to
//! object keys when the container is an object.

use std::fmt::{self, Display};

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{FormError, Result};

/// One step of a [`DataPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object property.
    Key(String),
    /// Array position.
    Index(usize),
}

impl PathSegment {
    fn parse(raw: &str) -> Self {
        let raw = raw.replace("~1", "/").replace("~0", "~");
        // RFC 6901 array indices: `0` or digits without a leading zero
        let canonical =
            raw.bytes().all(|b| b.is_ascii_digit()) && (raw == "0" || !raw.starts_with('0'));
        match raw.parse::<usize>() {
            Ok(idx) if canonical => PathSegment::Index(idx),
            _ => PathSegment::Key(raw),
        }
    }

    /// The segment as an object key.
    pub fn as_key(&self) -> String {
        match self {
            PathSegment::Key(k) => k.clone(),
            PathSegment::Index(i) => i.to_string(),
        }
    }
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, "{}", k.replace('~', "~0").replace('/', "~1")),
            PathSegment::Index(i) => write!(f, "{i}"),
        }
    }
}

/// Location of a value inside the form data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DataPath(Vec<PathSegment>);

impl DataPath {
    /// The empty path addressing the whole form value.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a slash-separated path. Empty segments are skipped.
    pub fn parse(s: &str) -> Self {
        Self(
            s.split('/')
                .filter(|seg| !seg.is_empty())
                .map(PathSegment::parse)
                .collect(),
        )
    }

    pub fn from_segments(segments: &[PathSegment]) -> Self {
        Self(segments.to_vec())
    }

    pub fn push_key(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(key.to_string()));
        Self(segments)
    }

    pub fn push_index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Walk the path into `value`.
    pub fn lookup<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        self.0.iter().try_fold(value, |current, seg| match (current, seg) {
            (Value::Object(map), seg) => map.get(&seg.as_key()),
            (Value::Array(items), PathSegment::Index(i)) => items.get(*i),
            _ => None,
        })
    }

    /// Return a copy of `root` with the slot at this path replaced by `new`.
    ///
    /// Missing objects along the way are created; array positions must exist.
    pub fn replace(&self, root: &Value, new: Value) -> Result<Value> {
        self.replace_from(root, 0, new)
    }

    fn replace_from(&self, current: &Value, depth: usize, new: Value) -> Result<Value> {
        let Some(seg) = self.0.get(depth) else {
            return Ok(new);
        };
        match current {
            Value::Array(items) => {
                let PathSegment::Index(idx) = seg else {
                    return Err(self.invalid(format!("`{seg}` is not an array index")));
                };
                let Some(child) = items.get(*idx) else {
                    return Err(self.invalid(format!(
                        "index {idx} out of bounds (len {})",
                        items.len()
                    )));
                };
                let replaced = self.replace_from(child, depth + 1, new)?;
                let mut items = items.clone();
                items[*idx] = replaced;
                Ok(Value::Array(items))
            }
            Value::Object(map) => {
                let key = seg.as_key();
                let child = map.get(&key).unwrap_or(&Value::Null);
                let replaced = self.replace_from(child, depth + 1, new)?;
                let mut map = map.clone();
                map.insert(key, replaced);
                Ok(Value::Object(map))
            }
            Value::Null => {
                let PathSegment::Key(key) = seg else {
                    return Err(self.invalid(format!("no array to index at `{seg}`")));
                };
                let replaced = self.replace_from(&Value::Null, depth + 1, new)?;
                let mut map = Map::new();
                map.insert(key.clone(), replaced);
                Ok(Value::Object(map))
            }
            other => Err(self.invalid(format!("cannot descend into scalar {other}"))),
        }
    }

    fn invalid(&self, reason: String) -> FormError {
        FormError::InvalidPath {
            path: self.to_string(),
            reason,
        }
    }
}

impl Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for seg in &self.0 {
            write!(f, "/{seg}")?;
        }
        Ok(())
    }
}

impl Serialize for DataPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<&str> for DataPath {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}
