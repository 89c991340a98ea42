//! The session state tree.
//!
//! A session is a tree of [`SessionState`] nodes. Each node has a `kind`
//! (`"SESSION"` at the root, `"TRACK"`, `"PLUGIN"` and so on below it), an
//! ordered map of typed properties, and an ordered list of children.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Kind of the root node of every session.
pub const SESSION_KIND: &str = "SESSION";

/// Root property holding the session identifier.
pub const SESSION_ID_PROPERTY: &str = "sessionId";

/// Root property holding the version of the application that created the session.
pub const APP_VERSION_PROPERTY: &str = "appVersion";

/// Version stamped into newly created sessions.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A typed property value.
///
/// Floats must be finite to survive the JSON document format.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Double-precision float.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

impl PropertyValue {
    /// Returns the text, if this is a `Text` value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer, if this is an `Int` value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the float, widening `Int` values.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Returns the flag, if this is a `Bool` value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Short name of the value's type, for listings.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for PropertyValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

/// One node of the session tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// What this node describes.
    pub kind: String,
    /// Typed properties, ordered by key.
    pub properties: BTreeMap<String, PropertyValue>,
    /// Child nodes, in order.
    pub children: Vec<SessionState>,
}

impl SessionState {
    /// Creates an empty node of the given kind.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            properties: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Creates an empty session root stamped with the application version.
    pub fn new_session() -> Self {
        Self::new(SESSION_KIND).with_property(APP_VERSION_PROPERTY, APP_VERSION)
    }

    /// Builder-style [`set_property()`](Self::set_property).
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.set_property(key, value);
        self
    }

    /// Builder-style [`add_child()`](Self::add_child).
    pub fn with_child(mut self, child: SessionState) -> Self {
        self.add_child(child);
        self
    }

    /// Sets a property, returning the previous value.
    pub fn set_property(
        &mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Option<PropertyValue> {
        self.properties.insert(key.into(), value.into())
    }

    /// Returns a property.
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Removes a property, returning it.
    pub fn remove_property(&mut self, key: &str) -> Option<PropertyValue> {
        self.properties.remove(key)
    }

    /// Appends a child.
    pub fn add_child(&mut self, child: SessionState) {
        self.children.push(child);
    }

    /// Returns the first child of the given kind.
    pub fn child(&self, kind: &str) -> Option<&SessionState> {
        self.children.iter().find(|c| c.kind == kind)
    }

    /// Returns the first child of the given kind, appending one if there is none.
    pub fn child_or_insert(&mut self, kind: &str) -> &mut SessionState {
        let idx = match self.children.iter().position(|c| c.kind == kind) {
            Some(idx) => idx,
            None => {
                self.children.push(SessionState::new(kind));
                self.children.len() - 1
            }
        };
        &mut self.children[idx]
    }

    /// Returns true if this node is a session root.
    pub fn is_session(&self) -> bool {
        self.kind == SESSION_KIND
    }

    /// Returns the stamped session identifier.
    pub fn session_id(&self) -> Option<&str> {
        self.property(SESSION_ID_PROPERTY)
            .and_then(PropertyValue::as_text)
    }

    /// Returns the version of the application that created the session.
    pub fn app_version(&self) -> Option<&str> {
        self.property(APP_VERSION_PROPERTY)
            .and_then(PropertyValue::as_text)
    }

    /// Returns the number of nodes in the tree, this one included.
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(SessionState::node_count)
            .sum::<usize>()
    }
}
