//! Property Value Model — the tagged-union representation of parsed
//! blueprint data, shared by the parser, the defaults resolver and the
//! graph builder.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A parsed blueprint property value.
///
/// The blueprint language is dynamically shaped, but the subset this
/// crate handles is closed: every consumer pattern-matches exhaustively
/// on these five variants instead of probing types at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    String(String),
    Bool(bool),
    Integer(i64),
    List(Vec<PropertyValue>),
    /// A nested `{ ... }` block (arch/os-scoped overrides). Carried
    /// through opaquely; its contents never feed edge resolution.
    Block(Properties),
}

impl PropertyValue {
    /// The value as a string slice, if it is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a list slice, if it is a `List`.
    pub fn as_list(&self) -> Option<&[PropertyValue]> {
        match self {
            PropertyValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// The string items of this value: a `String` yields itself, a
    /// `List` yields its string elements. Everything else is empty.
    pub fn string_items(&self) -> Vec<&str> {
        match self {
            PropertyValue::String(s) => vec![s.as_str()],
            PropertyValue::List(items) => {
                items.iter().filter_map(PropertyValue::as_str).collect()
            }
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(s) => write!(f, "\"{s}\""),
            PropertyValue::Bool(b) => write!(f, "{b}"),
            PropertyValue::Integer(i) => write!(f, "{i}"),
            PropertyValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            PropertyValue::Block(props) => {
                write!(f, "{{")?;
                for (i, (key, value)) in props.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// An insertion-ordered property bag.
///
/// Iteration order is the declaration order in the blueprint file. Edge
/// creation and the defaults merge both depend on that order, so a
/// hash-ordered map is not an option here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Properties(Vec<(String, PropertyValue)>);

impl Properties {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Look up a property by name.
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert a property, replacing an existing value in place (the
    /// original position is kept) or appending a new key at the end.
    pub fn insert(&mut self, key: impl Into<String>, value: PropertyValue) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((key, value)),
        }
    }

    /// Drop a property, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        let pos = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(pos).1)
    }

    /// Iterate `(name, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &(String, PropertyValue)> + '_ {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, PropertyValue)> for Properties {
    fn from_iter<T: IntoIterator<Item = (String, PropertyValue)>>(iter: T) -> Self {
        let mut props = Properties::new();
        for (key, value) in iter {
            props.insert(key, value);
        }
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_preserves_declaration_order() {
        let mut props = Properties::new();
        props.insert("srcs", PropertyValue::List(vec![]));
        props.insert("static_libs", PropertyValue::List(vec![]));
        props.insert("name", PropertyValue::String("late".into()));

        let keys: Vec<&str> = props.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["srcs", "static_libs", "name"]);
    }

    #[test]
    fn test_insert_overwrites_in_place() {
        let mut props = Properties::new();
        props.insert("a", PropertyValue::Integer(1));
        props.insert("b", PropertyValue::Integer(2));
        props.insert("a", PropertyValue::Integer(3));

        assert_eq!(props.get("a"), Some(&PropertyValue::Integer(3)));
        let keys: Vec<&str> = props.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_string_items() {
        let value = PropertyValue::List(vec![
            PropertyValue::String("a.cc".into()),
            PropertyValue::Bool(true),
            PropertyValue::String("b.cc".into()),
        ]);
        assert_eq!(value.string_items(), vec!["a.cc", "b.cc"]);

        let single = PropertyValue::String("only".into());
        assert_eq!(single.string_items(), vec!["only"]);
    }
}
