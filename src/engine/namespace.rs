// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Shared variable namespace for one notebook.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::EvalError;

/// Value types that can be bound in the shared namespace
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// String value (also used for pattern source expressions)
    String(String),
    /// List of values
    List(Vec<Value>),
}

impl Value {
    /// Get as float, converting integers
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as integer, truncating floats
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// Get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// Name → value bindings, ordered by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace {
    bindings: BTreeMap<String, Value>,
}

impl Namespace {
    /// Create an empty namespace
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a name, returning the previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.bindings.insert(name.into(), value.into())
    }

    /// Builder form of [`Namespace::insert`]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Get a binding
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    /// Get a binding, reporting a miss as an undefined reference
    pub fn lookup(&self, name: &str) -> Result<&Value, EvalError> {
        self.bindings
            .get(name)
            .ok_or_else(|| EvalError::UndefinedReference {
                name: name.to_string(),
            })
    }

    /// Check whether a name is bound
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Merge another namespace into this one; incoming bindings win.
    ///
    /// Returns the names that were added or changed.
    pub fn merge(&mut self, other: Namespace) -> Vec<String> {
        let mut changed = Vec::new();
        for (name, value) in other.bindings {
            if self.bindings.get(&name) != Some(&value) {
                changed.push(name.clone());
                self.bindings.insert(name, value);
            }
        }
        changed
    }

    /// Remove all bindings
    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    /// Number of bindings
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Iterate over bound names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    /// Iterate over bindings in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_later_wins() {
        let mut ns = Namespace::new().with("tempo", 0.5).with("root", "c3");

        let changed = ns.merge(Namespace::new().with("root", "e3").with("tempo", 0.5).with("bars", 4i64));

        // Unchanged tempo is not reported
        assert_eq!(changed, vec!["bars".to_string(), "root".to_string()]);
        assert_eq!(ns.get("root"), Some(&Value::from("e3")));
        assert_eq!(ns.len(), 3);
    }

    #[test]
    fn test_lookup_miss() {
        let ns = Namespace::new().with("drums", "s(\"bd sd\")");
        assert!(ns.lookup("drums").is_ok());

        let err = ns.lookup("bass").unwrap_err();
        assert_eq!(
            err,
            EvalError::UndefinedReference {
                name: "bass".to_string()
            }
        );
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::Int(3).as_float(), Some(3.0));
        assert_eq!(Value::Float(2.9).as_int(), Some(2));
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Bool(true).as_float(), None);
    }

    #[test]
    fn test_names_are_ordered() {
        let ns = Namespace::new().with("z", 1i64).with("a", 2i64).with("m", 3i64);
        let names: Vec<&str> = ns.names().collect();
        assert_eq!(names, vec!["a", "m", "z"]);
    }
}
