//! Path/operator predicates over entry documents
//!
//! A [`Filter`] is a single `(dotted.path, operator, value)` triple. The path is
//! walked through the JSON form of a document: object segments select a key,
//! numeric segments index into arrays, and any other segment applied to an
//! array fans out over every element (so `resources.unit` matches if any
//! resource has a matching `unit`). Scalars are compared by their string form.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::error::{CatalogError, Result};

/// Comparison applied to the value found at the path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equals,
    Prefix,
    Suffix,
    Contains,
}

impl FromStr for FilterOp {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "equals" => Ok(FilterOp::Equals),
            "prefix" => Ok(FilterOp::Prefix),
            "suffix" => Ok(FilterOp::Suffix),
            "contains" => Ok(FilterOp::Contains),
            other => Err(CatalogError::BadRequest(format!(
                "unknown filter operator: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterOp::Equals => "equals",
            FilterOp::Prefix => "prefix",
            FilterOp::Suffix => "suffix",
            FilterOp::Contains => "contains",
        };
        f.write_str(name)
    }
}

/// A single path predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    path: Vec<String>,
    op: FilterOp,
    value: String,
}

impl Filter {
    /// Build a filter, rejecting empty paths and unknown operators
    pub fn new(path: &str, op: &str, value: impl Into<String>) -> Result<Self> {
        let path: Vec<String> = path.split('.').map(str::to_string).collect();
        if path.iter().any(String::is_empty) {
            return Err(CatalogError::BadRequest(format!(
                "invalid filter path: {:?}",
                path.join(".")
            )));
        }

        Ok(Self {
            path,
            op: op.parse()?,
            value: value.into(),
        })
    }

    /// The operator
    pub fn op(&self) -> FilterOp {
        self.op
    }

    /// Evaluate against a JSON document
    pub fn matches(&self, doc: &Value) -> bool {
        let mut found = Vec::new();
        resolve(doc, &self.path, &mut found);
        found.into_iter().any(|value| self.matches_leaf(value))
    }

    /// Evaluate against any serializable document
    pub fn matches_document<T: Serialize>(&self, doc: &T) -> Result<bool> {
        Ok(self.matches(&serde_json::to_value(doc)?))
    }

    fn matches_leaf(&self, value: &Value) -> bool {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Array(items) => return items.iter().any(|item| self.matches_leaf(item)),
            Value::Null | Value::Object(_) => return false,
        };

        match self.op {
            FilterOp::Equals => text == self.value,
            FilterOp::Prefix => text.starts_with(&self.value),
            FilterOp::Suffix => text.ends_with(&self.value),
            FilterOp::Contains => text.contains(&self.value),
        }
    }
}

fn resolve<'a>(value: &'a Value, path: &[String], found: &mut Vec<&'a Value>) {
    let Some((segment, rest)) = path.split_first() else {
        found.push(value);
        return;
    };

    match value {
        Value::Object(map) => {
            if let Some(child) = map.get(segment) {
                resolve(child, rest, found);
            }
        }
        Value::Array(items) => match segment.parse::<usize>() {
            Ok(index) => {
                if let Some(child) = items.get(index) {
                    resolve(child, rest, found);
                }
            }
            Err(_) => {
                for item in items {
                    resolve(item, path, found);
                }
            }
        },
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc() -> Value {
        json!({
            "id": "entry:1",
            "name": "Kitchen thermostat",
            "ttl": 30,
            "meta": { "room": "kitchen", "floor": 2, "online": true },
            "resources": [
                { "id": "r1", "unit": "celsius" },
                { "id": "r2", "unit": "percent" }
            ]
        })
    }

    #[test]
    fn test_operators() {
        let doc = doc();
        assert!(Filter::new("name", "equals", "Kitchen thermostat").unwrap().matches(&doc));
        assert!(Filter::new("name", "prefix", "Kitchen").unwrap().matches(&doc));
        assert!(Filter::new("name", "suffix", "stat").unwrap().matches(&doc));
        assert!(Filter::new("name", "contains", "hen th").unwrap().matches(&doc));
        assert!(!Filter::new("name", "prefix", "thermo").unwrap().matches(&doc));
    }

    #[test]
    fn test_nested_and_scalar_paths() {
        let doc = doc();
        assert!(Filter::new("meta.room", "equals", "kitchen").unwrap().matches(&doc));
        assert!(Filter::new("meta.floor", "equals", "2").unwrap().matches(&doc));
        assert!(Filter::new("meta.online", "equals", "true").unwrap().matches(&doc));
        assert!(Filter::new("ttl", "equals", "30").unwrap().matches(&doc));
        assert!(!Filter::new("meta.missing", "equals", "x").unwrap().matches(&doc));
        assert!(!Filter::new("meta", "equals", "kitchen").unwrap().matches(&doc));
    }

    #[test]
    fn test_array_paths() {
        let doc = doc();
        assert!(Filter::new("resources.1.unit", "equals", "percent").unwrap().matches(&doc));
        assert!(!Filter::new("resources.0.unit", "equals", "percent").unwrap().matches(&doc));
        assert!(Filter::new("resources.unit", "equals", "percent").unwrap().matches(&doc));
        assert!(!Filter::new("resources.5.unit", "equals", "percent").unwrap().matches(&doc));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            Filter::new("name", "regex", "x"),
            Err(CatalogError::BadRequest(_))
        ));
        assert!(matches!(
            Filter::new("meta..room", "equals", "x"),
            Err(CatalogError::BadRequest(_))
        ));
        assert!(matches!(
            Filter::new("", "equals", "x"),
            Err(CatalogError::BadRequest(_))
        ));
    }

    #[test]
    fn test_op_display_round_trips() {
        for op in ["equals", "prefix", "suffix", "contains"] {
            assert_eq!(op.parse::<FilterOp>().unwrap().to_string(), op);
        }
    }
}
