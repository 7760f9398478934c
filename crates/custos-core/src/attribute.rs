//! Typed user attributes and per-service attribute schemas.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, SchemaResult};

/// The closed set of attribute value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    /// UTF-8 string.
    String,
    /// Signed 64-bit integer.
    Integer,
    /// Boolean flag.
    Boolean,
    /// List of strings.
    List,
}

impl AttributeKind {
    /// Returns the lowercase name used in manifests.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::List => "list",
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed attribute value.
///
/// Serialized untagged so bundles read naturally as JSON
/// (`{"budget_limit": 500, "regions": ["eu", "us"]}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Boolean flag.
    Boolean(bool),
    /// Signed 64-bit integer.
    Integer(i64),
    /// UTF-8 string.
    String(String),
    /// List of strings.
    List(Vec<String>),
}

impl AttributeValue {
    /// Returns the kind of this value.
    pub const fn kind(&self) -> AttributeKind {
        match self {
            Self::Boolean(_) => AttributeKind::Boolean,
            Self::Integer(_) => AttributeKind::Integer,
            Self::String(_) => AttributeKind::String,
            Self::List(_) => AttributeKind::List,
        }
    }

    /// Returns the string value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer value, if this is an integer.
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the boolean value, if this is a boolean.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the list value, if this is a list.
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns true if this value equals `other` or, when this value is a
    /// list, contains `other` as an element.
    pub fn matches(&self, other: &AttributeValue) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (Self::List(items), Self::String(s)) => items.iter().any(|item| item == s),
            _ => false,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::String(s) => f.write_str(s),
            Self::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// The attributes a service understands, with their declared kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeSchema {
    fields: BTreeMap<String, AttributeKind>,
}

impl AttributeSchema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a declared attribute.
    pub fn with(mut self, name: impl Into<String>, kind: AttributeKind) -> Self {
        self.fields.insert(name.into(), kind);
        self
    }

    /// Returns the declared kind of an attribute.
    pub fn kind_of(&self, name: &str) -> Option<AttributeKind> {
        self.fields.get(name).copied()
    }

    /// Iterates declared attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, AttributeKind)> {
        self.fields.iter().map(|(name, kind)| (name.as_str(), *kind))
    }

    /// Number of declared attributes.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no attributes are declared.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Validates a value against the declared kind of `name`.
    pub fn validate(&self, service: &str, name: &str, value: &AttributeValue) -> SchemaResult<()> {
        let expected = self
            .kind_of(name)
            .ok_or_else(|| SchemaError::unknown_attribute(service, name))?;

        if expected != value.kind() {
            return Err(SchemaError::TypeMismatch {
                attribute: name.to_string(),
                expected,
                actual: value.kind(),
            });
        }

        Ok(())
    }
}

impl FromIterator<(String, AttributeKind)> for AttributeSchema {
    fn from_iter<T: IntoIterator<Item = (String, AttributeKind)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn billing_schema() -> AttributeSchema {
        AttributeSchema::new()
            .with("budget_limit", AttributeKind::Integer)
            .with("cost_center", AttributeKind::String)
            .with("regions", AttributeKind::List)
    }

    #[test]
    fn test_validate_accepts_matching_kind() {
        let schema = billing_schema();
        assert!(schema
            .validate("billing_api", "budget_limit", &AttributeValue::Integer(500))
            .is_ok());
    }

    #[test]
    fn test_validate_rejects_mismatch() {
        let schema = billing_schema();
        let err = schema
            .validate("billing_api", "budget_limit", &"not-a-number".into())
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::TypeMismatch {
                attribute: "budget_limit".to_string(),
                expected: AttributeKind::Integer,
                actual: AttributeKind::String,
            }
        );
    }

    #[test]
    fn test_validate_rejects_unknown() {
        let schema = billing_schema();
        let err = schema
            .validate("billing_api", "shoe_size", &AttributeValue::Integer(44))
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownAttribute { .. }));
    }

    #[test]
    fn test_untagged_json_shape() {
        let values = vec![
            AttributeValue::Boolean(true),
            AttributeValue::Integer(7),
            AttributeValue::String("eu".to_string()),
            AttributeValue::List(vec!["a".to_string(), "b".to_string()]),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[true,7,"eu",["a","b"]]"#);
        let back: Vec<AttributeValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn test_list_matches_member() {
        let regions = AttributeValue::List(vec!["eu".to_string(), "us".to_string()]);
        assert!(regions.matches(&"eu".into()));
        assert!(!regions.matches(&"apac".into()));
        assert!(!AttributeValue::Integer(1).matches(&AttributeValue::Boolean(true)));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(AttributeKind::List.to_string(), "list");
        let kind: AttributeKind = serde_json::from_str("\"integer\"").unwrap();
        assert_eq!(kind, AttributeKind::Integer);
    }
}
