//! Tagged wire values
//!
//! Every property value the server returns is carried as a `WireValue`.
//! Homogeneous arrays are tagged as `Collection` by the transport, so callers
//! never have to guess whether a value is a sequence.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::identity::ObjectIdentity;

/// A value as exchanged with the management service
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum WireValue {
    /// Unset / absent value
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Reference to another managed object
    Reference(ObjectIdentity),
    /// Structured data object (e.g. `TaskInfo`, `VirtualMachineSummary`)
    Data(DataObject),
    /// Homogeneous array (`ArrayOf*` on the wire)
    Collection(Vec<WireValue>),
}

impl WireValue {
    /// Whether the value carries no information
    ///
    /// `Null`, empty text, empty collections and data objects without
    /// fields are empty. Booleans and numbers never are.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            WireValue::Null => true,
            WireValue::Text(s) => s.is_empty(),
            WireValue::Collection(items) => items.is_empty(),
            WireValue::Data(data) => data.fields.is_empty(),
            WireValue::Bool(_) | WireValue::Int(_) | WireValue::Float(_) | WireValue::Reference(_) => {
                false
            }
        }
    }

    /// Text content
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            WireValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean content
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            WireValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer content
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            WireValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Referenced object
    #[must_use]
    pub fn as_reference(&self) -> Option<&ObjectIdentity> {
        match self {
            WireValue::Reference(id) => Some(id),
            _ => None,
        }
    }

    /// Structured data object
    #[must_use]
    pub fn as_data(&self) -> Option<&DataObject> {
        match self {
            WireValue::Data(data) => Some(data),
            _ => None,
        }
    }

    /// Collection items
    #[must_use]
    pub fn as_collection(&self) -> Option<&[WireValue]> {
        match self {
            WireValue::Collection(items) => Some(items),
            _ => None,
        }
    }

    /// All object references held by this value
    ///
    /// A single reference yields one entry, a collection yields every
    /// reference it contains, anything else yields none.
    #[must_use]
    pub fn references(&self) -> Vec<&ObjectIdentity> {
        match self {
            WireValue::Reference(id) => vec![id],
            WireValue::Collection(items) => items.iter().filter_map(WireValue::as_reference).collect(),
            _ => Vec::new(),
        }
    }
}

impl From<&str> for WireValue {
    fn from(s: &str) -> Self {
        WireValue::Text(s.to_string())
    }
}

impl From<String> for WireValue {
    fn from(s: String) -> Self {
        WireValue::Text(s)
    }
}

impl From<ObjectIdentity> for WireValue {
    fn from(id: ObjectIdentity) -> Self {
        WireValue::Reference(id)
    }
}

impl From<DataObject> for WireValue {
    fn from(data: DataObject) -> Self {
        WireValue::Data(data)
    }
}

/// Structured data object with a declared type name
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataObject {
    /// Declared data type (e.g. `TaskInfo`)
    #[serde(rename = "type")]
    pub type_name: String,
    /// Named fields
    #[serde(default)]
    pub fields: BTreeMap<String, WireValue>,
}

impl DataObject {
    /// Create an empty data object of the given type
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Add a field
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<WireValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Look up a field
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&WireValue> {
        self.fields.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emptiness() {
        assert!(WireValue::Null.is_empty());
        assert!(WireValue::Text(String::new()).is_empty());
        assert!(WireValue::Collection(vec![]).is_empty());
        assert!(WireValue::Data(DataObject::new("Summary")).is_empty());

        assert!(!WireValue::Bool(false).is_empty());
        assert!(!WireValue::Int(0).is_empty());
        assert!(!WireValue::from("vm-1").is_empty());
    }

    #[test]
    fn test_references() {
        let a = ObjectIdentity::new("VirtualMachine", "vm-1");
        let b = ObjectIdentity::new("VirtualMachine", "vm-2");
        let list = WireValue::Collection(vec![a.clone().into(), WireValue::Int(3), b.clone().into()]);

        assert_eq!(list.references(), vec![&a, &b]);
        assert_eq!(WireValue::from(a.clone()).references(), vec![&a]);
        assert!(WireValue::from("x").references().is_empty());
    }

    #[test]
    fn test_tagged_json() {
        let value = WireValue::Collection(vec![
            WireValue::Reference(ObjectIdentity::new("HostSystem", "host-9")),
            WireValue::Null,
        ]);
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "kind": "collection",
                "value": [
                    {"kind": "reference", "value": {"type": "HostSystem", "value": "host-9"}},
                    {"kind": "null"}
                ]
            })
        );
        let back: WireValue = serde_json::from_value(json).unwrap();
        assert_eq!(back, value);
    }
}
