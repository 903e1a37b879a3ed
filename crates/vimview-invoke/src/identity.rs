//! Remote object identity

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InvokeError;

/// Opaque handle naming exactly one server-side object
///
/// Two identities are equal when both the remote type and the value match.
/// An identity never carries a snapshot of the object's data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectIdentity {
    /// Remote type name (e.g. `Folder`, `VirtualMachine`)
    #[serde(rename = "type")]
    remote_type: String,
    /// Server-assigned value (e.g. `group-d1`, `vm-42`)
    value: String,
}

impl ObjectIdentity {
    /// Create a new identity
    pub fn new(remote_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            remote_type: remote_type.into(),
            value: value.into(),
        }
    }

    /// The well-known service instance singleton
    #[must_use]
    pub fn service_instance() -> Self {
        Self::new("ServiceInstance", "ServiceInstance")
    }

    /// Remote type name
    #[must_use]
    pub fn remote_type(&self) -> &str {
        &self.remote_type
    }

    /// Server-assigned value
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.remote_type, self.value)
    }
}

/// Parses the `Type:value` form produced by `Display`
impl FromStr for ObjectIdentity {
    type Err = InvokeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((ty, value)) if !ty.is_empty() && !value.is_empty() => Ok(Self::new(ty, value)),
            _ => Err(InvokeError::ConfigError(format!(
                "expected TYPE:VALUE object identity, got {s:?}"
            ))),
        }
    }
}
