//! Declared attribute schemas for typed views
//!
//! Each view type declares a fixed list of attribute names and kinds on top
//! of its parent's. Synchronization only ever assigns declared attributes.

use std::collections::HashSet;

use vimview_invoke::WireValue;

use crate::error::InventoryError;

/// Shape of a declared attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    /// Single value, defaults to `Null`
    Scalar,
    /// Array value, defaults to an empty collection
    List,
}

impl AttributeKind {
    /// Default value before the first synchronization
    #[must_use]
    pub fn default_value(self) -> WireValue {
        match self {
            AttributeKind::Scalar => WireValue::Null,
            AttributeKind::List => WireValue::Collection(Vec::new()),
        }
    }
}

/// One declared attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeDecl {
    /// Property name as used by the server
    pub name: &'static str,
    /// Attribute shape
    pub kind: AttributeKind,
}

const fn scalar(name: &'static str) -> AttributeDecl {
    AttributeDecl {
        name,
        kind: AttributeKind::Scalar,
    }
}

const fn list(name: &'static str) -> AttributeDecl {
    AttributeDecl {
        name,
        kind: AttributeKind::List,
    }
}

/// Attribute schema of one view type
#[derive(Debug, PartialEq, Eq)]
pub struct Schema {
    /// Remote type name
    pub type_name: &'static str,
    /// Inherited schema
    pub parent: Option<&'static Schema>,
    /// Attributes declared by this type itself
    pub own: &'static [AttributeDecl],
}

impl Schema {
    /// All attributes, ancestors first
    #[must_use]
    pub fn attributes(&self) -> Vec<&AttributeDecl> {
        let mut chain = vec![self];
        let mut current = self.parent;
        while let Some(schema) = current {
            chain.push(schema);
            current = schema.parent;
        }
        chain.iter().rev().flat_map(|s| s.own.iter()).collect()
    }

    /// Kind of a declared attribute, if declared anywhere in the chain
    #[must_use]
    pub fn declares(&self, name: &str) -> Option<AttributeKind> {
        self.attributes()
            .into_iter()
            .find(|a| a.name == name)
            .map(|a| a.kind)
    }

    /// Whether this schema is, or inherits from, `type_name`
    #[must_use]
    pub fn is_a(&self, type_name: &str) -> bool {
        let mut current = Some(self);
        while let Some(schema) = current {
            if schema.type_name == type_name {
                return true;
            }
            current = schema.parent;
        }
        false
    }

    /// Check that no attribute is declared twice along the chain
    ///
    /// # Errors
    /// Returns `InventoryError::Schema` naming the duplicate.
    pub fn validate(&self) -> Result<(), InventoryError> {
        let mut seen = HashSet::new();
        for attr in self.attributes() {
            if !seen.insert(attr.name) {
                return Err(InventoryError::Schema(format!(
                    "{} declares attribute {} more than once",
                    self.type_name, attr.name
                )));
            }
        }
        Ok(())
    }
}

pub static EXTENSIBLE_MANAGED_OBJECT: Schema = Schema {
    type_name: "ExtensibleManagedObject",
    parent: None,
    own: &[list("availableField"), list("value")],
};

pub static MANAGED_ENTITY: Schema = Schema {
    type_name: "ManagedEntity",
    parent: Some(&EXTENSIBLE_MANAGED_OBJECT),
    own: &[
        scalar("alarmActionsEnabled"),
        list("configIssue"),
        scalar("configStatus"),
        list("customValue"),
        list("declaredAlarmState"),
        list("disabledMethod"),
        list("effectiveRole"),
        scalar("name"),
        scalar("overallStatus"),
        scalar("parent"),
        list("permission"),
        list("recentTask"),
        list("tag"),
        list("triggeredAlarmState"),
    ],
};

pub static FOLDER: Schema = Schema {
    type_name: "Folder",
    parent: Some(&MANAGED_ENTITY),
    own: &[list("childEntity"), list("childType")],
};

pub static DATACENTER: Schema = Schema {
    type_name: "Datacenter",
    parent: Some(&MANAGED_ENTITY),
    own: &[
        list("datastore"),
        scalar("datastoreFolder"),
        scalar("hostFolder"),
        list("network"),
        scalar("networkFolder"),
        scalar("vmFolder"),
    ],
};

pub static COMPUTE_RESOURCE: Schema = Schema {
    type_name: "ComputeResource",
    parent: Some(&MANAGED_ENTITY),
    own: &[
        scalar("configurationEx"),
        list("datastore"),
        scalar("environmentBrowser"),
        list("host"),
        list("network"),
        scalar("resourcePool"),
        scalar("summary"),
    ],
};

pub static CLUSTER_COMPUTE_RESOURCE: Schema = Schema {
    type_name: "ClusterComputeResource",
    parent: Some(&COMPUTE_RESOURCE),
    own: &[
        list("actionHistory"),
        scalar("configuration"),
        list("drsFault"),
        list("drsRecommendation"),
        list("migrationHistory"),
        list("recommendation"),
    ],
};

pub static RESOURCE_POOL: Schema = Schema {
    type_name: "ResourcePool",
    parent: Some(&MANAGED_ENTITY),
    own: &[
        list("childConfiguration"),
        scalar("config"),
        scalar("owner"),
        list("resourcePool"),
        scalar("runtime"),
        scalar("summary"),
        list("vm"),
    ],
};

pub static HOST_SYSTEM: Schema = Schema {
    type_name: "HostSystem",
    parent: Some(&MANAGED_ENTITY),
    own: &[
        scalar("capability"),
        scalar("config"),
        scalar("configManager"),
        list("datastore"),
        scalar("datastoreBrowser"),
        scalar("hardware"),
        list("network"),
        scalar("runtime"),
        scalar("summary"),
        scalar("systemResources"),
        list("vm"),
    ],
};

pub static VIRTUAL_MACHINE: Schema = Schema {
    type_name: "VirtualMachine",
    parent: Some(&MANAGED_ENTITY),
    own: &[
        scalar("capability"),
        scalar("config"),
        list("datastore"),
        scalar("environmentBrowser"),
        scalar("guest"),
        scalar("guestHeartbeatStatus"),
        scalar("layout"),
        scalar("layoutEx"),
        list("network"),
        scalar("resourceConfig"),
        scalar("resourcePool"),
        scalar("runtime"),
        scalar("snapshot"),
        scalar("storage"),
        scalar("summary"),
    ],
};

pub static DATASTORE: Schema = Schema {
    type_name: "Datastore",
    parent: Some(&MANAGED_ENTITY),
    own: &[
        scalar("browser"),
        scalar("capability"),
        list("host"),
        scalar("info"),
        scalar("summary"),
        list("vm"),
    ],
};

pub static TASK: Schema = Schema {
    type_name: "Task",
    parent: Some(&EXTENSIBLE_MANAGED_OBJECT),
    own: &[scalar("info")],
};
