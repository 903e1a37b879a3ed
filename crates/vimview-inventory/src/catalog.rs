//! Traversal catalog
//!
//! Eight named rules covering the inventory containment graph. Rules refer
//! to each other by name rather than by nesting, which lets a single query
//! recurse through folders of folders and pools of pools without knowing the
//! tree depth. The builtin catalog is built once and shared read-only.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::LazyLock;

use crate::error::InventoryError;
use crate::query::{SelectionSpec, TraversalSpec};

/// Folder → child entities
pub const FOLDER_CHILDREN: &str = "folder-children";
/// Datacenter → host folder
pub const DATACENTER_HOST_FOLDER: &str = "datacenter-host-folder";
/// Datacenter → VM folder
pub const DATACENTER_VM_FOLDER: &str = "datacenter-vm-folder";
/// Compute resource → hosts
pub const COMPUTE_RESOURCE_HOSTS: &str = "compute-resource-hosts";
/// Compute resource → root resource pool
pub const COMPUTE_RESOURCE_POOLS: &str = "compute-resource-pools";
/// Resource pool → child resource pools
pub const RESOURCE_POOL_CHILDREN: &str = "resource-pool-children";
/// Resource pool → VMs
pub const RESOURCE_POOL_VMS: &str = "resource-pool-vms";
/// Host → VMs
pub const HOST_VMS: &str = "host-vms";

static BUILTIN: LazyLock<TraversalCatalog> = LazyLock::new(|| {
    let catalog = TraversalCatalog::builtin();
    debug_assert!(catalog.validate().is_ok());
    catalog
});

/// The process-wide builtin catalog
#[must_use]
pub fn catalog() -> &'static TraversalCatalog {
    &BUILTIN
}

fn rule(name: &str, source_type: &str, relation_path: &str, nested: &[&str]) -> TraversalSpec {
    TraversalSpec {
        name: name.to_string(),
        source_type: source_type.to_string(),
        relation_path: relation_path.to_string(),
        skip: false,
        nested: nested.iter().map(|n| SelectionSpec::reference(*n)).collect(),
    }
}

/// Immutable set of named traversal rules
#[derive(Debug, Clone)]
pub struct TraversalCatalog {
    rules: Vec<TraversalSpec>,
    index: HashMap<String, usize>,
}

impl TraversalCatalog {
    /// Build a catalog from explicit rules
    ///
    /// Later rules with a duplicate name shadow earlier ones in lookups.
    #[must_use]
    pub fn from_rules(rules: Vec<TraversalSpec>) -> Self {
        let index = rules
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name.clone(), i))
            .collect();
        Self { rules, index }
    }

    fn builtin() -> Self {
        let pools = [RESOURCE_POOL_CHILDREN, RESOURCE_POOL_VMS];
        Self::from_rules(vec![
            rule(
                FOLDER_CHILDREN,
                "Folder",
                "childEntity",
                &[
                    FOLDER_CHILDREN,
                    DATACENTER_HOST_FOLDER,
                    DATACENTER_VM_FOLDER,
                    COMPUTE_RESOURCE_HOSTS,
                    COMPUTE_RESOURCE_POOLS,
                    RESOURCE_POOL_CHILDREN,
                    RESOURCE_POOL_VMS,
                    HOST_VMS,
                ],
            ),
            rule(DATACENTER_HOST_FOLDER, "Datacenter", "hostFolder", &[FOLDER_CHILDREN]),
            rule(DATACENTER_VM_FOLDER, "Datacenter", "vmFolder", &[FOLDER_CHILDREN]),
            rule(COMPUTE_RESOURCE_HOSTS, "ComputeResource", "host", &[HOST_VMS]),
            rule(COMPUTE_RESOURCE_POOLS, "ComputeResource", "resourcePool", &pools),
            rule(RESOURCE_POOL_CHILDREN, "ResourcePool", "resourcePool", &pools),
            rule(RESOURCE_POOL_VMS, "ResourcePool", "vm", &[]),
            rule(HOST_VMS, "HostSystem", "vm", &[]),
        ])
    }

    /// Look up a rule by name
    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&TraversalSpec> {
        self.index.get(name).map(|&i| &self.rules[i])
    }

    /// All rules, in definition order
    #[must_use]
    pub fn rules(&self) -> &[TraversalSpec] {
        &self.rules
    }

    /// The named rule and every rule reachable from it by name
    ///
    /// Breadth-first, in nested-selection order, each rule once. Unknown
    /// names are ignored here; `validate` reports them.
    #[must_use]
    pub fn reachable_from(&self, name: &str) -> Vec<&TraversalSpec> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([name]);
        let mut out = Vec::new();

        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            let Some(rule) = self.rule(current) else {
                continue;
            };
            out.push(rule);
            queue.extend(rule.nested.iter().map(SelectionSpec::name));
        }

        out
    }

    /// Check that every nested reference resolves to a rule in the catalog
    ///
    /// # Errors
    /// Returns `InventoryError::Schema` naming the first dangling reference.
    pub fn validate(&self) -> Result<(), InventoryError> {
        for rule in &self.rules {
            for nested in &rule.nested {
                if self.rule(nested.name()).is_none() {
                    return Err(InventoryError::Schema(format!(
                        "traversal rule {} references unknown rule {}",
                        rule.name,
                        nested.name()
                    )));
                }
            }
        }
        Ok(())
    }
}
