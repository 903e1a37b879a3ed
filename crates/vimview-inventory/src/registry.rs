//! Closed registry of view types
//!
//! Maps remote type names to view constructors. The set is fixed at compile
//! time; a name outside it is an `UnknownType` error rather than a fallback.

use std::fmt;
use std::sync::{Arc, LazyLock};

use tracing::{debug, instrument};
use vimview_invoke::ObjectIdentity;

use crate::catalog::{TraversalCatalog, catalog};
use crate::entities::{
    ClusterComputeResource, ClusterComputeResourceKind, ComputeResource, ComputeResourceKind,
    Datacenter, DatacenterKind, Datastore, DatastoreKind, Folder, FolderKind, HostSystem,
    HostSystemKind, ResourcePool, ResourcePoolKind, Task, TaskKind, VirtualMachine,
    VirtualMachineKind,
};
use crate::error::InventoryError;
use crate::query::ObjectContent;
use crate::schema::{self, Schema};
use crate::session::Session;
use crate::view::{AttributeBag, SyncReport, View, ViewKind};

/// Registered remote types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    Folder,
    Datacenter,
    ComputeResource,
    ClusterComputeResource,
    ResourcePool,
    HostSystem,
    VirtualMachine,
    Datastore,
    Task,
}

impl EntityType {
    /// Every registered type
    pub const ALL: [EntityType; 9] = [
        EntityType::Folder,
        EntityType::Datacenter,
        EntityType::ComputeResource,
        EntityType::ClusterComputeResource,
        EntityType::ResourcePool,
        EntityType::HostSystem,
        EntityType::VirtualMachine,
        EntityType::Datastore,
        EntityType::Task,
    ];

    /// Types accepted by inventory searches
    pub const SEARCHABLE: [EntityType; 7] = [
        EntityType::Folder,
        EntityType::Datacenter,
        EntityType::ComputeResource,
        EntityType::ClusterComputeResource,
        EntityType::ResourcePool,
        EntityType::HostSystem,
        EntityType::VirtualMachine,
    ];

    /// Remote type name
    #[must_use]
    pub fn type_name(self) -> &'static str {
        self.schema().type_name
    }

    /// Look up a type by its remote name
    #[must_use]
    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.type_name() == name)
    }

    /// Declared attribute schema
    #[must_use]
    pub fn schema(self) -> &'static Schema {
        match self {
            EntityType::Folder => &schema::FOLDER,
            EntityType::Datacenter => &schema::DATACENTER,
            EntityType::ComputeResource => &schema::COMPUTE_RESOURCE,
            EntityType::ClusterComputeResource => &schema::CLUSTER_COMPUTE_RESOURCE,
            EntityType::ResourcePool => &schema::RESOURCE_POOL,
            EntityType::HostSystem => &schema::HOST_SYSTEM,
            EntityType::VirtualMachine => &schema::VIRTUAL_MACHINE,
            EntityType::Datastore => &schema::DATASTORE,
            EntityType::Task => &schema::TASK,
        }
    }

    /// Whether inventory searches accept this type
    #[must_use]
    pub fn is_searchable(self) -> bool {
        Self::SEARCHABLE.contains(&self)
    }

    /// Resolve a type name for an inventory search
    ///
    /// # Errors
    /// Returns `InventoryError::UnsupportedEntityType` for any name outside
    /// the searchable set, registered or not.
    pub fn searchable(name: &str) -> Result<Self, InventoryError> {
        Self::from_type_name(name)
            .filter(|t| t.is_searchable())
            .ok_or_else(|| InventoryError::UnsupportedEntityType(name.to_string()))
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A view of any registered type
#[derive(Debug, Clone)]
pub enum ManagedObject {
    Folder(Folder),
    Datacenter(Datacenter),
    ComputeResource(ComputeResource),
    ClusterComputeResource(ClusterComputeResource),
    ResourcePool(ResourcePool),
    HostSystem(HostSystem),
    VirtualMachine(VirtualMachine),
    Datastore(Datastore),
    Task(Task),
}

macro_rules! dispatch {
    ($object:expr, $view:ident => $body:expr) => {
        match $object {
            ManagedObject::Folder($view) => $body,
            ManagedObject::Datacenter($view) => $body,
            ManagedObject::ComputeResource($view) => $body,
            ManagedObject::ClusterComputeResource($view) => $body,
            ManagedObject::ResourcePool($view) => $body,
            ManagedObject::HostSystem($view) => $body,
            ManagedObject::VirtualMachine($view) => $body,
            ManagedObject::Datastore($view) => $body,
            ManagedObject::Task($view) => $body,
        }
    };
}

impl ManagedObject {
    /// Identity of the viewed object
    #[must_use]
    pub fn identity(&self) -> &ObjectIdentity {
        dispatch!(self, v => v.identity())
    }

    /// Registered type of the view
    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        match self {
            ManagedObject::Folder(_) => EntityType::Folder,
            ManagedObject::Datacenter(_) => EntityType::Datacenter,
            ManagedObject::ComputeResource(_) => EntityType::ComputeResource,
            ManagedObject::ClusterComputeResource(_) => EntityType::ClusterComputeResource,
            ManagedObject::ResourcePool(_) => EntityType::ResourcePool,
            ManagedObject::HostSystem(_) => EntityType::HostSystem,
            ManagedObject::VirtualMachine(_) => EntityType::VirtualMachine,
            ManagedObject::Datastore(_) => EntityType::Datastore,
            ManagedObject::Task(_) => EntityType::Task,
        }
    }

    /// Attribute bag
    #[must_use]
    pub fn attributes(&self) -> &AttributeBag {
        dispatch!(self, v => v.attributes())
    }

    /// Entity display name, if synchronized
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        dispatch!(self, v => v.name())
    }

    /// Refresh attributes from the server
    ///
    /// # Errors
    /// Returns an error if the round trip fails or the object no longer exists.
    pub async fn sync(&mut self) -> Result<SyncReport, InventoryError> {
        dispatch!(self, v => v.sync().await)
    }

    /// Recover the typed view
    ///
    /// # Errors
    /// Hands the object back unchanged if it holds a different view type.
    pub fn downcast<K: ViewKind>(self) -> Result<View<K>, ManagedObject> {
        K::unwrap(self)
    }
}

/// Run `$body` with `$kind` bound to the marker type of `$entity_type`
macro_rules! with_kind {
    ($entity_type:expr, $kind:ident => $body:expr) => {
        match $entity_type {
            EntityType::Folder => {
                type $kind = FolderKind;
                $body
            }
            EntityType::Datacenter => {
                type $kind = DatacenterKind;
                $body
            }
            EntityType::ComputeResource => {
                type $kind = ComputeResourceKind;
                $body
            }
            EntityType::ClusterComputeResource => {
                type $kind = ClusterComputeResourceKind;
                $body
            }
            EntityType::ResourcePool => {
                type $kind = ResourcePoolKind;
                $body
            }
            EntityType::HostSystem => {
                type $kind = HostSystemKind;
                $body
            }
            EntityType::VirtualMachine => {
                type $kind = VirtualMachineKind;
                $body
            }
            EntityType::Datastore => {
                type $kind = DatastoreKind;
                $body
            }
            EntityType::Task => {
                type $kind = TaskKind;
                $body
            }
        }
    };
}

fn unsynced(session: Arc<Session>, entity_type: EntityType, identity: ObjectIdentity) -> ManagedObject {
    with_kind!(entity_type, K => K::wrap(View::<K>::unsynced(session, identity)))
}

fn populated(session: Arc<Session>, entity_type: EntityType, content: &ObjectContent) -> ManagedObject {
    with_kind!(entity_type, K => K::wrap(View::<K>::from_content(session, content)))
}

static STARTUP_CHECK: LazyLock<Result<(), InventoryError>> = LazyLock::new(ViewRegistry::validate);

/// Constructs views by remote type name
pub struct ViewRegistry;

impl ViewRegistry {
    /// Check every registered schema and the builtin traversal catalog
    ///
    /// # Errors
    /// Returns `InventoryError::Schema` describing the first inconsistency.
    pub fn validate() -> Result<(), InventoryError> {
        let schemas: Vec<&Schema> = EntityType::ALL.iter().map(|t| t.schema()).collect();
        Self::check(&schemas, catalog())
    }

    /// Check a set of schemas and a traversal catalog for consistency
    ///
    /// # Errors
    /// Returns `InventoryError::Schema` for an attribute declared twice along
    /// a schema chain or a traversal rule naming an unknown rule.
    pub fn check(schemas: &[&Schema], catalog: &TraversalCatalog) -> Result<(), InventoryError> {
        for schema in schemas {
            schema.validate()?;
        }
        catalog.validate()
    }

    /// Result of `validate`, computed once per process
    ///
    /// # Errors
    /// Returns the `InventoryError::Schema` found by the first check.
    pub fn ensure_valid() -> Result<(), InventoryError> {
        STARTUP_CHECK.clone()
    }

    /// Resolve a remote type name
    ///
    /// # Errors
    /// Returns `InventoryError::UnknownType` for an unregistered name.
    pub fn lookup(type_name: &str) -> Result<EntityType, InventoryError> {
        EntityType::from_type_name(type_name)
            .ok_or_else(|| InventoryError::UnknownType(type_name.to_string()))
    }

    /// Construct and synchronize a view for `identity`
    ///
    /// # Errors
    /// Returns `InventoryError::UnknownType` before any I/O if the identity's
    /// type is unregistered, otherwise any synchronization error.
    #[instrument(skip(session), fields(object = %identity))]
    pub async fn create(
        session: Arc<Session>,
        identity: ObjectIdentity,
    ) -> Result<ManagedObject, InventoryError> {
        let entity_type = Self::lookup(identity.remote_type())?;
        let mut object = unsynced(session, entity_type, identity);
        object.sync().await?;
        debug!(entity_type = %entity_type, "view created");
        Ok(object)
    }

    /// Construct a view from an already retrieved row
    ///
    /// # Errors
    /// Returns `InventoryError::UnknownType` if the row's type is unregistered.
    pub fn from_content(
        session: Arc<Session>,
        content: &ObjectContent,
    ) -> Result<ManagedObject, InventoryError> {
        let entity_type = Self::lookup(content.obj.remote_type())?;
        Ok(populated(session, entity_type, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{SelectionSpec, TraversalSpec};
    use crate::schema::{AttributeDecl, AttributeKind};

    #[test]
    fn test_type_names_round_trip() {
        for entity_type in EntityType::ALL {
            assert_eq!(EntityType::from_type_name(entity_type.type_name()), Some(entity_type));
        }
        assert_eq!(EntityType::from_type_name("Network"), None);
    }

    #[test]
    fn test_searchable() {
        assert_eq!(EntityType::searchable("VirtualMachine").unwrap(), EntityType::VirtualMachine);
        assert_eq!(EntityType::searchable("ResourcePool").unwrap(), EntityType::ResourcePool);
        assert!(matches!(
            EntityType::searchable("Datastore"),
            Err(InventoryError::UnsupportedEntityType(_))
        ));
        assert!(matches!(
            EntityType::searchable("Task"),
            Err(InventoryError::UnsupportedEntityType(_))
        ));
        assert!(matches!(
            EntityType::searchable("Bogus"),
            Err(InventoryError::UnsupportedEntityType(_))
        ));
    }

    #[test]
    fn test_lookup_unknown() {
        assert_eq!(ViewRegistry::lookup("HostSystem").unwrap(), EntityType::HostSystem);
        assert_eq!(
            ViewRegistry::lookup("Network"),
            Err(InventoryError::UnknownType("Network".to_string()))
        );
    }

    #[test]
    fn test_registry_is_consistent() {
        assert!(ViewRegistry::validate().is_ok());
        assert!(ViewRegistry::ensure_valid().is_ok());
    }

    #[test]
    fn test_check_rejects_duplicate_attribute() {
        static SHADOWING: Schema = Schema {
            type_name: "ShadowingFolder",
            parent: Some(&schema::FOLDER),
            own: &[AttributeDecl {
                name: "childEntity",
                kind: AttributeKind::List,
            }],
        };
        let err = ViewRegistry::check(&[&schema::FOLDER, &SHADOWING], catalog()).unwrap_err();
        assert!(matches!(err, InventoryError::Schema(msg) if msg.contains("childEntity")));
    }

    #[test]
    fn test_check_rejects_dangling_rule() {
        let broken = TraversalCatalog::from_rules(vec![TraversalSpec {
            name: "folder-children".to_string(),
            source_type: "Folder".to_string(),
            relation_path: "childEntity".to_string(),
            skip: false,
            nested: vec![SelectionSpec::reference("datacenter-network-folder")],
        }]);
        let err = ViewRegistry::check(&[&schema::FOLDER], &broken).unwrap_err();
        assert!(matches!(err, InventoryError::Schema(msg) if msg.contains("datacenter-network-folder")));
    }

    #[test]
    fn test_kind_dispatch_matches_schema() {
        for entity_type in EntityType::ALL {
            let same = with_kind!(entity_type, K => K::schema());
            assert!(std::ptr::eq(same, entity_type.schema()));
        }
    }

    #[test]
    fn test_cluster_inherits_compute_resource() {
        let cluster = EntityType::ClusterComputeResource.schema();
        assert!(cluster.is_a(EntityType::ComputeResource.type_name()));
        assert!(cluster.declares("host").is_some());
    }
}
