//! Typed entity views
//!
//! One marker type per registered remote type, the `View` alias callers use,
//! and the accessors and remote operations specific to each type.

use serde_json::json;
use tracing::{info, instrument};
use vimview_invoke::{Arguments, DataObject, ObjectIdentity, WireValue};

use crate::error::InventoryError;
use crate::registry::ManagedObject;
use crate::schema::{self, Schema};
use crate::task::{CancelToken, TaskOutcome, TaskWaiter};
use crate::view::{SyncReport, View, ViewKind};

macro_rules! view_kind {
    ($(#[$doc:meta])* $kind:ident, $alias:ident, $schema:path) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy)]
        pub struct $kind;

        impl ViewKind for $kind {
            fn schema() -> &'static Schema {
                &$schema
            }

            fn wrap(view: View<Self>) -> ManagedObject {
                ManagedObject::$alias(view)
            }

            fn unwrap(object: ManagedObject) -> Result<View<Self>, ManagedObject> {
                match object {
                    ManagedObject::$alias(view) => Ok(view),
                    other => Err(other),
                }
            }
        }

        $(#[$doc])*
        pub type $alias = View<$kind>;
    };
}

view_kind!(
    /// Inventory folder
    FolderKind, Folder, schema::FOLDER
);
view_kind!(
    /// Datacenter
    DatacenterKind, Datacenter, schema::DATACENTER
);
view_kind!(
    /// Standalone compute resource
    ComputeResourceKind, ComputeResource, schema::COMPUTE_RESOURCE
);
view_kind!(
    /// Cluster of hosts
    ClusterComputeResourceKind, ClusterComputeResource, schema::CLUSTER_COMPUTE_RESOURCE
);
view_kind!(
    /// Resource pool (or vApp)
    ResourcePoolKind, ResourcePool, schema::RESOURCE_POOL
);
view_kind!(
    /// ESXi host
    HostSystemKind, HostSystem, schema::HOST_SYSTEM
);
view_kind!(
    /// Virtual machine
    VirtualMachineKind, VirtualMachine, schema::VIRTUAL_MACHINE
);
view_kind!(
    /// Datastore
    DatastoreKind, Datastore, schema::DATASTORE
);
view_kind!(
    /// Long-running server operation
    TaskKind, Task, schema::TASK
);

/// Field of a data-object attribute
fn data_field<'a, K: ViewKind>(view: &'a View<K>, attribute: &str, field: &str) -> Option<&'a WireValue> {
    view.attribute(attribute)
        .and_then(WireValue::as_data)
        .and_then(|d| d.field(field))
}

/// Data-object attribute
fn data<'a, K: ViewKind>(view: &'a View<K>, attribute: &str) -> Option<&'a DataObject> {
    view.attribute(attribute).and_then(WireValue::as_data)
}

impl Folder {
    /// Entities directly contained in this folder
    #[must_use]
    pub fn child_entity(&self) -> Vec<&ObjectIdentity> {
        self.references("childEntity")
    }

    /// Entity types this folder may contain
    #[must_use]
    pub fn child_type(&self) -> Vec<&str> {
        self.attribute("childType")
            .and_then(WireValue::as_collection)
            .map(|items| items.iter().filter_map(WireValue::as_str).collect())
            .unwrap_or_default()
    }

    /// Create a subfolder and return its synchronized view
    ///
    /// # Errors
    /// Returns an error if the server rejects the name (e.g. `DuplicateName`)
    /// or does not answer with a folder reference.
    #[instrument(skip(self), fields(parent = %self.identity()))]
    pub async fn create_folder(&self, name: &str) -> Result<Folder, InventoryError> {
        let mut arguments = Arguments::new();
        arguments.insert("name".to_string(), json!(name));

        let result = self
            .session()
            .invoke("CreateFolder", self.identity(), arguments)
            .await?;
        let identity = result.as_reference().cloned().ok_or_else(|| {
            InventoryError::Protocol("CreateFolder did not return a reference".to_string())
        })?;

        info!(folder = %identity, "folder created");
        Folder::fetch(self.session().clone(), identity).await
    }
}

impl Datacenter {
    /// Root folder of the host hierarchy
    #[must_use]
    pub fn host_folder(&self) -> Option<&ObjectIdentity> {
        self.reference("hostFolder")
    }

    /// Root folder of the VM hierarchy
    #[must_use]
    pub fn vm_folder(&self) -> Option<&ObjectIdentity> {
        self.reference("vmFolder")
    }

    /// Root folder of the datastore hierarchy
    #[must_use]
    pub fn datastore_folder(&self) -> Option<&ObjectIdentity> {
        self.reference("datastoreFolder")
    }

    /// Root folder of the network hierarchy
    #[must_use]
    pub fn network_folder(&self) -> Option<&ObjectIdentity> {
        self.reference("networkFolder")
    }

    /// Datastores available in this datacenter
    #[must_use]
    pub fn datastores(&self) -> Vec<&ObjectIdentity> {
        self.references("datastore")
    }

    /// Networks available in this datacenter
    #[must_use]
    pub fn networks(&self) -> Vec<&ObjectIdentity> {
        self.references("network")
    }

    /// Power on several VMs and wait for the resulting task
    ///
    /// # Errors
    /// Returns an error if the request or any poll fails. A task that ends in
    /// error is reported as `TaskOutcome::Failed`, not as an `Err`.
    #[instrument(skip(self, waiter, cancel), fields(datacenter = %self.identity(), vms = vms.len()))]
    pub async fn power_on_multi_vm(
        &self,
        vms: &[ObjectIdentity],
        waiter: &TaskWaiter,
        cancel: &CancelToken,
    ) -> Result<TaskOutcome, InventoryError> {
        let mut arguments = Arguments::new();
        let vm_refs = serde_json::to_value(vms).map_err(|e| InventoryError::Parse(e.to_string()))?;
        arguments.insert("vm".to_string(), vm_refs);

        let result = self
            .session()
            .invoke("PowerOnMultiVM_Task", self.identity(), arguments)
            .await?;
        let task_ref = result.as_reference().cloned().ok_or_else(|| {
            InventoryError::Protocol("PowerOnMultiVM_Task did not return a task".to_string())
        })?;

        let mut task = Task::fetch(self.session().clone(), task_ref).await?;
        waiter.await_completion(&mut task, cancel).await
    }
}

impl ComputeResource {
    /// Hosts in this compute resource
    #[must_use]
    pub fn hosts(&self) -> Vec<&ObjectIdentity> {
        self.references("host")
    }

    /// Root resource pool
    #[must_use]
    pub fn resource_pool(&self) -> Option<&ObjectIdentity> {
        self.reference("resourcePool")
    }

    /// Datastores reachable from this compute resource
    #[must_use]
    pub fn datastores(&self) -> Vec<&ObjectIdentity> {
        self.references("datastore")
    }

    /// `ComputeResourceSummary` data object
    #[must_use]
    pub fn summary(&self) -> Option<&DataObject> {
        data(self, "summary")
    }
}

impl ClusterComputeResource {
    /// Hosts in this cluster
    #[must_use]
    pub fn hosts(&self) -> Vec<&ObjectIdentity> {
        self.references("host")
    }

    /// Root resource pool
    #[must_use]
    pub fn resource_pool(&self) -> Option<&ObjectIdentity> {
        self.reference("resourcePool")
    }

    /// Datastores reachable from this cluster
    #[must_use]
    pub fn datastores(&self) -> Vec<&ObjectIdentity> {
        self.references("datastore")
    }

    /// `ClusterComputeResourceSummary` data object
    #[must_use]
    pub fn summary(&self) -> Option<&DataObject> {
        data(self, "summary")
    }

    /// Outstanding DRS recommendations
    #[must_use]
    pub fn drs_recommendations(&self) -> &[WireValue] {
        self.attribute("drsRecommendation")
            .and_then(WireValue::as_collection)
            .unwrap_or_default()
    }
}

impl ResourcePool {
    /// Child resource pools
    #[must_use]
    pub fn resource_pools(&self) -> Vec<&ObjectIdentity> {
        self.references("resourcePool")
    }

    /// VMs in this pool
    #[must_use]
    pub fn vms(&self) -> Vec<&ObjectIdentity> {
        self.references("vm")
    }

    /// Compute resource owning this pool
    #[must_use]
    pub fn owner(&self) -> Option<&ObjectIdentity> {
        self.reference("owner")
    }
}

impl HostSystem {
    /// VMs registered on this host
    #[must_use]
    pub fn vms(&self) -> Vec<&ObjectIdentity> {
        self.references("vm")
    }

    /// Datastores mounted on this host
    #[must_use]
    pub fn datastores(&self) -> Vec<&ObjectIdentity> {
        self.references("datastore")
    }

    /// Networks visible to this host
    #[must_use]
    pub fn networks(&self) -> Vec<&ObjectIdentity> {
        self.references("network")
    }

    /// `connected`, `disconnected` or `notResponding`
    #[must_use]
    pub fn connection_state(&self) -> Option<&str> {
        data_field(self, "runtime", "connectionState").and_then(WireValue::as_str)
    }

    /// Whether the host is in maintenance mode
    #[must_use]
    pub fn in_maintenance_mode(&self) -> Option<bool> {
        data_field(self, "runtime", "inMaintenanceMode").and_then(WireValue::as_bool)
    }

    /// `HostHardwareInfo` data object
    #[must_use]
    pub fn hardware(&self) -> Option<&DataObject> {
        data(self, "hardware")
    }
}

impl VirtualMachine {
    /// `poweredOn`, `poweredOff` or `suspended`
    #[must_use]
    pub fn power_state(&self) -> Option<&str> {
        data_field(self, "runtime", "powerState").and_then(WireValue::as_str)
    }

    /// Host currently running the VM
    #[must_use]
    pub fn host(&self) -> Option<&ObjectIdentity> {
        data_field(self, "runtime", "host").and_then(WireValue::as_reference)
    }

    /// Resource pool the VM belongs to
    #[must_use]
    pub fn resource_pool(&self) -> Option<&ObjectIdentity> {
        self.reference("resourcePool")
    }

    /// Datastores holding the VM's files
    #[must_use]
    pub fn datastores(&self) -> Vec<&ObjectIdentity> {
        self.references("datastore")
    }

    /// Networks the VM is attached to
    #[must_use]
    pub fn networks(&self) -> Vec<&ObjectIdentity> {
        self.references("network")
    }

    /// `GuestInfo` data object
    #[must_use]
    pub fn guest(&self) -> Option<&DataObject> {
        data(self, "guest")
    }

    /// `VirtualMachineConfigInfo` data object
    #[must_use]
    pub fn config(&self) -> Option<&DataObject> {
        data(self, "config")
    }

    /// Obtain a ticket for a remote console connection
    ///
    /// # Errors
    /// Returns an error if the server rejects the request.
    #[instrument(skip(self), fields(vm = %self.identity()))]
    pub async fn acquire_mks_ticket(&self) -> Result<WireValue, InventoryError> {
        self.session()
            .invoke("AcquireMksTicket", self.identity(), Arguments::new())
            .await
    }

    /// Answer a question blocking this VM
    ///
    /// # Errors
    /// Returns an error if the server rejects the answer.
    #[instrument(skip(self), fields(vm = %self.identity()))]
    pub async fn answer(&self, question_id: &str, choice: &str) -> Result<(), InventoryError> {
        let mut arguments = Arguments::new();
        arguments.insert("questionId".to_string(), json!(question_id));
        arguments.insert("answerChoice".to_string(), json!(choice));

        self.session()
            .invoke("AnswerVM", self.identity(), arguments)
            .await?;
        Ok(())
    }
}

impl Datastore {
    /// VMs with files on this datastore
    #[must_use]
    pub fn vms(&self) -> Vec<&ObjectIdentity> {
        self.references("vm")
    }

    /// `DatastoreHostMount` entries
    #[must_use]
    pub fn host_mounts(&self) -> &[WireValue] {
        self.attribute("host")
            .and_then(WireValue::as_collection)
            .unwrap_or_default()
    }

    /// Capacity in bytes, from the summary
    #[must_use]
    pub fn capacity(&self) -> Option<i64> {
        data_field(self, "summary", "capacity").and_then(WireValue::as_i64)
    }

    /// Free space in bytes, from the summary
    #[must_use]
    pub fn free_space(&self) -> Option<i64> {
        data_field(self, "summary", "freeSpace").and_then(WireValue::as_i64)
    }

    /// Ask the server to refresh free-space and capacity values, then re-sync
    ///
    /// # Errors
    /// Returns an error if the refresh or the re-sync fails.
    #[instrument(skip(self), fields(datastore = %self.identity()))]
    pub async fn refresh(&mut self) -> Result<SyncReport, InventoryError> {
        self.session()
            .invoke("RefreshDatastore", self.identity(), Arguments::new())
            .await?;
        self.sync().await
    }

    /// Ask the server to refresh storage usage information, then re-sync
    ///
    /// # Errors
    /// Returns an error if the refresh or the re-sync fails.
    #[instrument(skip(self), fields(datastore = %self.identity()))]
    pub async fn refresh_storage_info(&mut self) -> Result<SyncReport, InventoryError> {
        self.session()
            .invoke("RefreshDatastoreStorageInfo", self.identity(), Arguments::new())
            .await?;
        self.sync().await
    }
}
