//! vimview-inventory: typed views over a remote managed-object inventory
//!
//! Builds property-collector queries from a fixed traversal catalog, maps
//! result rows onto schema-shaped typed views, and polls long-running tasks.
//! All network traffic goes through a `vimview_invoke::RemoteInvoker`.

pub mod catalog;
pub mod client;
pub mod collector;
pub mod config;
pub mod entities;
pub mod error;
pub mod query;
pub mod registry;
pub mod schema;
pub mod session;
pub mod task;
pub mod view;

pub use catalog::{TraversalCatalog, catalog};
pub use client::InventoryClient;
pub use collector::PropertyCollector;
pub use config::ClientConfig;
pub use entities::{
    ClusterComputeResource, ComputeResource, Datacenter, Datastore, Folder, HostSystem,
    ResourcePool, Task, VirtualMachine,
};
pub use error::{InventoryError, Result};
pub use query::{ObjectContent, PropertyFilterSpec, PropertySpec, QuerySpecBuilder};
pub use registry::{EntityType, ManagedObject, ViewRegistry};
pub use session::{ServiceContent, Session};
pub use task::{CancelReason, CancelToken, FaultInfo, TaskInfo, TaskOutcome, TaskState, TaskWaiter};
pub use view::{AttributeBag, SyncReport, View, ViewKind};
