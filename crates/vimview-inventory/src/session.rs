//! Session state shared by the client and every view

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument};
use vimview_invoke::{Arguments, ObjectIdentity, RemoteInvoker, WireValue};

use crate::catalog::{TraversalCatalog, catalog};
use crate::collector::PropertyCollector;
use crate::error::InventoryError;
use crate::query::QuerySpecBuilder;
use crate::registry::ViewRegistry;

/// Zero-argument bootstrap operation on the service instance
pub const RETRIEVE_SERVICE_CONTENT: &str = "RetrieveServiceContent";

/// Well-known entry points of the management service
///
/// Fetched once per session and never modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceContent {
    /// Top of the inventory tree
    pub root_folder: ObjectIdentity,
    /// Property collector
    pub property_collector: ObjectIdentity,
    /// Session manager (login / logout)
    pub session_manager: ObjectIdentity,
    /// Search index, if exposed
    pub search_index: Option<ObjectIdentity>,
    /// Task manager, if exposed
    pub task_manager: Option<ObjectIdentity>,
    /// View manager, if exposed
    pub view_manager: Option<ObjectIdentity>,
    /// Product information (`AboutInfo`), if returned
    pub about: Option<WireValue>,
}

impl ServiceContent {
    /// Decode a `ServiceContent` data object
    ///
    /// # Errors
    /// Returns `InventoryError::Protocol` if the value is not a data object or
    /// a required entry point is missing.
    pub fn from_wire(value: &WireValue) -> Result<Self, InventoryError> {
        let data = value.as_data().ok_or_else(|| {
            InventoryError::Protocol("service content is not a data object".to_string())
        })?;

        let required = |name: &str| {
            data.field(name)
                .and_then(WireValue::as_reference)
                .cloned()
                .ok_or_else(|| {
                    InventoryError::Protocol(format!("service content is missing {name}"))
                })
        };
        let optional = |name: &str| data.field(name).and_then(WireValue::as_reference).cloned();

        Ok(Self {
            root_folder: required("rootFolder")?,
            property_collector: required("propertyCollector")?,
            session_manager: required("sessionManager")?,
            search_index: optional("searchIndex"),
            task_manager: optional("taskManager"),
            view_manager: optional("viewManager"),
            about: data.field("about").filter(|v| !v.is_empty()).cloned(),
        })
    }
}

/// Immutable per-session state
///
/// Shared through `Arc` by the client and every view it creates. Nothing in
/// here changes after bootstrap, so concurrent queries never contend.
pub struct Session {
    invoker: Arc<dyn RemoteInvoker>,
    content: ServiceContent,
    collector: PropertyCollector,
    catalog: &'static TraversalCatalog,
}

impl Session {
    /// Fetch the service content and build the session around it
    ///
    /// # Errors
    /// Returns `InventoryError::Schema` before any I/O if the registered
    /// schemas or traversal rules are inconsistent, otherwise an error if the
    /// bootstrap call fails or its response is malformed.
    #[instrument(skip(invoker), fields(invoker = invoker.invoker_type()))]
    pub async fn bootstrap(invoker: Arc<dyn RemoteInvoker>) -> Result<Self, InventoryError> {
        ViewRegistry::ensure_valid()?;

        let response = invoker
            .invoke(
                RETRIEVE_SERVICE_CONTENT,
                &ObjectIdentity::service_instance(),
                Arguments::new(),
            )
            .await?;
        let content = ServiceContent::from_wire(&decode(response)?)?;

        info!(root = %content.root_folder, "service content retrieved");

        Ok(Self::with_content(invoker, content))
    }

    /// Build a session around already known service content
    pub fn with_content(invoker: Arc<dyn RemoteInvoker>, content: ServiceContent) -> Self {
        let collector = PropertyCollector::new(content.property_collector.clone(), invoker.clone());
        Self {
            invoker,
            content,
            collector,
            catalog: catalog(),
        }
    }

    /// Service content entry points
    #[must_use]
    pub fn content(&self) -> &ServiceContent {
        &self.content
    }

    /// Property collector client
    #[must_use]
    pub fn collector(&self) -> &PropertyCollector {
        &self.collector
    }

    /// Traversal catalog used by this session
    #[must_use]
    pub fn catalog(&self) -> &'static TraversalCatalog {
        self.catalog
    }

    /// Query builder over this session's catalog
    #[must_use]
    pub fn builder(&self) -> QuerySpecBuilder<'static> {
        QuerySpecBuilder::new(self.catalog)
    }

    /// Invoke an operation and decode its result as a wire value
    ///
    /// # Errors
    /// Transport faults pass through unchanged; an undecodable result is
    /// `InventoryError::Parse`.
    pub async fn invoke(
        &self,
        operation: &str,
        target: &ObjectIdentity,
        arguments: Arguments,
    ) -> Result<WireValue, InventoryError> {
        debug!(operation, %target, "invoking");
        let response = self.invoker.invoke(operation, target, arguments).await?;
        decode(response)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("invoker", &self.invoker.invoker_type())
            .field("content", &self.content)
            .finish_non_exhaustive()
    }
}

/// Decode a raw response into a wire value (`null` is `WireValue::Null`)
pub(crate) fn decode(response: Value) -> Result<WireValue, InventoryError> {
    if response.is_null() {
        return Ok(WireValue::Null);
    }
    serde_json::from_value(response).map_err(|e| InventoryError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vimview_invoke::DataObject;

    fn content_value() -> WireValue {
        DataObject::new("ServiceContent")
            .with_field("rootFolder", ObjectIdentity::new("Folder", "group-d1"))
            .with_field("propertyCollector", ObjectIdentity::new("PropertyCollector", "propertyCollector"))
            .with_field("sessionManager", ObjectIdentity::new("SessionManager", "SessionManager"))
            .with_field("searchIndex", ObjectIdentity::new("SearchIndex", "SearchIndex"))
            .into()
    }

    #[test]
    fn test_service_content_from_wire() {
        let content = ServiceContent::from_wire(&content_value()).unwrap();
        assert_eq!(content.root_folder, ObjectIdentity::new("Folder", "group-d1"));
        assert_eq!(content.session_manager.remote_type(), "SessionManager");
        assert!(content.search_index.is_some());
        assert!(content.task_manager.is_none());
        assert!(content.about.is_none());
    }

    #[test]
    fn test_service_content_missing_root() {
        let value: WireValue = DataObject::new("ServiceContent")
            .with_field("propertyCollector", ObjectIdentity::new("PropertyCollector", "pc"))
            .into();
        let err = ServiceContent::from_wire(&value).unwrap_err();
        assert!(matches!(err, InventoryError::Protocol(msg) if msg.contains("rootFolder")));
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode(Value::Null).unwrap(), WireValue::Null);
        assert_eq!(
            decode(serde_json::json!({"kind": "int", "value": 7})).unwrap(),
            WireValue::Int(7)
        );
        assert!(matches!(decode(serde_json::json!(42)), Err(InventoryError::Parse(_))));
    }
}
