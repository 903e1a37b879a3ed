//! Property collector client

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, instrument};
use vimview_invoke::{Arguments, ObjectIdentity, RemoteInvoker};

use crate::error::InventoryError;
use crate::query::{ObjectContent, PropertyFilterSpec};

/// Remote operation issued by `retrieve`
pub const RETRIEVE_PROPERTIES: &str = "RetrieveProperties";

/// Relay for the server's property collector
///
/// One request, one response: no pagination and no partial-result merging.
#[derive(Clone)]
pub struct PropertyCollector {
    /// Identity of the remote collector
    identity: ObjectIdentity,
    /// Transport
    invoker: Arc<dyn RemoteInvoker>,
}

impl PropertyCollector {
    /// Create a collector client for the remote collector `identity`
    pub fn new(identity: ObjectIdentity, invoker: Arc<dyn RemoteInvoker>) -> Self {
        Self { identity, invoker }
    }

    /// Identity of the remote collector
    #[must_use]
    pub fn identity(&self) -> &ObjectIdentity {
        &self.identity
    }

    /// Retrieve every object content matched by `spec`
    ///
    /// An empty result means nothing matched and is not an error.
    ///
    /// # Errors
    /// Transport faults are returned unchanged as `InventoryError::Transport`;
    /// an undecodable response is `InventoryError::Parse`.
    #[instrument(skip(self, spec), fields(collector = %self.identity, objects = spec.object_set.len()))]
    pub async fn retrieve(&self, spec: &PropertyFilterSpec) -> Result<Vec<ObjectContent>, InventoryError> {
        let spec_json =
            serde_json::to_value(spec).map_err(|e| InventoryError::Parse(e.to_string()))?;

        let mut arguments = Arguments::new();
        arguments.insert("specSet".to_string(), json!([spec_json]));

        let response = self
            .invoker
            .invoke(RETRIEVE_PROPERTIES, &self.identity, arguments)
            .await?;

        let rows = parse_contents(response)?;
        debug!(rows = rows.len(), "properties retrieved");

        Ok(rows)
    }
}

impl std::fmt::Debug for PropertyCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyCollector")
            .field("identity", &self.identity)
            .field("invoker", &self.invoker.invoker_type())
            .finish()
    }
}

/// Decode a `RetrieveProperties` response
fn parse_contents(response: Value) -> Result<Vec<ObjectContent>, InventoryError> {
    if response.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(response).map_err(|e| InventoryError::Parse(e.to_string()))
}
