//! Inventory client
//!
//! Entry point for callers: logs in, then looks up, batch-fetches and
//! searches managed objects, returning typed views bound to the session.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, instrument};
use vimview_invoke::{Arguments, HttpInvoker, ObjectIdentity, RemoteInvoker};

use crate::config::ClientConfig;
use crate::entities::Task;
use crate::error::InventoryError;
use crate::query::{ObjectContent, PropertySpec};
use crate::registry::{EntityType, ManagedObject, ViewRegistry};
use crate::session::{ServiceContent, Session};
use crate::task::{CancelToken, TaskOutcome, TaskWaiter};

/// Request timeout used by `login`
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Logged-in client for one management service
#[derive(Debug, Clone)]
pub struct InventoryClient {
    session: Arc<Session>,
    waiter: TaskWaiter,
}

impl InventoryClient {
    /// Log in over HTTP
    ///
    /// # Errors
    /// Returns an error if the URL is invalid, the service cannot be reached,
    /// or the credentials are rejected.
    pub async fn login(url: &str, username: &str, password: &str) -> Result<Self, InventoryError> {
        let invoker = HttpInvoker::new(url, DEFAULT_REQUEST_TIMEOUT)?;
        Self::login_with(Arc::new(invoker), username, password).await
    }

    /// Log in through an arbitrary invoker
    ///
    /// Fetches the service content, then authenticates against the session
    /// manager it names.
    ///
    /// # Errors
    /// Transport faults (including rejected credentials) pass through
    /// unchanged; malformed service content is `InventoryError::Protocol`.
    #[instrument(skip(invoker, password), fields(invoker = invoker.invoker_type()))]
    pub async fn login_with(
        invoker: Arc<dyn RemoteInvoker>,
        username: &str,
        password: &str,
    ) -> Result<Self, InventoryError> {
        let session = Session::bootstrap(invoker).await?;

        let mut arguments = Arguments::new();
        arguments.insert("userName".to_string(), json!(username));
        arguments.insert("password".to_string(), json!(password));
        session
            .invoke("Login", &session.content().session_manager, arguments)
            .await?;

        info!(username, "logged in");

        Ok(Self {
            session: Arc::new(session),
            waiter: TaskWaiter::new(),
        })
    }

    /// Log in using a loaded configuration
    ///
    /// # Errors
    /// Returns `InventoryError::Config` if no password can be resolved, and
    /// any login error otherwise.
    pub async fn connect(config: &ClientConfig) -> Result<Self, InventoryError> {
        let password = config.server.resolve_password()?;
        let invoker = HttpInvoker::new(&config.server.url, config.server.timeout())?;
        let client = Self::login_with(Arc::new(invoker), &config.server.username, &password).await?;
        Ok(client.with_waiter(config.tasks.waiter()))
    }

    /// Replace the waiter used by `wait_for_task`
    #[must_use]
    pub fn with_waiter(mut self, waiter: TaskWaiter) -> Self {
        self.waiter = waiter;
        self
    }

    /// End the server-side session
    ///
    /// # Errors
    /// Transport faults pass through unchanged.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), InventoryError> {
        self.session
            .invoke("Logout", &self.session.content().session_manager, Arguments::new())
            .await?;
        info!("logged out");
        Ok(())
    }

    /// Current time on the server
    ///
    /// # Errors
    /// Returns `InventoryError::Parse` if the server time is not RFC 3339.
    pub async fn current_time(&self) -> Result<DateTime<Utc>, InventoryError> {
        let value = self
            .session
            .invoke("CurrentTime", &ObjectIdentity::service_instance(), Arguments::new())
            .await?;
        let text = value
            .as_str()
            .ok_or_else(|| InventoryError::Parse("CurrentTime did not return text".to_string()))?;
        DateTime::parse_from_rfc3339(text)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| InventoryError::Parse(format!("invalid server time {text:?}: {e}")))
    }

    /// Shared session
    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Service content entry points
    #[must_use]
    pub fn content(&self) -> &ServiceContent {
        self.session.content()
    }

    /// Waiter used by `wait_for_task`
    #[must_use]
    pub fn waiter(&self) -> &TaskWaiter {
        &self.waiter
    }

    /// Construct and synchronize a view of one object
    ///
    /// # Errors
    /// Returns `InventoryError::UnknownType` before any I/O for an
    /// unregistered type, otherwise any synchronization error.
    pub async fn fetch_one(&self, identity: ObjectIdentity) -> Result<ManagedObject, InventoryError> {
        ViewRegistry::create(self.session.clone(), identity).await
    }

    /// Fetch several objects of one type in a single round trip
    ///
    /// Views are returned in the order the server returns rows; objects the
    /// server no longer knows are simply absent.
    ///
    /// # Errors
    /// `EmptyBatch`, `MixedTypeBatch` and `UnknownType` are reported before
    /// any I/O.
    #[instrument(skip(self, identities), fields(count = identities.len()))]
    pub async fn fetch_many(&self, identities: &[ObjectIdentity]) -> Result<Vec<ManagedObject>, InventoryError> {
        let first = identities.first().ok_or(InventoryError::EmptyBatch)?;
        let type_name = first.remote_type();
        if let Some(other) = identities.iter().find(|i| i.remote_type() != type_name) {
            return Err(InventoryError::MixedTypeBatch {
                expected: type_name.to_string(),
                found: other.remote_type().to_string(),
            });
        }
        ViewRegistry::lookup(type_name)?;

        let spec = self
            .session
            .builder()
            .batch(identities, PropertySpec::all(type_name));
        let rows = self.session.collector().retrieve(&spec).await?;
        debug!(requested = identities.len(), returned = rows.len(), "batch fetched");

        self.views_from_rows(&rows)
    }

    /// First object of `type_name` below `root` (default: the root folder)
    ///
    /// "First" follows server traversal order, which is not guaranteed to be
    /// stable; callers needing a particular object should sort the output of
    /// `find_all_by_type` or use `find_by_name`.
    ///
    /// # Errors
    /// `UnsupportedEntityType` is reported before any I/O; an empty result
    /// is `InventoryError::NotFound`.
    #[instrument(skip(self, root))]
    pub async fn find_by_type(
        &self,
        type_name: &str,
        root: Option<&ObjectIdentity>,
    ) -> Result<ManagedObject, InventoryError> {
        let entity_type = EntityType::searchable(type_name)?;
        let rows = self
            .traverse(root, PropertySpec::none(entity_type.type_name()))
            .await?;

        let row = rows
            .first()
            .ok_or_else(|| InventoryError::NotFound(format!("no {entity_type} below {}", self.root(root))))?;
        ViewRegistry::create(self.session.clone(), row.obj.clone()).await
    }

    /// Every object of `type_name` below `root`, in server order
    ///
    /// All properties come back with the traversal, so this is a single
    /// round trip regardless of the number of matches.
    ///
    /// # Errors
    /// `UnsupportedEntityType` is reported before any I/O.
    #[instrument(skip(self, root))]
    pub async fn find_all_by_type(
        &self,
        type_name: &str,
        root: Option<&ObjectIdentity>,
    ) -> Result<Vec<ManagedObject>, InventoryError> {
        let entity_type = EntityType::searchable(type_name)?;
        let rows = self
            .traverse(root, PropertySpec::all(entity_type.type_name()))
            .await?;
        self.views_from_rows(&rows)
    }

    /// First object of `type_name` below `root` whose name is `name`
    ///
    /// # Errors
    /// `UnsupportedEntityType` is reported before any I/O; no match is
    /// `InventoryError::NotFound`.
    #[instrument(skip(self, root))]
    pub async fn find_by_name(
        &self,
        type_name: &str,
        name: &str,
        root: Option<&ObjectIdentity>,
    ) -> Result<ManagedObject, InventoryError> {
        let entity_type = EntityType::searchable(type_name)?;
        let rows = self
            .traverse(root, PropertySpec::paths(entity_type.type_name(), &["name"]))
            .await?;

        let row = rows
            .iter()
            .find(|r| r.property("name").and_then(|v| v.as_str()) == Some(name))
            .ok_or_else(|| InventoryError::NotFound(format!("{entity_type} named {name:?}")))?;
        ViewRegistry::create(self.session.clone(), row.obj.clone()).await
    }

    /// Poll a task to completion with the configured waiter
    ///
    /// # Errors
    /// Returns an error if the task cannot be fetched or a poll fails. A task
    /// that ends in error is `TaskOutcome::Failed`, not an `Err`.
    #[instrument(skip(self, cancel), fields(task = %identity))]
    pub async fn wait_for_task(
        &self,
        identity: ObjectIdentity,
        cancel: &CancelToken,
    ) -> Result<TaskOutcome, InventoryError> {
        let mut task = Task::fetch(self.session.clone(), identity).await?;
        self.waiter.await_completion(&mut task, cancel).await
    }

    fn root(&self, root: Option<&ObjectIdentity>) -> ObjectIdentity {
        root.cloned()
            .unwrap_or_else(|| self.session.content().root_folder.clone())
    }

    async fn traverse(
        &self,
        root: Option<&ObjectIdentity>,
        property_spec: PropertySpec,
    ) -> Result<Vec<ObjectContent>, InventoryError> {
        let spec = self
            .session
            .builder()
            .full_traversal(self.root(root), property_spec);
        let rows = self.session.collector().retrieve(&spec).await?;
        debug!(rows = rows.len(), "traversal complete");
        Ok(rows)
    }

    fn views_from_rows(&self, rows: &[ObjectContent]) -> Result<Vec<ManagedObject>, InventoryError> {
        rows.iter()
            .map(|row| ViewRegistry::from_content(self.session.clone(), row))
            .collect()
    }
}
