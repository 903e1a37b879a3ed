//! Typed views over managed objects and their synchronization
//!
//! A `View<K>` owns one identity and an attribute bag shaped by `K`'s schema.
//! It is synchronized once on construction and afterwards only when the
//! caller asks for it; there is no implicit caching or invalidation.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, instrument, warn};
use vimview_invoke::{ObjectIdentity, WireValue};

use crate::error::InventoryError;
use crate::query::{ObjectContent, PropertySpec};
use crate::registry::ManagedObject;
use crate::schema::{AttributeKind, Schema};
use crate::session::Session;

/// Compile-time marker tying a view to its schema and registry variant
pub trait ViewKind: Send + Sync + Sized + 'static {
    /// Declared attribute schema
    fn schema() -> &'static Schema;

    /// Wrap a typed view into the closed `ManagedObject` enum
    fn wrap(view: View<Self>) -> ManagedObject;

    /// Recover a typed view, handing the object back on a type mismatch
    ///
    /// # Errors
    /// Returns the original object if it holds a different view type.
    fn unwrap(object: ManagedObject) -> Result<View<Self>, ManagedObject>;
}

/// A property value after collection unwrapping
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Flattened<'a> {
    /// Items of a homogeneous collection
    List(&'a [WireValue]),
    /// Any other value
    Scalar(&'a WireValue),
}

impl Flattened<'_> {
    /// Whether the flattened value carries nothing worth assigning
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Flattened::List(items) => items.is_empty(),
            Flattened::Scalar(value) => value.is_empty(),
        }
    }

    /// Owned wire value to store in an attribute bag
    #[must_use]
    pub fn to_value(&self) -> WireValue {
        match self {
            Flattened::List(items) => WireValue::Collection(items.to_vec()),
            Flattened::Scalar(value) => (*value).clone(),
        }
    }
}

/// Unwrap a collection to its items, otherwise treat the value as a scalar
#[must_use]
pub fn flatten(value: &WireValue) -> Flattened<'_> {
    match value {
        WireValue::Collection(items) => Flattened::List(items),
        other => Flattened::Scalar(other),
    }
}

/// Outcome of applying one result row to an attribute bag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Attributes overwritten with server values
    pub applied: usize,
    /// Properties left untouched because the server value was empty
    pub skipped_empty: usize,
    /// Properties the schema does not declare (schema drift)
    pub unknown: Vec<String>,
}

/// Attribute values keyed by declared name
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeBag {
    schema: &'static Schema,
    values: BTreeMap<&'static str, WireValue>,
}

impl AttributeBag {
    /// Bag holding every declared attribute at its default
    #[must_use]
    pub fn new(schema: &'static Schema) -> Self {
        let values = schema
            .attributes()
            .into_iter()
            .map(|a| (a.name, a.kind.default_value()))
            .collect();
        Self { schema, values }
    }

    /// Schema the bag is shaped by
    #[must_use]
    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    /// Current value of a declared attribute
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&WireValue> {
        self.values.get(name)
    }

    /// Iterate attributes in name order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &WireValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    /// Attributes that differ from their declared default
    pub fn populated(&self) -> impl Iterator<Item = (&'static str, &WireValue)> {
        self.iter().filter(|(_, v)| !v.is_empty())
    }

    /// Assign every property of `content` onto its declared attribute
    ///
    /// Empty values never overwrite what is already known. Undeclared
    /// properties are skipped and reported, not treated as errors.
    pub fn apply(&mut self, content: &ObjectContent) -> SyncReport {
        let mut report = SyncReport::default();

        for prop in &content.prop_set {
            let flattened = flatten(&prop.val);
            let Some(slot) = self.values.get_mut(prop.name.as_str()) else {
                warn!(
                    object = %content.obj,
                    property = %prop.name,
                    "skipping undeclared property"
                );
                report.unknown.push(prop.name.clone());
                continue;
            };

            if flattened.is_empty() {
                report.skipped_empty += 1;
                continue;
            }

            *slot = flattened.to_value();
            report.applied += 1;
        }

        report
    }
}

/// Single round trip refreshing `bag` from the server
#[instrument(skip(session, bag), fields(object = %identity))]
pub(crate) async fn synchronize(
    session: &Session,
    identity: &ObjectIdentity,
    bag: &mut AttributeBag,
) -> Result<SyncReport, InventoryError> {
    let spec = session
        .builder()
        .single_object(identity.clone(), PropertySpec::all(identity.remote_type()));
    let rows = session.collector().retrieve(&spec).await?;

    if rows.len() > 1 {
        warn!(rows = rows.len(), "single-object query returned several rows");
    }
    let row = rows
        .iter()
        .find(|r| &r.obj == identity)
        .ok_or_else(|| InventoryError::object_not_found(identity))?;

    let report = bag.apply(row);
    debug!(
        applied = report.applied,
        skipped_empty = report.skipped_empty,
        unknown = report.unknown.len(),
        "view synchronized"
    );
    Ok(report)
}

/// Local view of one managed object
pub struct View<K: ViewKind> {
    identity: ObjectIdentity,
    session: Arc<Session>,
    attributes: AttributeBag,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ViewKind> View<K> {
    /// Unsynchronized view with default attributes
    pub(crate) fn unsynced(session: Arc<Session>, identity: ObjectIdentity) -> Self {
        Self {
            identity,
            session,
            attributes: AttributeBag::new(K::schema()),
            _kind: PhantomData,
        }
    }

    /// Construct a view and synchronize it once
    ///
    /// # Errors
    /// Returns an error if the synchronization round trip fails or the
    /// object no longer exists.
    pub async fn fetch(session: Arc<Session>, identity: ObjectIdentity) -> Result<Self, InventoryError> {
        let mut view = Self::unsynced(session, identity);
        view.sync().await?;
        Ok(view)
    }

    /// Construct a view from an already retrieved row, without a round trip
    #[must_use]
    pub fn from_content(session: Arc<Session>, content: &ObjectContent) -> Self {
        let mut view = Self::unsynced(session, content.obj.clone());
        view.attributes.apply(content);
        view
    }

    /// Refresh attributes from the server (one round trip)
    ///
    /// # Errors
    /// Returns an error if the round trip fails or the object no longer exists.
    pub async fn sync(&mut self) -> Result<SyncReport, InventoryError> {
        synchronize(&self.session, &self.identity, &mut self.attributes).await
    }

    /// Identity of the viewed object
    #[must_use]
    pub fn identity(&self) -> &ObjectIdentity {
        &self.identity
    }

    /// Declared type name of the view
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        K::schema().type_name
    }

    /// Session the view synchronizes through
    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Attribute bag
    #[must_use]
    pub fn attributes(&self) -> &AttributeBag {
        &self.attributes
    }

    /// Current value of a declared attribute
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&WireValue> {
        self.attributes.get(name)
    }

    /// Text value of a scalar attribute
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.attribute(name).and_then(WireValue::as_str)
    }

    /// Reference held by a scalar attribute
    #[must_use]
    pub fn reference(&self, name: &str) -> Option<&ObjectIdentity> {
        self.attribute(name).and_then(WireValue::as_reference)
    }

    /// References held by a list attribute
    #[must_use]
    pub fn references(&self, name: &str) -> Vec<&ObjectIdentity> {
        debug_assert_eq!(K::schema().declares(name), Some(AttributeKind::List));
        self.attribute(name).map(WireValue::references).unwrap_or_default()
    }

    /// Entity display name
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.text("name")
    }

    /// Containing entity
    #[must_use]
    pub fn parent(&self) -> Option<&ObjectIdentity> {
        self.reference("parent")
    }

    /// Overall health status (`green`, `yellow`, `red`, `gray`)
    #[must_use]
    pub fn overall_status(&self) -> Option<&str> {
        self.text("overallStatus")
    }

    /// Recently run tasks on this entity
    #[must_use]
    pub fn recent_tasks(&self) -> Vec<&ObjectIdentity> {
        self.attribute("recentTask")
            .map(WireValue::references)
            .unwrap_or_default()
    }
}

impl<K: ViewKind> Clone for View<K> {
    fn clone(&self) -> Self {
        Self {
            identity: self.identity.clone(),
            session: self.session.clone(),
            attributes: self.attributes.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K: ViewKind> fmt::Debug for View<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(K::schema().type_name)
            .field("identity", &self.identity)
            .field("attributes", &self.attributes.populated().collect::<Vec<_>>())
            .finish()
    }
}
