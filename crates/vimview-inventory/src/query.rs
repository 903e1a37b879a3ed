//! Property filter specifications and their builder
//!
//! A `PropertyFilterSpec` is the complete, self-contained query sent to the
//! property collector: which properties to fetch (`PropertySpec`), where to
//! start (`ObjectSpec`) and which relationships to follow (`SelectionSpec`).

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use vimview_invoke::{ObjectIdentity, WireValue};

use crate::catalog::{FOLDER_CHILDREN, TraversalCatalog};

/// What to fetch for objects of one declared type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySpec {
    /// Declared type the spec applies to
    #[serde(rename = "type")]
    pub target_type: String,
    /// Fetch every property of the type
    #[serde(rename = "all")]
    pub fetch_all: bool,
    /// Property paths to fetch when `fetch_all` is false
    #[serde(rename = "pathSet", default, skip_serializing_if = "BTreeSet::is_empty")]
    pub path_set: BTreeSet<String>,
}

impl PropertySpec {
    /// Fetch every property of `target_type`
    pub fn all(target_type: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            fetch_all: true,
            path_set: BTreeSet::new(),
        }
    }

    /// Fetch only the listed paths of `target_type`
    pub fn paths(target_type: impl Into<String>, paths: &[&str]) -> Self {
        Self {
            target_type: target_type.into(),
            fetch_all: false,
            path_set: paths.iter().map(|p| (*p).to_string()).collect(),
        }
    }

    /// Match objects of `target_type` without fetching properties
    pub fn none(target_type: impl Into<String>) -> Self {
        Self::paths(target_type, &[])
    }
}

/// Traversal step: a by-name reference or an inline traversal rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectionSpec {
    /// Reference to a rule defined elsewhere in the same query
    Reference {
        /// Rule name
        name: String,
    },
    /// Inline traversal rule
    Traversal(TraversalSpec),
}

impl SelectionSpec {
    /// Reference a rule by name
    pub fn reference(name: impl Into<String>) -> Self {
        SelectionSpec::Reference { name: name.into() }
    }

    /// Name of the referenced or defined rule
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            SelectionSpec::Reference { name } => name,
            SelectionSpec::Traversal(spec) => &spec.name,
        }
    }
}

/// "From an object of `source_type`, follow `relation_path`, then apply
/// `nested` at every object reached."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalSpec {
    /// Rule name, referenced by `SelectionSpec::Reference`
    pub name: String,
    /// Type the rule applies to
    #[serde(rename = "type")]
    pub source_type: String,
    /// Property holding the related object(s)
    #[serde(rename = "path")]
    pub relation_path: String,
    /// Whether objects reached by this rule are excluded from the result
    #[serde(default)]
    pub skip: bool,
    /// Selections applied at each reached object
    #[serde(rename = "selectSet", default)]
    pub nested: Vec<SelectionSpec>,
}

/// Where a traversal starts and which rules apply from there
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSpec {
    /// Starting object
    #[serde(rename = "obj")]
    pub root: ObjectIdentity,
    /// Whether the starting object itself is excluded from the result
    #[serde(default)]
    pub skip: bool,
    /// Selections applied at the starting object
    #[serde(rename = "selectSet", default)]
    pub selection_set: Vec<SelectionSpec>,
}

impl ObjectSpec {
    /// Object spec without traversal
    #[must_use]
    pub fn single(root: ObjectIdentity) -> Self {
        Self {
            root,
            skip: false,
            selection_set: Vec::new(),
        }
    }
}

/// Complete query sent to the property collector in one call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyFilterSpec {
    /// Properties to fetch, per declared type
    #[serde(rename = "propSet")]
    pub prop_set: Vec<PropertySpec>,
    /// Starting points and traversal rules
    #[serde(rename = "objectSet")]
    pub object_set: Vec<ObjectSpec>,
}

impl PropertyFilterSpec {
    /// Referenced rule names that resolve neither inline nor in `catalog`
    ///
    /// The server rejects a query with dangling references, so an empty
    /// result is required for every spec the builder produces.
    #[must_use]
    pub fn dangling_references(&self, catalog: &TraversalCatalog) -> Vec<String> {
        let mut defined = HashSet::new();
        let mut referenced = Vec::new();

        let mut stack: Vec<&SelectionSpec> = self
            .object_set
            .iter()
            .flat_map(|o| o.selection_set.iter())
            .collect();
        while let Some(selection) = stack.pop() {
            match selection {
                SelectionSpec::Reference { name } => referenced.push(name.as_str()),
                SelectionSpec::Traversal(spec) => {
                    defined.insert(spec.name.as_str());
                    stack.extend(spec.nested.iter());
                }
            }
        }

        let mut dangling: Vec<String> = referenced
            .into_iter()
            .filter(|name| !defined.contains(name) && catalog.rule(name).is_none())
            .map(str::to_string)
            .collect();
        dangling.sort();
        dangling.dedup();
        dangling
    }
}

/// One named property in a result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicProperty {
    /// Property path
    pub name: String,
    /// Property value
    pub val: WireValue,
}

/// One result row: an object and its fetched properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectContent {
    /// Matched object
    pub obj: ObjectIdentity,
    /// Fetched properties, in server order
    #[serde(rename = "propSet", default)]
    pub prop_set: Vec<DynamicProperty>,
}

impl ObjectContent {
    /// Look up a fetched property by name
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&WireValue> {
        self.prop_set.iter().find(|p| p.name == name).map(|p| &p.val)
    }
}

/// Builds property filter specs
///
/// Pure data assembly: performs no I/O and never mutates the catalog.
#[derive(Debug, Clone, Copy)]
pub struct QuerySpecBuilder<'a> {
    catalog: &'a TraversalCatalog,
}

impl<'a> QuerySpecBuilder<'a> {
    /// Create a builder over a traversal catalog
    #[must_use]
    pub fn new(catalog: &'a TraversalCatalog) -> Self {
        Self { catalog }
    }

    /// Filter spec selecting every object below `root`, at any depth
    ///
    /// The object spec carries the folder rule plus every rule reachable from
    /// it by name, inline, so the server can recurse through folders of
    /// folders and pools of pools.
    #[must_use]
    pub fn full_traversal(&self, root: ObjectIdentity, property_spec: PropertySpec) -> PropertyFilterSpec {
        let selection_set = self
            .catalog
            .reachable_from(FOLDER_CHILDREN)
            .into_iter()
            .map(|rule| SelectionSpec::Traversal(rule.clone()))
            .collect();

        let spec = PropertyFilterSpec {
            prop_set: vec![property_spec],
            object_set: vec![ObjectSpec {
                root,
                skip: false,
                selection_set,
            }],
        };
        debug_assert!(spec.dangling_references(self.catalog).is_empty());
        spec
    }

    /// Filter spec for one object's own properties
    #[must_use]
    pub fn single_object(&self, identity: ObjectIdentity, property_spec: PropertySpec) -> PropertyFilterSpec {
        PropertyFilterSpec {
            prop_set: vec![property_spec],
            object_set: vec![ObjectSpec::single(identity)],
        }
    }

    /// Filter spec for several objects' own properties, in one call
    #[must_use]
    pub fn batch(&self, identities: &[ObjectIdentity], property_spec: PropertySpec) -> PropertyFilterSpec {
        PropertyFilterSpec {
            prop_set: vec![property_spec],
            object_set: identities.iter().cloned().map(ObjectSpec::single).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::catalog::{TraversalCatalog, catalog};

    fn root() -> ObjectIdentity {
        ObjectIdentity::new("Folder", "group-d1")
    }

    #[test]
    fn test_full_traversal_includes_all_rules() {
        let spec = QuerySpecBuilder::new(catalog()).full_traversal(root(), PropertySpec::none("VirtualMachine"));

        assert_eq!(spec.object_set.len(), 1);
        let object = &spec.object_set[0];
        assert_eq!(object.root, root());

        let mut names: Vec<&str> = object.selection_set.iter().map(SelectionSpec::name).collect();
        assert_eq!(names[0], FOLDER_CHILDREN);
        names.sort_unstable();
        let mut expected: Vec<&str> = catalog().rules().iter().map(|r| r.name.as_str()).collect();
        expected.sort_unstable();
        assert_eq!(names, expected);
        assert!(spec.dangling_references(catalog()).is_empty());
    }

    #[test]
    fn test_full_traversal_is_deterministic() {
        let builder = QuerySpecBuilder::new(catalog());
        let a = builder.full_traversal(root(), PropertySpec::all("HostSystem"));
        let b = builder.full_traversal(root(), PropertySpec::all("HostSystem"));
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_single_object_has_no_traversal() {
        let id = ObjectIdentity::new("VirtualMachine", "vm-12");
        let spec = QuerySpecBuilder::new(catalog()).single_object(id.clone(), PropertySpec::all("VirtualMachine"));

        assert_eq!(spec.prop_set, vec![PropertySpec::all("VirtualMachine")]);
        assert_eq!(spec.object_set, vec![ObjectSpec::single(id)]);
    }

    #[test]
    fn test_batch_one_object_spec_per_identity() {
        let ids = vec![
            ObjectIdentity::new("HostSystem", "host-1"),
            ObjectIdentity::new("HostSystem", "host-2"),
        ];
        let spec = QuerySpecBuilder::new(catalog()).batch(&ids, PropertySpec::all("HostSystem"));

        let roots: Vec<_> = spec.object_set.iter().map(|o| o.root.clone()).collect();
        assert_eq!(roots, ids);
        assert!(spec.object_set.iter().all(|o| o.selection_set.is_empty()));
    }

    #[test]
    fn test_dangling_reference_detected() {
        let spec = PropertyFilterSpec {
            prop_set: vec![PropertySpec::all("Folder")],
            object_set: vec![ObjectSpec {
                root: root(),
                skip: false,
                selection_set: vec![
                    SelectionSpec::reference("no-such-rule"),
                    SelectionSpec::reference(FOLDER_CHILDREN),
                ],
            }],
        };
        assert_eq!(spec.dangling_references(catalog()), vec!["no-such-rule".to_string()]);

        let empty = TraversalCatalog::from_rules(Vec::new());
        assert_eq!(
            spec.dangling_references(&empty),
            vec!["folder-children".to_string(), "no-such-rule".to_string()]
        );
    }

    #[test]
    fn test_inline_definition_resolves_reference() {
        let spec = PropertyFilterSpec {
            prop_set: vec![PropertySpec::all("Folder")],
            object_set: vec![ObjectSpec {
                root: root(),
                skip: false,
                selection_set: vec![SelectionSpec::Traversal(TraversalSpec {
                    name: "custom".into(),
                    source_type: "Folder".into(),
                    relation_path: "childEntity".into(),
                    skip: false,
                    nested: vec![SelectionSpec::reference("custom")],
                })],
            }],
        };
        let empty = TraversalCatalog::from_rules(Vec::new());
        assert!(spec.dangling_references(&empty).is_empty());
    }

    #[test]
    fn test_property_spec_wire_shape() {
        let json = serde_json::to_value(PropertySpec::paths("Folder", &["name", "childEntity"])).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "Folder", "all": false, "pathSet": ["childEntity", "name"]})
        );
    }
}
