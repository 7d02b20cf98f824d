use serde_json::{Map, Value as Json};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use super::depends_on_ops;
use crate::errors::{NexconError, Result};
use crate::logging_facility::elapsed_ms;
use crate::export::nexus_structure::value_to_json;
use crate::export::LinkTarget;
use crate::model::classes::{
    belongs_in_entry, is_component_class, DESCRIPTION, LINK_TARGET, NC_STREAM, NX_ENTRY,
    NX_INSTRUMENT, NX_SAMPLE,
};
use crate::model::{classify, Component, Transform};
use crate::registry::DependencyRegistry;
use crate::rules::validation;
use crate::store::node::validate_name;
use crate::store::{ChangeEvent, NodeId, NodeKind, Store, Value, NX_CLASS};
use crate::{log_op_end, log_op_error, log_op_start};

/// Top-level owner of an instrument document
///
/// Holds the store and the dependency registry derived from it. All component
/// and transform handles read and write through an `Instrument`.
#[derive(Debug, Clone)]
pub struct Instrument {
    store: Store,
    registry: DependencyRegistry,
    entry: NodeId,
    instrument_group: NodeId,
}

impl Default for Instrument {
    fn default() -> Self {
        Self::new()
    }
}

impl Instrument {
    /// Create an empty document: `/entry`, `/entry/instrument` and `/entry/sample`
    pub fn new() -> Self {
        let mut store = Store::new();
        let root = store.root();
        let entry = store
            .create_group(root, "entry", Some(NX_ENTRY))
            .expect("fresh store accepts /entry");
        let instrument_group = store
            .create_group(entry, "instrument", Some(NX_INSTRUMENT))
            .expect("fresh store accepts /entry/instrument");
        store
            .create_group(entry, "sample", Some(NX_SAMPLE))
            .expect("fresh store accepts /entry/sample");
        store.take_events();

        Self {
            store,
            registry: DependencyRegistry::new(),
            entry,
            instrument_group,
        }
    }

    /// Adopt a loaded store and rebuild the dependency registry from it
    ///
    /// # Errors
    /// * `NodeNotFound` - the store has no `NXentry` under the root or no
    ///   `NXinstrument` under the entry
    pub fn load(store: Store) -> Result<Self> {
        let entry = find_child_of_class(&store, store.root(), NX_ENTRY).ok_or_else(|| {
            NexconError::NodeNotFound {
                path: "/entry".to_string(),
            }
        })?;
        let instrument_group =
            find_child_of_class(&store, entry, NX_INSTRUMENT).ok_or_else(|| {
                NexconError::NodeNotFound {
                    path: format!("{}/instrument", store.absolute_path(entry).unwrap_or_default()),
                }
            })?;

        let mut instrument = Self {
            store,
            registry: DependencyRegistry::new(),
            entry,
            instrument_group,
        };
        instrument.generate_transform_dependency_lists()?;
        instrument.store.take_events();
        Ok(instrument)
    }

    /// Parse a JSON document and [`Instrument::load`] it
    pub fn from_json(json: &str) -> Result<Self> {
        let store: Store = serde_json::from_str(json)?;
        Self::load(store)
    }

    /// Serialize the store; the registry is derived and not written
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.store)?)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn registry(&self) -> &DependencyRegistry {
        &self.registry
    }

    pub(crate) fn registry_mut(&mut self) -> &mut DependencyRegistry {
        &mut self.registry
    }

    pub fn entry(&self) -> NodeId {
        self.entry
    }

    pub fn instrument_group(&self) -> NodeId {
        self.instrument_group
    }

    /// Drain the change events produced since the last call
    pub fn take_events(&mut self) -> Vec<ChangeEvent> {
        self.store.take_events()
    }

    /// Create a component group
    ///
    /// Spaces in `name` become underscores. Monitors and samples go under the
    /// entry, every other class under the instrument group.
    ///
    /// # Arguments
    /// * `name` - Node name for the component
    /// * `nx_class` - One of the known component classes
    /// * `description` - Written as the `description` field when non-empty
    ///
    /// # Errors
    /// * `InvalidValue` - unknown component class
    /// * `NodeAlreadyExists` - the parent already has a child with that name
    /// * `InvalidName` - name is empty or contains `/`
    pub fn create_component(
        &mut self,
        name: &str,
        nx_class: &str,
        description: &str,
    ) -> Result<Component> {
        let start = Instant::now();
        log_op_start!("create_component", nx_class = nx_class);

        let result = self.create_component_inner(name, nx_class, description);

        match &result {
            Ok(_) => log_op_end!("create_component", duration_ms = elapsed_ms(start)),
            Err(e) => log_op_error!("create_component", e, duration_ms = elapsed_ms(start)),
        }
        result
    }

    fn create_component_inner(
        &mut self,
        name: &str,
        nx_class: &str,
        description: &str,
    ) -> Result<Component> {
        let parent = if belongs_in_entry(nx_class) {
            self.entry
        } else {
            self.instrument_group
        };
        if !is_component_class(nx_class) {
            return Err(NexconError::InvalidValue {
                path: self.store.absolute_path(parent)?,
                name: NX_CLASS.to_string(),
                reason: format!("'{}' is not a component class", nx_class),
            });
        }

        let name = name.replace(' ', "_");
        let id = self.store.create_group(parent, &name, Some(nx_class))?;
        if !description.is_empty() {
            self.store
                .set_field(id, DESCRIPTION, Value::from(description))?;
        }
        Ok(Component::from_id(id))
    }

    /// Delete a component and everything under it
    ///
    /// Stricter than a plain subtree delete: the removal is refused while any
    /// entity outside the component still points at a transform inside it, so
    /// no depends_on is left dangling. Re-point those entities first. Edges
    /// between nodes inside the component are dropped with it.
    ///
    /// # Errors
    /// * `WrongNodeKind` / `UnknownNode` - not a live component
    /// * `HasDependents` - an entity outside the component depends on one of its
    ///   transforms; lists the outside paths
    pub fn remove_component(&mut self, component: Component) -> Result<()> {
        let start = Instant::now();
        log_op_start!("remove_component", node_path = %self.path_or_id(component.id()));

        let result = self.remove_component_inner(component);

        match &result {
            Ok(()) => log_op_end!("remove_component", duration_ms = elapsed_ms(start)),
            Err(e) => log_op_error!("remove_component", e, duration_ms = elapsed_ms(start)),
        }
        result
    }

    fn remove_component_inner(&mut self, component: Component) -> Result<()> {
        // Step 1: must be a component
        Component::from_node(self, component.id())?;
        let subtree = self.store.walk(component.id())?;

        // Step 2: no outside entity may depend on anything inside
        for node in &subtree {
            let outside: BTreeSet<NodeId> = self
                .registry
                .dependents_of(*node)
                .into_iter()
                .filter(|dep| !self.store.is_within(*dep, component.id()))
                .collect();
            if !outside.is_empty() {
                let mut dependents = outside
                    .into_iter()
                    .map(|dep| self.store.absolute_path(dep))
                    .collect::<Result<Vec<_>>>()?;
                dependents.sort();
                return Err(NexconError::HasDependents {
                    path: self.store.absolute_path(*node)?,
                    dependents,
                });
            }
        }

        // Step 3: delete, then drop every edge touching the subtree
        self.store.delete_node(component.id())?;
        for node in subtree {
            self.registry.forget(node);
        }
        Ok(())
    }

    /// Every component in the document, in tree order
    pub fn get_component_list(&self) -> Result<Vec<Component>> {
        let mut components = Vec::new();
        for id in self.store.walk(self.store.root())? {
            if let Some(crate::model::EntityKind::Component) = classify(&self.store, id)? {
                components.push(Component::from_id(id));
            }
        }
        Ok(components)
    }

    /// Component at an absolute path
    ///
    /// # Errors
    /// * `NodeNotFound` - nothing at `path`
    /// * `WrongNodeKind` - the node is not a component
    pub fn component_at(&self, path: &str) -> Result<Component> {
        let id = self.store.require(path)?;
        Component::from_node(self, id)
    }

    /// Transform at an absolute path
    pub fn transform_at(&self, path: &str) -> Result<Transform> {
        let id = self.store.require(path)?;
        Transform::from_node(self, id)
    }

    /// Create an `NCstream` group under `parent` holding one dataset per field
    ///
    /// Dotted field names (`"dtype.size"`) are kept as written and nest only
    /// when exported through [`Instrument::get_streams`].
    ///
    /// # Errors
    /// * `NodeNotFound` - nothing at `parent`
    /// * `InvalidName` / `NodeAlreadyExists` - unusable group or field name
    pub fn create_stream_group(
        &mut self,
        parent: &str,
        name: &str,
        fields: &BTreeMap<String, Value>,
    ) -> Result<NodeId> {
        let start = Instant::now();
        log_op_start!("create_stream_group", node_path = parent);

        let result = self.create_stream_group_inner(parent, name, fields);

        match &result {
            Ok(_) => log_op_end!("create_stream_group", duration_ms = elapsed_ms(start)),
            Err(e) => log_op_error!("create_stream_group", e, duration_ms = elapsed_ms(start)),
        }
        result
    }

    fn create_stream_group_inner(
        &mut self,
        parent: &str,
        name: &str,
        fields: &BTreeMap<String, Value>,
    ) -> Result<NodeId> {
        let parent = self.store.require(parent)?;
        if let Some((field, reason)) = fields
            .keys()
            .find_map(|f| validate_name(f).map(|reason| (f, reason)))
        {
            return Err(NexconError::InvalidName {
                name: field.clone(),
                reason: reason.to_string(),
            });
        }

        let group = self.store.create_group(parent, name, Some(NC_STREAM))?;
        for (field, value) in fields {
            self.store.set_field(group, field, value.clone())?;
        }
        Ok(group)
    }

    /// Create a group under `parent` that exports as a link to `target`
    ///
    /// # Errors
    /// * `NodeNotFound` - nothing at `parent` or at `target`
    /// * `InvalidName` / `NodeAlreadyExists` - unusable name
    pub fn create_link(&mut self, parent: &str, name: &str, target: &str) -> Result<NodeId> {
        let start = Instant::now();
        log_op_start!("create_link", node_path = parent, target_path = target);

        let result = self.create_link_inner(parent, name, target);

        match &result {
            Ok(_) => log_op_end!("create_link", duration_ms = elapsed_ms(start)),
            Err(e) => log_op_error!("create_link", e, duration_ms = elapsed_ms(start)),
        }
        result
    }

    fn create_link_inner(&mut self, parent: &str, name: &str, target: &str) -> Result<NodeId> {
        let parent = self.store.require(parent)?;
        self.store.require(target)?;
        let group = self.store.create_group(parent, name, None)?;
        self.store
            .set_attribute(group, LINK_TARGET, Value::from(target))?;
        Ok(group)
    }

    /// Stream settings of every `NCstream` group under the entry, keyed by path
    ///
    /// Each dataset becomes a key of the settings object. A dotted name nests:
    /// `dtype.size = 4` yields `{"dtype": {"size": 4}}`. Child groups are ignored.
    pub fn get_streams(&self) -> Result<BTreeMap<String, Json>> {
        let mut streams = BTreeMap::new();
        for id in self.store.walk(self.entry)? {
            if self.store.nx_class(id)? != Some(NC_STREAM) {
                continue;
            }
            let mut settings = Map::new();
            for child in self.store.children_of(id)? {
                let node = self.store.node(*child)?;
                if let NodeKind::Dataset { value } = node.kind() {
                    let segments: Vec<&str> = node.name().split('.').collect();
                    insert_nested(&mut settings, &segments, value_to_json(&self.store, value)?);
                }
            }
            streams.insert(self.store.absolute_path(id)?, Json::Object(settings));
        }
        Ok(streams)
    }

    /// Link markers under the entry, keyed by the marker group's path
    pub fn get_links(&self) -> Result<BTreeMap<String, LinkTarget>> {
        let mut links = BTreeMap::new();
        for id in self.store.walk(self.entry)? {
            let node = self.store.node(id)?;
            if !node.is_group() {
                continue;
            }
            if let Some(target) = node.attribute(LINK_TARGET).and_then(Value::as_str) {
                links.insert(
                    self.store.absolute_path(id)?,
                    LinkTarget {
                        name: node.name().to_string(),
                        target: target.to_string(),
                    },
                );
            }
        }
        Ok(links)
    }

    /// Rebuild the dependency registry from the stored depends_on values
    ///
    /// Re-applies the pointer of every transform and component. Legacy path
    /// strings are rewritten as typed references; dangling pointers are skipped.
    /// Returns the number of edges registered.
    pub fn generate_transform_dependency_lists(&mut self) -> Result<usize> {
        let start = Instant::now();
        log_op_start!("rebuild_registry");

        self.registry.clear();
        let mut owners = Vec::new();
        for id in self.store.walk(self.store.root())? {
            if let Some(kind) = classify(&self.store, id)? {
                if kind.has_depends_on() {
                    owners.push(id);
                }
            }
        }

        let mut result = Ok(());
        for owner in owners {
            if let Err(e) = depends_on_ops::reapply_stored(self, owner) {
                result = Err(e);
                break;
            }
        }

        match result {
            Ok(()) => {
                let edges = self.registry.edge_count();
                log_op_end!(
                    "rebuild_registry",
                    duration_ms = elapsed_ms(start),
                    dependents_len = edges
                );
                Ok(edges)
            }
            Err(e) => {
                log_op_error!("rebuild_registry", &e, duration_ms = elapsed_ms(start));
                Err(e)
            }
        }
    }

    /// Check document invariants; see [`validation::validate_instrument`]
    pub fn validate(&self) -> Result<()> {
        validation::validate_instrument(self)
    }

    fn path_or_id(&self, id: NodeId) -> String {
        self.store
            .absolute_path(id)
            .unwrap_or_else(|_| id.to_string())
    }
}

fn find_child_of_class(store: &Store, parent: NodeId, nx_class: &str) -> Option<NodeId> {
    store
        .children_of(parent)
        .ok()?
        .iter()
        .copied()
        .find(|c| store.nx_class(*c).ok().flatten() == Some(nx_class))
}

/// Set `segments` as a path of nested objects; the last segment takes `value`
///
/// An intermediate key already holding a plain value is replaced by an object.
fn insert_nested(target: &mut Map<String, Json>, segments: &[&str], value: Json) {
    match segments {
        [] => {}
        [last] => {
            target.insert((*last).to_string(), value);
        }
        [first, rest @ ..] => {
            let slot = target
                .entry((*first).to_string())
                .or_insert_with(|| Json::Object(Map::new()));
            if !slot.is_object() {
                *slot = Json::Object(Map::new());
            }
            if let Json::Object(inner) = slot {
                insert_nested(inner, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Vector3;

    #[test]
    fn test_new_document_layout() {
        let inst = Instrument::new();
        let store = inst.store();
        assert_ne!(inst.entry(), store.root());
        assert_eq!(store.parent_of(inst.instrument_group()).unwrap(), Some(inst.entry()));
        assert_eq!(store.find("/entry"), Some(inst.entry()));
        assert_eq!(store.find("/entry/instrument"), Some(inst.instrument_group()));
        assert_eq!(store.nx_class(store.require("/entry/sample").unwrap()).unwrap(), Some("NXsample"));
        assert_eq!(inst.get_component_list().unwrap().len(), 1);
    }

    #[test]
    fn test_routing_table() {
        let mut inst = Instrument::new();
        let mon = inst.create_component("beam monitor", "NXmonitor", "").unwrap();
        let det = inst.create_component("detector", "NXdetector", "").unwrap();

        assert_eq!(mon.absolute_path(&inst).unwrap(), "/entry/beam_monitor");
        assert_eq!(det.absolute_path(&inst).unwrap(), "/entry/instrument/detector");
    }

    #[test]
    fn test_unknown_class_rejected() {
        let mut inst = Instrument::new();
        let err = inst.create_component("x", "NXwidget", "").unwrap_err();
        assert!(matches!(err, NexconError::InvalidValue { .. }));
    }

    #[test]
    fn test_component_list_in_tree_order() {
        let mut inst = Instrument::new();
        inst.create_component("source", "NXsource", "").unwrap();
        inst.create_component("detector", "NXdetector", "").unwrap();

        let paths: Vec<String> = inst
            .get_component_list()
            .unwrap()
            .iter()
            .map(|c| c.absolute_path(&inst).unwrap())
            .collect();
        assert_eq!(
            paths,
            vec![
                "/entry/instrument/source",
                "/entry/instrument/detector",
                "/entry/sample"
            ]
        );
    }

    #[test]
    fn test_remove_component_refused_while_depended_on() {
        let mut inst = Instrument::new();
        let source = inst.create_component("source", "NXsource", "").unwrap();
        let det = inst.create_component("detector", "NXdetector", "").unwrap();
        let base = source
            .add_translation(&mut inst, Vector3::new(0.0, 0.0, -5.0), None, None)
            .unwrap();
        det.set_depends_on(&mut inst, Some(base)).unwrap();

        let err = inst.remove_component(source).unwrap_err();
        assert_eq!(
            err,
            NexconError::HasDependents {
                path: "/entry/instrument/source/transformations/translation_1".to_string(),
                dependents: vec!["/entry/instrument/detector".to_string()],
            }
        );

        det.set_depends_on(&mut inst, None).unwrap();
        inst.remove_component(source).unwrap();
        assert_eq!(inst.registry().edge_count(), 0);
        assert_eq!(inst.store().find("/entry/instrument/source"), None);
    }

    #[test]
    fn test_remove_component_with_internal_edges() {
        let mut inst = Instrument::new();
        let det = inst.create_component("detector", "NXdetector", "").unwrap();
        let r = det
            .add_rotation(&mut inst, Vector3::new(0.0, 0.0, 1.0), 5.0, None, None)
            .unwrap();
        det.add_translation(&mut inst, Vector3::new(1.0, 0.0, 0.0), None, Some(r))
            .unwrap();
        det.set_depends_on(&mut inst, Some(r)).unwrap();
        inst.take_events();

        inst.remove_component(det).unwrap();

        assert_eq!(inst.registry().edge_count(), 0);
        assert_eq!(
            inst.take_events(),
            vec![ChangeEvent::NodeRemoved {
                path: "/entry/instrument/detector".to_string()
            }]
        );
    }

    #[test]
    fn test_refused_removal_leaves_subtree_in_place() {
        // GIVEN a monitor depending on a transform inside the source
        let mut inst = Instrument::new();
        let source = inst.create_component("source", "NXsource", "").unwrap();
        let monitor = inst.create_component("monitor", "NXmonitor", "").unwrap();
        let base = source
            .add_translation(&mut inst, Vector3::new(0.0, 0.0, -5.0), None, None)
            .unwrap();
        monitor.set_depends_on(&mut inst, Some(base)).unwrap();
        let nodes_before = inst.store().node_count();
        let edges_before = inst.registry().edge_count();
        inst.take_events();

        // WHEN removing the source
        let err = inst.remove_component(source).unwrap_err();

        // THEN nothing under it is deleted and the pointer still resolves
        assert!(matches!(err, NexconError::HasDependents { .. }));
        assert_eq!(inst.store().node_count(), nodes_before);
        assert_eq!(inst.registry().edge_count(), edges_before);
        assert_eq!(monitor.depends_on(&inst).unwrap(), Some(base));
        assert!(inst.take_events().is_empty());
    }

    #[test]
    fn test_json_round_trip_rebuilds_registry() {
        let mut inst = Instrument::new();
        let det = inst.create_component("detector", "NXdetector", "").unwrap();
        let r = det
            .add_rotation(&mut inst, Vector3::new(0.0, 0.0, 1.0), 90.0, None, None)
            .unwrap();
        det.set_depends_on(&mut inst, Some(r)).unwrap();

        let loaded = Instrument::from_json(&inst.to_json().unwrap()).unwrap();

        assert_eq!(loaded.registry(), inst.registry());
        assert!(loaded.store().pending_events().is_empty());
    }

    #[test]
    fn test_load_without_entry_fails() {
        let err = Instrument::load(Store::new()).unwrap_err();
        assert!(matches!(err, NexconError::NodeNotFound { .. }));
    }

    #[test]
    fn test_get_streams_nests_dotted_fields() {
        let mut inst = Instrument::new();
        inst.create_component("detector", "NXdetector", "").unwrap();
        let fields = BTreeMap::from([
            ("topic".to_string(), Value::from("det_events")),
            ("writer_module".to_string(), Value::from("ev42")),
            ("nexus.indices.index_every_mb".to_string(), Value::Int(1)),
            ("nexus.indices.index_every_kb".to_string(), Value::Int(512)),
            ("adc_pulse_debug".to_string(), Value::Bool(true)),
        ]);
        inst.create_stream_group("/entry/instrument/detector", "events", &fields)
            .unwrap();

        let streams = inst.get_streams().unwrap();

        assert_eq!(streams.len(), 1);
        assert_eq!(
            streams["/entry/instrument/detector/events"],
            serde_json::json!({
                "topic": "det_events",
                "writer_module": "ev42",
                "adc_pulse_debug": true,
                "nexus": {"indices": {"index_every_mb": 1, "index_every_kb": 512}}
            })
        );
    }

    #[test]
    fn test_stream_group_is_not_a_component() {
        let mut inst = Instrument::new();
        inst.create_stream_group("/entry", "run_info", &BTreeMap::new())
            .unwrap();

        assert_eq!(inst.get_component_list().unwrap().len(), 1);
        assert_eq!(
            inst.get_streams().unwrap()["/entry/run_info"],
            serde_json::json!({})
        );
    }

    #[test]
    fn test_stream_group_bad_field_name_writes_nothing() {
        let mut inst = Instrument::new();
        let before = inst.to_json().unwrap();
        let fields = BTreeMap::from([("a/b".to_string(), Value::Int(1))]);

        let err = inst
            .create_stream_group("/entry", "bad", &fields)
            .unwrap_err();

        assert!(matches!(err, NexconError::InvalidName { .. }));
        assert_eq!(inst.to_json().unwrap(), before);
    }

    #[test]
    fn test_get_links_reads_markers() {
        let mut inst = Instrument::new();
        inst.create_component("detector", "NXdetector", "").unwrap();
        inst.create_component("monitor", "NXmonitor", "").unwrap();
        inst.create_link("/entry/monitor", "data", "/entry/instrument/detector")
            .unwrap();

        let links = inst.get_links().unwrap();

        assert_eq!(
            links,
            BTreeMap::from([(
                "/entry/monitor/data".to_string(),
                LinkTarget {
                    name: "data".to_string(),
                    target: "/entry/instrument/detector".to_string(),
                }
            )])
        );
    }

    #[test]
    fn test_link_to_missing_target_rejected() {
        let mut inst = Instrument::new();
        let err = inst
            .create_link("/entry", "data", "/entry/instrument/nothing")
            .unwrap_err();
        assert!(matches!(err, NexconError::NodeNotFound { .. }));
        assert!(inst.get_links().unwrap().is_empty());
    }

    #[test]
    fn test_insert_nested_replaces_scalar() {
        let mut map = Map::new();
        insert_nested(&mut map, &["a"], serde_json::json!(1));
        insert_nested(&mut map, &["a", "b"], serde_json::json!(2));
        assert_eq!(Json::Object(map), serde_json::json!({"a": {"b": 2}}));
    }
}
