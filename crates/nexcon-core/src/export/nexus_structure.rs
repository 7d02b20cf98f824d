use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::errors::Result;
use crate::logging_facility::elapsed_ms;
use crate::ops::Instrument;
use crate::store::{NodeId, NodeKind, Store, Value};
use crate::{log_op_end, log_op_error, log_op_start};

/// Replacement of a group's children by a link to another path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTarget {
    pub name: String,
    pub target: String,
}

/// Render the instrument's entry as a `nexus_structure` tree
///
/// Groups whose absolute path is a key of `streams` get a single stream child
/// instead of their own children; keys of `links` get a single link child.
/// Streams win when a path is in both maps.
///
/// # Arguments
/// * `instrument` - Document to export
/// * `streams` - Stream settings keyed by group path, emitted verbatim
/// * `links` - Link replacements keyed by group path
///
/// # Errors
///
/// Returns `UnknownNode` if a reference targets a deleted node.
pub fn nexus_structure(
    instrument: &Instrument,
    streams: &BTreeMap<String, Json>,
    links: &BTreeMap<String, LinkTarget>,
) -> Result<Json> {
    let start = Instant::now();
    log_op_start!("nexus_structure");

    let converter = Converter {
        store: instrument.store(),
        streams,
        links,
    };
    let result = converter
        .node_to_json(instrument.entry())
        .map(|entry| json!({ "children": [entry] }));

    match &result {
        Ok(_) => log_op_end!("nexus_structure", duration_ms = elapsed_ms(start)),
        Err(e) => log_op_error!("nexus_structure", e, duration_ms = elapsed_ms(start)),
    }
    result
}

struct Converter<'a> {
    store: &'a Store,
    streams: &'a BTreeMap<String, Json>,
    links: &'a BTreeMap<String, LinkTarget>,
}

impl Converter<'_> {
    fn node_to_json(&self, id: NodeId) -> Result<Json> {
        let node = self.store.node(id)?;
        let path = self.store.absolute_path(id)?;

        let mut out = match node.kind() {
            NodeKind::Group { children } => self.group_to_json(&path, children)?,
            NodeKind::Dataset { value } => self.dataset_to_json(&path, value)?,
        };

        if !node.attributes().is_empty() {
            let attributes = node
                .attributes()
                .iter()
                .map(|(name, value)| {
                    Ok(json!({ "name": name, "values": self.value_to_json(value)? }))
                })
                .collect::<Result<Vec<_>>>()?;
            out.insert("attributes".to_string(), Json::Array(attributes));
        }
        Ok(Json::Object(out))
    }

    fn group_to_json(&self, path: &str, children: &[NodeId]) -> Result<Map<String, Json>> {
        let children = if let Some(stream) = self.streams.get(path) {
            vec![json!({ "type": "stream", "stream": stream })]
        } else if let Some(link) = self.links.get(path) {
            vec![json!({ "type": "link", "name": link.name, "target": link.target })]
        } else {
            children
                .iter()
                .map(|c| self.node_to_json(*c))
                .collect::<Result<Vec<_>>>()?
        };

        let mut out = Map::new();
        out.insert("type".to_string(), json!("group"));
        out.insert("name".to_string(), json!(path));
        out.insert("children".to_string(), Json::Array(children));
        Ok(out)
    }

    fn dataset_to_json(&self, path: &str, value: &Value) -> Result<Map<String, Json>> {
        let mut dataset = Map::new();
        dataset.insert("type".to_string(), json!(value.type_name()));
        if let Some(len) = value.len() {
            dataset.insert("size".to_string(), json!([len]));
        }

        let mut out = Map::new();
        out.insert("type".to_string(), json!("dataset"));
        out.insert("name".to_string(), json!(path));
        out.insert("dataset".to_string(), Json::Object(dataset));
        out.insert("values".to_string(), self.value_to_json(value)?);
        Ok(out)
    }

    fn value_to_json(&self, value: &Value) -> Result<Json> {
        value_to_json(self.store, value)
    }
}

/// JSON rendering of a stored value; references become their wire form
pub(crate) fn value_to_json(store: &Store, value: &Value) -> Result<Json> {
    Ok(match value {
        Value::Float(v) => json!(v),
        Value::Int(v) => json!(v),
        Value::Bool(v) => json!(v),
        Value::Str(v) => json!(v),
        Value::FloatArray(v) => json!(v),
        Value::IntArray(v) => json!(v),
        Value::StrArray(v) => json!(v),
        Value::Reference(r) => json!(store.wire_form(r)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Vector3;

    fn find_child<'a>(node: &'a Json, name: &str) -> &'a Json {
        node["children"]
            .as_array()
            .unwrap()
            .iter()
            .find(|c| c["name"] == name)
            .unwrap()
    }

    #[test]
    fn test_structure_mirrors_store() {
        let mut inst = Instrument::new();
        let det = inst.create_component("detector", "NXdetector", "").unwrap();
        let r = det
            .add_rotation(&mut inst, Vector3::new(0.0, 0.0, 1.0), 90.0, None, None)
            .unwrap();
        det.set_depends_on(&mut inst, Some(r)).unwrap();

        let tree = nexus_structure(&inst, &BTreeMap::new(), &BTreeMap::new()).unwrap();

        let entry = &tree["children"][0];
        assert_eq!(entry["type"], "group");
        assert_eq!(entry["name"], "/entry");
        assert_eq!(
            entry["attributes"][0],
            json!({"name": "NX_class", "values": "NXentry"})
        );

        let instrument = find_child(entry, "/entry/instrument");
        let detector = find_child(instrument, "/entry/instrument/detector");
        let depends_on = find_child(detector, "/entry/instrument/detector/depends_on");
        assert_eq!(depends_on["dataset"]["type"], "string");
        assert_eq!(
            depends_on["values"],
            "/entry/instrument/detector/transformations/rotation_1"
        );

        let group = find_child(detector, "/entry/instrument/detector/transformations");
        let rotation = find_child(group, "/entry/instrument/detector/transformations/rotation_1");
        assert_eq!(rotation["type"], "dataset");
        assert_eq!(rotation["dataset"]["type"], "double");
        assert_eq!(rotation["values"], 90.0);
        let attrs = rotation["attributes"].as_array().unwrap();
        assert!(attrs.contains(&json!({"name": "depends_on", "values": "."})));
        assert!(attrs.contains(&json!({"name": "vector", "values": [0.0, 0.0, 1.0]})));
    }

    #[test]
    fn test_stream_and_link_replace_children() {
        let mut inst = Instrument::new();
        let det = inst.create_component("detector", "NXdetector", "").unwrap();
        det.set_field(&mut inst, "x_pixel_offset", Value::FloatArray(vec![0.0, 1.0]))
            .unwrap();
        inst.create_component("monitor", "NXmonitor", "").unwrap();

        let streams = BTreeMap::from([(
            "/entry/instrument/detector".to_string(),
            json!({"topic": "det_events", "writer_module": "ev42"}),
        )]);
        let links = BTreeMap::from([(
            "/entry/monitor".to_string(),
            LinkTarget {
                name: "data".to_string(),
                target: "/entry/instrument/detector".to_string(),
            },
        )]);

        let tree = nexus_structure(&inst, &streams, &links).unwrap();
        let entry = &tree["children"][0];
        let detector = find_child(find_child(entry, "/entry/instrument"), "/entry/instrument/detector");
        let monitor = find_child(entry, "/entry/monitor");

        assert_eq!(
            detector["children"],
            json!([{"type": "stream", "stream": {"topic": "det_events", "writer_module": "ev42"}}])
        );
        assert_eq!(
            monitor["children"],
            json!([{"type": "link", "name": "data", "target": "/entry/instrument/detector"}])
        );
    }

    #[test]
    fn test_array_dataset_has_size() {
        let mut inst = Instrument::new();
        let det = inst.create_component("detector", "NXdetector", "").unwrap();
        det.set_field(&mut inst, "x_pixel_offset", Value::FloatArray(vec![0.0, 1.0, 2.0]))
            .unwrap();

        let tree = nexus_structure(&inst, &BTreeMap::new(), &BTreeMap::new()).unwrap();
        let entry = &tree["children"][0];
        let detector = find_child(find_child(entry, "/entry/instrument"), "/entry/instrument/detector");
        let offsets = find_child(detector, "/entry/instrument/detector/x_pixel_offset");

        assert_eq!(offsets["dataset"], json!({"type": "double", "size": [3]}));
        assert_eq!(offsets["values"], json!([0.0, 1.0, 2.0]));
    }

    #[test]
    fn test_document_streams_and_links_export() {
        let mut inst = Instrument::new();
        inst.create_component("detector", "NXdetector", "").unwrap();
        inst.create_component("monitor", "NXmonitor", "").unwrap();
        let fields = BTreeMap::from([
            ("topic".to_string(), Value::from("det_events")),
            ("dtype.size".to_string(), Value::Int(4)),
        ]);
        inst.create_stream_group("/entry/instrument/detector", "events", &fields)
            .unwrap();
        inst.create_link("/entry/monitor", "data", "/entry/instrument/detector")
            .unwrap();

        let tree =
            nexus_structure(&inst, &inst.get_streams().unwrap(), &inst.get_links().unwrap())
                .unwrap();
        let entry = &tree["children"][0];
        let detector = find_child(find_child(entry, "/entry/instrument"), "/entry/instrument/detector");
        let events = find_child(detector, "/entry/instrument/detector/events");
        let data = find_child(find_child(entry, "/entry/monitor"), "/entry/monitor/data");

        assert_eq!(
            events["children"],
            json!([{"type": "stream", "stream": {"topic": "det_events", "dtype": {"size": 4}}}])
        );
        assert_eq!(
            data["children"],
            json!([{"type": "link", "name": "data", "target": "/entry/instrument/detector"}])
        );
    }
}
