//! Pretty-printed format for the node graph.
//!
//! The graph is serialised into a JSON structure listing every
//! reachable node in pre-order, which can then be printed in either
//! minimised or well-formatted style.

use bstr::ByteSlice;
use serde::{ser::SerializeMap, ser::SerializeSeq, Serialize, Serializer};

use crate::graph::{Graph, Node, NodeId, Payload};

pub fn to_json(graph: &Graph) -> String {
    serde_json::ser::to_string_pretty(&SerializeGraph(graph))
        .expect("serializing a graph should always succeed")
}

pub fn to_json_compact(graph: &Graph) -> String {
    serde_json::ser::to_string(&SerializeGraph(graph))
        .expect("serializing a graph should always succeed")
}

#[repr(transparent)]
struct SerializeGraph<'a>(&'a Graph);

struct SerializeNodes<'a>(&'a Graph);

struct SerializeNode<'a>(NodeId, &'a Node);

impl Serialize for SerializeGraph<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("root", &self.0.root().0)?;
        map.serialize_entry("nodes", &SerializeNodes(self.0))?;
        map.end()
    }
}

impl Serialize for SerializeNodes<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(None)?;
        for (id, node) in self.0.preorder() {
            seq.serialize_element(&SerializeNode(id, node))?;
        }
        seq.end()
    }
}

impl Serialize for SerializeNode<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let SerializeNode(id, node) = self;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("id", &id.0)?;
        map.serialize_entry("kind", node.kind.name())?;

        if !node.children.is_empty() {
            let children: Vec<u32> = node.children.iter().map(|c| c.0).collect();
            map.serialize_entry("children", &children)?;
        }

        match &node.payload {
            Payload::None => {}
            // integers may exceed every JSON number type
            Payload::Integer(i) => map.serialize_entry("value", &i.to_string())?,
            Payload::Float(f) => map.serialize_entry("value", f)?,
            Payload::Bytes(b) => map.serialize_entry("value", &b.to_str_lossy())?,
            Payload::Symbol(s) => map.serialize_entry("name", &s.as_bstr().to_str_lossy())?,
            Payload::Pattern { source, flags } => {
                map.serialize_entry("source", &source.to_str_lossy())?;
                map.serialize_entry("flags", &flags.bits())?;
            }
            Payload::Binding { scope, name } => {
                map.serialize_entry("scope", scope.name())?;
                map.serialize_entry("name", &name.as_bstr().to_str_lossy())?;
            }
        }

        map.end()
    }
}
