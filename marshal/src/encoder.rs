//! Serialize a [Graph] into the format described in [crate::wire].

use tracing::{debug, instrument, trace};

use crate::errors::EncodeError;
use crate::graph::{Graph, Node, NodeId, Payload};
use crate::wire::{self, varint};

/// Serialize `graph` into a fresh buffer.
pub fn encode(graph: &Graph) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    encode_into(graph, &mut out)?;
    Ok(out)
}

/// Serialize `graph`, appending to `out`.
///
/// On error, `out` is restored to its previous length.
#[instrument(level = "trace", skip_all, fields(nodes = graph.len()), err)]
pub fn encode_into(graph: &Graph, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    let start = out.len();
    let result = write_graph(graph, out);
    if result.is_err() {
        out.truncate(start);
    }
    result
}

fn write_graph(graph: &Graph, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    // Wire ids are positions in the pre-order, so assign them all up
    // front. Back-references then need no fixups.
    let order: Vec<(NodeId, &Node)> = graph.preorder().collect();
    let mut wire_ids = vec![0u32; graph.len()];
    for (wire_id, (id, _)) in order.iter().enumerate() {
        wire_ids[id.index()] = wire_id as u32;
    }

    debug!(count = order.len(), root = %graph.root(), "writing header");
    out.reserve(wire::HEADER_LEN + order.len() * 4);
    out.extend_from_slice(&wire::MAGIC);
    out.extend_from_slice(&wire::FORMAT_VERSION.to_le_bytes());
    varint::encode(order.len() as u64, out);
    // the root is always visited first
    varint::encode(0, out);

    for (wire_id, (id, node)) in order.iter().enumerate() {
        node.check_shape()
            .map_err(|reason| EncodeError::UnsupportedNode {
                node: *id,
                kind: node.kind,
                reason,
            })?;

        trace!(id = wire_id, kind = %node.kind, children = node.children.len(), "record");
        varint::encode(wire_id as u64, out);
        out.push(node.kind.as_u8());
        varint::encode(node.children.len() as u64, out);
        for child in &node.children {
            varint::encode(wire_ids[child.index()] as u64, out);
        }
        write_payload(&node.payload, out);
    }

    Ok(())
}

fn write_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    varint::encode(bytes.len() as u64, out);
    out.extend_from_slice(bytes);
}

fn write_payload(payload: &Payload, out: &mut Vec<u8>) {
    match payload {
        Payload::None => {}
        Payload::Integer(i) => write_bytes(&i.to_signed_bytes_le(), out),
        Payload::Float(f) => out.extend_from_slice(&f.to_bits().to_le_bytes()),
        Payload::Bytes(b) => write_bytes(b, out),
        Payload::Symbol(s) => write_bytes(s.as_bytes(), out),
        Payload::Pattern { source, flags } => {
            write_bytes(source, out);
            varint::encode(flags.bits() as u64, out);
        }
        Payload::Binding { scope, name } => {
            out.push(scope.as_u8());
            write_bytes(name.as_bytes(), out);
        }
    }
}
