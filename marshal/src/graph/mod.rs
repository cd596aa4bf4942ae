//! The in-memory node graph: an arena of tagged nodes addressed by
//! dense [NodeId]s, with a single root.
//!
//! Children are stored as ids rather than owned nodes, which lets a
//! node be shared by several parents or referenced by one of its own
//! descendants. Graphs are immutable once built, see [GraphBuilder].

use std::fmt;
use std::ops::Index;

#[cfg(feature = "arbitrary")]
pub mod arbitrary;
mod builder;
mod kind;
mod payload;

pub use builder::GraphBuilder;
pub use kind::{Arity, Category, NodeKind, PayloadKind};
pub use payload::{Payload, PatternFlags, ScopeKind, Symbol};

use crate::errors::ShapeError;

/// Index of a node inside its [Graph]. Ids are graph-local.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single element of the tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub children: Vec<NodeId>,
    pub payload: Payload,
}

impl Node {
    pub fn new(kind: NodeKind, children: Vec<NodeId>, payload: Payload) -> Self {
        Node {
            kind,
            children,
            payload,
        }
    }

    /// A node without children or payload, such as `nil`.
    pub fn leaf(kind: NodeKind) -> Self {
        Node::new(kind, vec![], Payload::None)
    }

    /// Check the child count and payload against the table in [NodeKind].
    pub fn check_shape(&self) -> Result<(), ShapeError> {
        let arity = self.kind.arity();
        if !arity.accepts(self.children.len()) {
            return Err(ShapeError::Arity {
                expected: arity,
                found: self.children.len(),
            });
        }

        let expected = self.kind.payload_kind();
        if self.payload.kind() != expected {
            return Err(ShapeError::Payload {
                expected,
                found: self.payload.kind(),
            });
        }

        Ok(())
    }

    pub fn child(&self, i: usize) -> Option<NodeId> {
        self.children.get(i).copied()
    }
}

/// A root plus every node it can reach.
///
/// Every child id of every node is guaranteed to resolve inside the
/// same graph. Nodes which are not reachable from the root may be
/// present in the arena, but are ignored by [Graph::preorder] and are
/// not serialized.
#[derive(Clone, Debug, PartialEq)]
pub struct Graph {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Graph {
    /// Construct a graph whose child ids have already been checked.
    pub(crate) fn from_checked(nodes: Vec<Node>, root: NodeId) -> Self {
        debug_assert!(root.index() < nodes.len());
        Graph { nodes, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes in the arena, including unreachable ones.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the node with the given id.
    ///
    /// # Panics
    ///
    /// If `id` does not belong to this graph.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// All nodes in arena order, reachable or not.
    pub fn nodes(&self) -> impl ExactSizeIterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    /// Deterministic pre-order walk from the root.
    ///
    /// Children are visited in declared order and every node is
    /// yielded exactly once, at its first visitation, no matter how
    /// often it is referenced. The walk keeps an explicit stack, so
    /// neither deep nor cyclic graphs can exhaust the call stack.
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder {
            graph: self,
            visited: vec![false; self.nodes.len()],
            stack: vec![self.root],
        }
    }

    /// Number of nodes reachable from the root.
    pub fn reachable_len(&self) -> usize {
        self.preorder().count()
    }

    /// Whether the reachable parts of both graphs have the same shape.
    ///
    /// Two graphs are isomorphic if there is a bijection between their
    /// reachable ids which maps root to root and preserves tags,
    /// payloads, child order and sharing. Numeric ids are irrelevant.
    pub fn is_isomorphic(&self, other: &Graph) -> bool {
        let mut forward: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
        let mut backward: Vec<Option<NodeId>> = vec![None; other.nodes.len()];
        let mut pending = vec![(self.root, other.root)];

        while let Some((a, b)) = pending.pop() {
            match (forward[a.index()], backward[b.index()]) {
                (Some(mapped), _) if mapped == b => continue,
                (None, None) => {}
                // one side has been paired with somebody else already
                _ => return false,
            }
            forward[a.index()] = Some(b);
            backward[b.index()] = Some(a);

            let (x, y) = (self.node(a), other.node(b));
            if x.kind != y.kind
                || x.payload != y.payload
                || x.children.len() != y.children.len()
            {
                return false;
            }
            pending.extend(x.children.iter().copied().zip(y.children.iter().copied()));
        }

        true
    }
}

impl Index<NodeId> for Graph {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        self.node(id)
    }
}

/// Iterator returned by [Graph::preorder].
pub struct Preorder<'g> {
    graph: &'g Graph,
    visited: Vec<bool>,
    stack: Vec<NodeId>,
}

impl<'g> Iterator for Preorder<'g> {
    type Item = (NodeId, &'g Node);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            if std::mem::replace(&mut self.visited[id.index()], true) {
                continue;
            }

            let node = self.graph.node(id);
            // reversed, so the first child is popped first
            self.stack.extend(node.children.iter().rev());
            return Some((id, node));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{GraphBuilder, NodeId, NodeKind};

    #[test]
    fn preorder_visits_shared_nodes_once() {
        let mut b = GraphBuilder::new();
        let one = b.int(1);
        let pair = b.array(vec![one, one]);
        let root = b.array(vec![pair, one, pair]);
        let graph = b.finish(root).unwrap();

        let order: Vec<NodeId> = graph.preorder().map(|(id, _)| id).collect();
        assert_eq!(vec![root, pair, one], order);
    }

    #[test]
    fn preorder_terminates_on_cycles() {
        let mut b = GraphBuilder::new();
        let seq = b.reserve();
        let nil = b.nil();
        b.fill(seq, super::Node::new(NodeKind::Sequence, vec![nil, seq], super::Payload::None))
            .unwrap();
        let graph = b.finish(seq).unwrap();

        assert_eq!(2, graph.preorder().count());
    }

    #[test]
    fn preorder_skips_unreachable() {
        let mut b = GraphBuilder::new();
        let _orphan = b.str("unused");
        let root = b.int(7);
        let graph = b.finish(root).unwrap();

        assert_eq!(2, graph.len());
        assert_eq!(1, graph.reachable_len());
    }

    #[test]
    fn deep_graphs_do_not_overflow() {
        let mut b = GraphBuilder::new();
        let mut id = b.nil();
        for _ in 0..200_000 {
            id = b.node(NodeKind::Not, vec![id], super::Payload::None);
        }
        let graph = b.finish(id).unwrap();

        assert_eq!(200_001, graph.preorder().count());
        assert!(graph.is_isomorphic(&graph.clone()));
    }

    #[test]
    fn isomorphism_respects_sharing() {
        // [1, 1] with one shared literal
        let mut b = GraphBuilder::new();
        let one = b.int(1);
        let root = b.array(vec![one, one]);
        let shared = b.finish(root).unwrap();

        // [1, 1] with two distinct literals
        let mut b = GraphBuilder::new();
        let x = b.int(1);
        let y = b.int(1);
        let root = b.array(vec![x, y]);
        let copied = b.finish(root).unwrap();

        assert!(shared.is_isomorphic(&shared));
        assert!(!shared.is_isomorphic(&copied));
        assert!(!copied.is_isomorphic(&shared));
    }

    #[test]
    fn isomorphism_ignores_numbering() {
        let mut b = GraphBuilder::new();
        let x = b.int(1);
        let y = b.str("y");
        let root = b.array(vec![x, y]);
        let first = b.finish(root).unwrap();

        let mut b = GraphBuilder::new();
        let root = b.reserve();
        let y = b.str("y");
        let x = b.int(1);
        b.fill(root, super::Node::new(NodeKind::Array, vec![x, y], super::Payload::None))
            .unwrap();
        let second = b.finish(root).unwrap();

        assert!(first.is_isomorphic(&second));
    }
}
