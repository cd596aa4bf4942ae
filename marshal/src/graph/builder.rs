use bstr::BString;
use num_bigint::BigInt;

use super::{Graph, Node, NodeId, NodeKind, Payload, PatternFlags, ScopeKind, Symbol};
use crate::errors::GraphError;

/// Incrementally assembles a [Graph].
///
/// Nodes are appended with [GraphBuilder::push] and receive
/// consecutive ids. A node that needs to be referenced before it is
/// complete, such as a block that mentions its own definition, is
/// created in two steps: [GraphBuilder::reserve] hands out an id, and
/// [GraphBuilder::fill] later supplies the node. [GraphBuilder::finish]
/// checks that every reserved slot was filled and that every child id
/// resolves.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    slots: Vec<Option<Node>>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        GraphBuilder {
            slots: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn next_id(&self) -> NodeId {
        NodeId(self.slots.len() as u32)
    }

    pub fn push(&mut self, node: Node) -> NodeId {
        let id = self.next_id();
        self.slots.push(Some(node));
        id
    }

    /// Allocate an id whose node is supplied later through [GraphBuilder::fill].
    pub fn reserve(&mut self) -> NodeId {
        let id = self.next_id();
        self.slots.push(None);
        id
    }

    pub fn fill(&mut self, id: NodeId, node: Node) -> Result<(), GraphError> {
        match self.slots.get_mut(id.index()) {
            None => Err(GraphError::UnknownId(id)),
            Some(Some(_)) => Err(GraphError::AlreadyFilled(id)),
            Some(slot @ None) => {
                *slot = Some(node);
                Ok(())
            }
        }
    }

    /// Returns the node stored under `id`, if it has been filled.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    /// Mutable access to an already filled node, e.g. to append
    /// statements to a sequence under construction.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn finish(self, root: NodeId) -> Result<Graph, GraphError> {
        let len = self.slots.len();
        if root.index() >= len {
            return Err(GraphError::UnknownRoot(root));
        }

        let mut nodes = Vec::with_capacity(len);
        for (i, slot) in self.slots.into_iter().enumerate() {
            let node = slot.ok_or(GraphError::Unfilled(NodeId(i as u32)))?;
            if let Some(child) = node.children.iter().find(|c| c.index() >= len) {
                return Err(GraphError::Dangling {
                    node: NodeId(i as u32),
                    child: *child,
                });
            }
            nodes.push(node);
        }

        Ok(Graph::from_checked(nodes, root))
    }

    pub fn node(&mut self, kind: NodeKind, children: Vec<NodeId>, payload: Payload) -> NodeId {
        self.push(Node::new(kind, children, payload))
    }

    pub fn leaf(&mut self, kind: NodeKind) -> NodeId {
        self.push(Node::leaf(kind))
    }

    pub fn nil(&mut self) -> NodeId {
        self.leaf(NodeKind::Nil)
    }

    pub fn boolean(&mut self, value: bool) -> NodeId {
        self.leaf(if value {
            NodeKind::True
        } else {
            NodeKind::False
        })
    }

    pub fn int(&mut self, value: impl Into<BigInt>) -> NodeId {
        self.node(NodeKind::Integer, vec![], Payload::Integer(value.into()))
    }

    pub fn float(&mut self, value: f64) -> NodeId {
        self.node(NodeKind::Float, vec![], Payload::Float(value))
    }

    pub fn str(&mut self, value: impl Into<BString>) -> NodeId {
        self.node(NodeKind::Str, vec![], Payload::Bytes(value.into()))
    }

    pub fn sym(&mut self, name: impl Into<Symbol>) -> NodeId {
        self.node(NodeKind::Sym, vec![], Payload::Symbol(name.into()))
    }

    pub fn regex(&mut self, source: impl Into<BString>, flags: PatternFlags) -> NodeId {
        self.node(
            NodeKind::Regex,
            vec![],
            Payload::Pattern {
                source: source.into(),
                flags,
            },
        )
    }

    pub fn var(&mut self, scope: ScopeKind, name: impl Into<Symbol>) -> NodeId {
        self.node(
            NodeKind::Var,
            vec![],
            Payload::Binding {
                scope,
                name: name.into(),
            },
        )
    }

    pub fn assign(&mut self, scope: ScopeKind, name: impl Into<Symbol>, value: NodeId) -> NodeId {
        self.node(
            NodeKind::Assign,
            vec![value],
            Payload::Binding {
                scope,
                name: name.into(),
            },
        )
    }

    pub fn array(&mut self, elements: Vec<NodeId>) -> NodeId {
        self.node(NodeKind::Array, elements, Payload::None)
    }

    pub fn args(&mut self, args: Vec<NodeId>) -> NodeId {
        self.node(NodeKind::Args, args, Payload::None)
    }

    pub fn seq(&mut self, statements: Vec<NodeId>) -> NodeId {
        self.node(NodeKind::Sequence, statements, Payload::None)
    }

    /// `receiver.name(args) [block]`
    pub fn call(
        &mut self,
        receiver: NodeId,
        name: impl Into<Symbol>,
        args: Vec<NodeId>,
        block: Option<NodeId>,
    ) -> NodeId {
        let args = self.args(args);
        let mut children = vec![receiver, args];
        children.extend(block);
        self.node(NodeKind::Call, children, Payload::Symbol(name.into()))
    }

    /// `name(args) [block]`, called on the implicit receiver.
    pub fn fcall(
        &mut self,
        name: impl Into<Symbol>,
        args: Vec<NodeId>,
        block: Option<NodeId>,
    ) -> NodeId {
        let args = self.args(args);
        let mut children = vec![args];
        children.extend(block);
        self.node(NodeKind::FCall, children, Payload::Symbol(name.into()))
    }
}
