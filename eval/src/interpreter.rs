//! Tree-walking evaluation of a [Graph].
//!
//! Evaluation of a node yields a value or a [Flow]. Non-local exits
//! (`break`, `next`, `return`) travel outwards as flows until the
//! construct they belong to catches them:
//!
//! * `while`/`until` catch `break` and `next` raised directly in
//!   their body,
//! * a block invocation catches `next`, and turns `break` into a
//!   [Flow::BlockBreak] tagged with its id, which is caught by the
//!   call the block literal was attached to,
//! * a method invocation and a lambda catch `return`.

use std::io::Write;
use std::mem;
use std::rc::Rc;

use nodemarshal::{Graph, Node, NodeId, NodeKind, Payload, ScopeKind, Symbol};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::errors::{Error, ErrorKind, EvalResult, Flow, WithNode};
use crate::scope::Env;
use crate::value::{Class, Proc, ProcBody, Range, Regexp, RubyHash, Value};
use crate::Options;

/// A method defined with `def`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Method {
    pub params: NodeId,
    pub body: NodeId,
}

/// Find a node that is its own descendant. Evaluating such a graph
/// would never terminate.
pub(crate) fn find_cycle(graph: &Graph) -> Option<NodeId> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Done,
    }

    let mut marks = vec![Mark::New; graph.len()];
    let mut stack = vec![(graph.root(), 0usize)];
    marks[graph.root().index()] = Mark::Active;

    while let Some((id, next)) = stack.last_mut() {
        let children = &graph[*id].children;
        let Some(&child) = children.get(*next) else {
            marks[id.index()] = Mark::Done;
            stack.pop();
            continue;
        };
        *next += 1;

        match marks[child.index()] {
            Mark::Active => return Some(child),
            Mark::Done => {}
            Mark::New => {
                marks[child.index()] = Mark::Active;
                stack.push((child, 0));
            }
        }
    }
    None
}

pub(crate) struct Machine<'a> {
    graph: &'a Graph,
    options: &'a Options,
    pub(crate) out: &'a mut dyn Write,

    pub(crate) methods: FxHashMap<Symbol, Method>,
    globals: FxHashMap<Symbol, Value>,
    /// Instance variables of the top-level object, the only object
    /// whose methods can be evaluated.
    ivars: FxHashMap<Symbol, Value>,
    constants: FxHashMap<Symbol, Value>,
    regexps: FxHashMap<NodeId, Rc<Regexp>>,

    /// The block passed to the method being evaluated.
    pub(crate) block: Option<Rc<Proc>>,
    call_depth: usize,
    /// Nesting of node evaluations within the current invocation.
    nesting: usize,
    next_proc: usize,
}

impl<'a> Machine<'a> {
    pub(crate) fn new(graph: &'a Graph, options: &'a Options, out: &'a mut dyn Write) -> Self {
        Machine {
            graph,
            options,
            out,
            methods: FxHashMap::default(),
            globals: FxHashMap::default(),
            ivars: FxHashMap::default(),
            constants: FxHashMap::default(),
            regexps: FxHashMap::default(),
            block: None,
            call_depth: 0,
            nesting: 0,
            next_proc: 0,
        }
    }

    pub(crate) fn run(&mut self) -> EvalResult<Value> {
        let root = self.graph.root();
        for (id, node) in self.graph.preorder() {
            node.check_shape()
                .map_err(|e| Error::new(ErrorKind::MalformedGraph(e.to_string()), id))?;
        }
        if let Some(node) = find_cycle(self.graph) {
            return Err(Error::new(
                ErrorKind::Unsupported("evaluating a cyclic graph"),
                node,
            ));
        }

        let result = self.eval(&Env::default(), root);
        debug!(methods = self.methods.len(), procs = self.next_proc, "evaluation finished");

        match result {
            Ok(value) | Err(Flow::Return(value)) => Ok(value),
            Err(Flow::Error(error)) => Err(*error),
            Err(Flow::Break { node, .. }) => Err(Error::new(ErrorKind::InvalidJump("Invalid break"), node)),
            Err(Flow::Next { node, .. }) => Err(Error::new(ErrorKind::InvalidJump("Invalid next"), node)),
            Err(Flow::BlockBreak { .. }) => Err(Error::new(
                ErrorKind::InvalidJump("break from proc-closure"),
                root,
            )),
        }
    }

    pub(crate) fn eval(&mut self, env: &Env, id: NodeId) -> Result<Value, Flow> {
        if self.nesting >= self.options.max_nesting {
            return Err(ErrorKind::Nesting(self.options.max_nesting)).with_node(id);
        }
        self.nesting += 1;
        let result = self.eval_node(env, id);
        self.nesting -= 1;
        result
    }

    fn eval_node(&mut self, env: &Env, id: NodeId) -> Result<Value, Flow> {
        let graph = self.graph;
        let node = &graph[id];
        let children = node.children.as_slice();
        trace!(node = %id, kind = node.kind.name(), "evaluating");

        match node.kind {
            NodeKind::Nil => Ok(Value::Nil),
            NodeKind::True => Ok(Value::Bool(true)),
            NodeKind::False => Ok(Value::Bool(false)),
            NodeKind::SelfRef => Ok(Value::Main),
            NodeKind::Integer | NodeKind::Float | NodeKind::Str | NodeKind::Sym => {
                literal(&node.payload).with_node(id)
            }
            NodeKind::Regex => self.regex(id, &node.payload).map(Value::Regexp),

            NodeKind::Array => Ok(Value::array(self.eval_all(env, children)?)),
            NodeKind::Hash => {
                let mut hash = RubyHash::default();
                for pair in children.chunks(2) {
                    let key = self.eval(env, pair[0])?;
                    let value = match pair.get(1) {
                        Some(&v) => self.eval(env, v)?,
                        None => Value::Nil,
                    };
                    hash.insert(key, value).with_node(id)?;
                }
                Ok(Value::hash(hash))
            }
            NodeKind::DStr => {
                let mut out = Vec::new();
                for &part in children {
                    match &graph[part].payload {
                        Payload::Bytes(bytes) => out.extend_from_slice(bytes),
                        _ => out.extend_from_slice(&self.eval(env, part)?.to_s()),
                    }
                }
                Ok(Value::string(out))
            }
            NodeKind::EvStr => {
                let value = self.eval(env, children[0])?;
                Ok(Value::string(value.to_s()))
            }
            NodeKind::Sequence => {
                let mut last = Value::Nil;
                for &statement in children {
                    last = self.eval(env, statement)?;
                }
                Ok(last)
            }

            NodeKind::Var => {
                let (scope, name) = binding(node).with_node(id)?;
                self.lookup(env, scope, name).with_node(id)
            }
            NodeKind::Assign => {
                let (scope, name) = binding(node).with_node(id)?;
                let value = self.eval(env, children[0])?;
                self.store(env, scope, name, value.clone()).with_node(id)?;
                Ok(value)
            }
            NodeKind::ScopedConst => {
                let scope = self.eval(env, children[0])?;
                scoped_constant(&scope, symbol(node).with_node(id)?).with_node(id)
            }

            NodeKind::If | NodeKind::Ternary => {
                if self.eval(env, children[0])?.is_truthy() {
                    self.eval(env, children[1])
                } else {
                    match children.get(2) {
                        Some(&otherwise) => self.eval(env, otherwise),
                        None => Ok(Value::Nil),
                    }
                }
            }
            NodeKind::While | NodeKind::Until => {
                let until = node.kind == NodeKind::Until;
                while self.eval(env, children[0])?.is_truthy() != until {
                    match self.eval(env, children[1]) {
                        Ok(_) | Err(Flow::Next { .. }) => {}
                        Err(Flow::Break { value, .. }) => return Ok(value),
                        Err(other) => return Err(other),
                    }
                }
                Ok(Value::Nil)
            }
            NodeKind::And => {
                let left = self.eval(env, children[0])?;
                if left.is_truthy() {
                    self.eval(env, children[1])
                } else {
                    Ok(left)
                }
            }
            NodeKind::Or => {
                let left = self.eval(env, children[0])?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    self.eval(env, children[1])
                }
            }
            NodeKind::Not => Ok(Value::Bool(!self.eval(env, children[0])?.is_truthy())),
            NodeKind::OrAssign | NodeKind::AndAssign => {
                let current = self.eval(env, children[0])?;
                if current.is_truthy() == (node.kind == NodeKind::OrAssign) {
                    Ok(current)
                } else {
                    self.eval(env, children[1])
                }
            }
            NodeKind::Case => self.case(env, children),
            NodeKind::Return => Err(Flow::Return(self.jump_value(env, children)?)),
            NodeKind::Break => Err(Flow::Break {
                value: self.jump_value(env, children)?,
                node: id,
            }),
            NodeKind::Next => Err(Flow::Next {
                value: self.jump_value(env, children)?,
                node: id,
            }),
            NodeKind::RangeIncl | NodeKind::RangeExcl => {
                let start = self.eval(env, children[0])?;
                let end = self.eval(env, children[1])?;
                Ok(Value::Range(Rc::new(Range {
                    start,
                    end,
                    exclusive: node.kind == NodeKind::RangeExcl,
                })))
            }

            NodeKind::Def => {
                let name = symbol(node).with_node(id)?;
                let method = Method {
                    params: children[0],
                    body: children[1],
                };
                debug!(name = %name, node = %id, "defining method");
                self.methods.insert(name.clone(), method);
                Ok(Value::Symbol(name.clone()))
            }
            NodeKind::Class => Err(ErrorKind::Unsupported("class definitions")).with_node(id),
            NodeKind::Super | NodeKind::ZSuper => Err(ErrorKind::Unsupported("super")).with_node(id),

            NodeKind::Call => {
                let name = symbol(node).with_node(id)?;
                let receiver = self.eval(env, children[0])?;
                let args = self.eval_args(env, children[1])?;
                let (block, literal) = self.block_arg(env, children.get(2).copied())?;
                let result = self.call_method(receiver, name, args, block, id);
                catch_break(result, literal)
            }
            NodeKind::FCall => {
                let name = symbol(node).with_node(id)?;
                let args = self.eval_args(env, children[0])?;
                let (block, literal) = self.block_arg(env, children.get(1).copied())?;
                let result = self.call_function(name, args, block, id);
                catch_break(result, literal)
            }
            NodeKind::Yield => {
                let args = self.eval_all(env, children)?;
                let Some(block) = self.block.clone() else {
                    return Err(ErrorKind::NoBlock).with_node(id);
                };
                self.call_proc(&block, args, id)
            }

            NodeKind::Args
            | NodeKind::When
            | NodeKind::Block
            | NodeKind::Params
            | NodeKind::Param
            | NodeKind::BlockPass => Err(ErrorKind::MalformedGraph(format!(
                "{} outside of its parent",
                node.kind.name()
            )))
            .with_node(id),
        }
    }

    fn eval_all(&mut self, env: &Env, ids: &[NodeId]) -> Result<Vec<Value>, Flow> {
        ids.iter().map(|&id| self.eval(env, id)).collect()
    }

    fn eval_args(&mut self, env: &Env, args: NodeId) -> Result<Vec<Value>, Flow> {
        let graph = self.graph;
        let node = &graph[args];
        if node.kind != NodeKind::Args {
            return Err(ErrorKind::MalformedGraph(format!(
                "expected args, found {}",
                node.kind.name()
            )))
            .with_node(args);
        }
        self.eval_all(env, &node.children)
    }

    fn jump_value(&mut self, env: &Env, children: &[NodeId]) -> Result<Value, Flow> {
        match children.first() {
            Some(&value) => self.eval(env, value),
            None => Ok(Value::Nil),
        }
    }

    fn case(&mut self, env: &Env, children: &[NodeId]) -> Result<Value, Flow> {
        let graph = self.graph;
        let subject = self.eval(env, children[0])?;
        let case_eq = Symbol::from("===");

        for &clause in &children[1..] {
            let node = &graph[clause];
            if node.kind != NodeKind::When {
                // the else branch
                return self.eval(env, clause);
            }
            for &pattern in &graph[node.children[0]].children {
                let pattern = self.eval(env, pattern)?;
                let matched = self.call_method(pattern, &case_eq, vec![subject.clone()], None, clause)?;
                if matched.is_truthy() {
                    return self.eval(env, node.children[1]);
                }
            }
        }
        Ok(Value::Nil)
    }

    fn regex(&mut self, id: NodeId, payload: &Payload) -> Result<Rc<Regexp>, Flow> {
        if let Some(re) = self.regexps.get(&id) {
            return Ok(re.clone());
        }
        let Payload::Pattern { source, flags } = payload else {
            return Err(ErrorKind::MalformedGraph("regex without a pattern".into())).with_node(id);
        };
        let re = Rc::new(Regexp::new(source.clone(), *flags).with_node(id)?);
        self.regexps.insert(id, re.clone());
        Ok(re)
    }

    fn lookup(&self, env: &Env, scope: ScopeKind, name: &Symbol) -> Result<Value, ErrorKind> {
        Ok(match scope {
            // locals assigned in a branch that did not run are nil
            ScopeKind::Local => env.get(name).unwrap_or(Value::Nil),
            ScopeKind::Instance => self.ivars.get(name).cloned().unwrap_or(Value::Nil),
            ScopeKind::Global => self.globals.get(name).cloned().unwrap_or(Value::Nil),
            ScopeKind::Class => return Err(ErrorKind::Unsupported("class variables")),
            ScopeKind::Constant => match self.constants.get(name) {
                Some(value) => value.clone(),
                None => Class::from_constant(name.as_bytes())
                    .map(Value::Class)
                    .ok_or_else(|| ErrorKind::UninitializedConstant(name.to_string()))?,
            },
        })
    }

    fn store(&mut self, env: &Env, scope: ScopeKind, name: &Symbol, value: Value) -> Result<(), ErrorKind> {
        match scope {
            ScopeKind::Local => env.set(name, value),
            ScopeKind::Instance => {
                self.ivars.insert(name.clone(), value);
            }
            ScopeKind::Global => {
                self.globals.insert(name.clone(), value);
            }
            ScopeKind::Constant => {
                self.constants.insert(name.clone(), value);
            }
            ScopeKind::Class => return Err(ErrorKind::Unsupported("class variables")),
        }
        Ok(())
    }

    pub(crate) fn new_proc(&mut self, lambda: bool, body: ProcBody) -> Rc<Proc> {
        let id = self.next_proc;
        self.next_proc += 1;
        Rc::new(Proc { id, lambda, body })
    }

    /// The block slot of a call: the proc to pass, and the id of the
    /// block literal if there is one.
    fn block_arg(&mut self, env: &Env, slot: Option<NodeId>) -> Result<(Option<Rc<Proc>>, Option<usize>), Flow> {
        let Some(slot) = slot else {
            return Ok((None, None));
        };
        let graph = self.graph;
        let node = &graph[slot];

        match node.kind {
            NodeKind::Block => {
                let body = ProcBody::Block {
                    params: node.children[0],
                    body: node.children[1],
                    env: env.clone(),
                    outer: self.block.clone(),
                };
                let proc = self.new_proc(false, body);
                let id = proc.id;
                Ok((Some(proc), Some(id)))
            }
            NodeKind::BlockPass => match self.eval(env, node.children[0])? {
                Value::Nil => Ok((None, None)),
                Value::Proc(proc) => Ok((Some(proc), None)),
                Value::Symbol(name) => Ok((Some(self.new_proc(true, ProcBody::Method(name))), None)),
                other => Err(ErrorKind::TypeError {
                    expected: "Proc",
                    actual: other.type_of(),
                })
                .with_node(slot),
            },
            other => Err(ErrorKind::MalformedGraph(format!(
                "expected a block, found {}",
                other.name()
            )))
            .with_node(slot),
        }
    }

    /// A copy of `proc` with lambda semantics, for `lambda { ... }`.
    pub(crate) fn into_lambda(&mut self, proc: &Proc) -> Rc<Proc> {
        let body = match &proc.body {
            ProcBody::Block {
                params,
                body,
                env,
                outer,
            } => ProcBody::Block {
                params: *params,
                body: *body,
                env: env.clone(),
                outer: outer.clone(),
            },
            ProcBody::Method(name) => ProcBody::Method(name.clone()),
        };
        self.new_proc(true, body)
    }

    /// `Proc#arity`: the number of required parameters, or its
    /// negated successor if there are optional ones.
    pub(crate) fn arity(&self, proc: &Proc) -> i64 {
        let ProcBody::Block { params, .. } = &proc.body else {
            return -2;
        };
        let params = &self.graph[*params].children;
        let required = params
            .iter()
            .filter(|&&p| self.graph[p].children.is_empty())
            .count() as i64;
        if required == params.len() as i64 {
            required
        } else {
            -(required + 1)
        }
    }

    fn enter_call(&mut self, at: NodeId) -> Result<usize, Flow> {
        if self.call_depth >= self.options.max_call_depth {
            return Err(ErrorKind::CallDepth(self.options.max_call_depth)).with_node(at);
        }
        self.call_depth += 1;
        Ok(mem::replace(&mut self.nesting, 0))
    }

    fn leave_call(&mut self, nesting: usize) {
        self.call_depth -= 1;
        self.nesting = nesting;
    }

    /// Bind arguments to the parameters in `params`. Strict binding
    /// (methods and lambdas) requires the argument count to fit,
    /// otherwise missing arguments are nil, extra ones are dropped and
    /// a single array is spread over several parameters.
    fn bind_params(
        &mut self,
        env: &Env,
        params: NodeId,
        mut args: Vec<Value>,
        strict: bool,
        at: NodeId,
    ) -> Result<(), Flow> {
        let graph = self.graph;
        let params = &graph[params].children;
        let required = params.iter().filter(|&&p| graph[p].children.is_empty()).count();

        if strict {
            if args.len() < required || args.len() > params.len() {
                let expected = if required == params.len() {
                    required.to_string()
                } else {
                    format!("{required}..{}", params.len())
                };
                return Err(ErrorKind::WrongArity {
                    given: args.len(),
                    expected,
                })
                .with_node(at);
            }
        } else if params.len() > 1 && args.len() == 1 {
            if let Value::Array(spread) = &args[0] {
                let spread = spread.borrow().clone();
                args = spread;
            }
        }

        let mut optional = args.len().saturating_sub(required);
        let mut args = args.into_iter();
        for &param in params {
            let node = &graph[param];
            let name = symbol(node).with_node(param)?;
            let value = match node.children.first() {
                Some(&default) if optional == 0 => self.eval(env, default)?,
                Some(_) => {
                    optional -= 1;
                    args.next().unwrap_or(Value::Nil)
                }
                None => args.next().unwrap_or(Value::Nil),
            };
            env.define(name.clone(), value);
        }
        Ok(())
    }

    pub(crate) fn invoke(
        &mut self,
        method: Method,
        args: Vec<Value>,
        block: Option<Rc<Proc>>,
        at: NodeId,
    ) -> Result<Value, Flow> {
        let nesting = self.enter_call(at)?;
        let outer = mem::replace(&mut self.block, block);
        let env = Env::default();
        let result = self
            .bind_params(&env, method.params, args, true, at)
            .and_then(|()| self.eval(&env, method.body));
        self.block = outer;
        self.leave_call(nesting);

        match result {
            Ok(value) | Err(Flow::Return(value)) => Ok(value),
            Err(Flow::Break { node, .. }) => Err(ErrorKind::InvalidJump("Invalid break")).with_node(node),
            Err(Flow::Next { node, .. }) => Err(ErrorKind::InvalidJump("Invalid next")).with_node(node),
            Err(other) => Err(other),
        }
    }

    pub(crate) fn call_proc(&mut self, proc: &Rc<Proc>, args: Vec<Value>, at: NodeId) -> Result<Value, Flow> {
        let (params, body, scope, outer) = match &proc.body {
            ProcBody::Method(name) => {
                let mut args = args.into_iter();
                let Some(receiver) = args.next() else {
                    return Err(ErrorKind::WrongArity {
                        given: 0,
                        expected: "1+".into(),
                    })
                    .with_node(at);
                };
                return self.call_method(receiver, name, args.collect(), None, at);
            }
            ProcBody::Block {
                params,
                body,
                env,
                outer,
            } => (*params, *body, env, outer),
        };

        let nesting = self.enter_call(at)?;
        let saved = mem::replace(&mut self.block, outer.clone());
        let env = scope.child();
        let result = self
            .bind_params(&env, params, args, proc.lambda, at)
            .and_then(|()| self.eval(&env, body));
        self.block = saved;
        self.leave_call(nesting);

        match result {
            Err(Flow::Next { value, .. }) => Ok(value),
            Err(Flow::Break { value, .. } | Flow::Return(value)) if proc.lambda => Ok(value),
            Err(Flow::Break { value, .. }) => Err(Flow::BlockBreak {
                block: proc.id,
                value,
            }),
            other => other,
        }
    }

    pub(crate) fn write(&mut self, bytes: &[u8], at: NodeId) -> Result<(), Flow> {
        self.out
            .write_all(bytes)
            .map_err(ErrorKind::Output)
            .with_node(at)
    }
}

/// A `break` out of the block literal `literal` ends the call it was
/// passed to, with the break value as the call's result.
fn catch_break(result: Result<Value, Flow>, literal: Option<usize>) -> Result<Value, Flow> {
    match result {
        Err(Flow::BlockBreak { block, value }) if Some(block) == literal => Ok(value),
        other => other,
    }
}

fn literal(payload: &Payload) -> Result<Value, ErrorKind> {
    Ok(match payload {
        Payload::Integer(n) => Value::Integer(n.clone()),
        Payload::Float(x) => Value::Float(*x),
        Payload::Bytes(bytes) => Value::string(bytes.clone()),
        Payload::Symbol(name) => Value::Symbol(name.clone()),
        other => {
            return Err(ErrorKind::MalformedGraph(format!(
                "unexpected {:?} payload on a literal",
                other.kind()
            )))
        }
    })
}

fn symbol(node: &Node) -> Result<&Symbol, ErrorKind> {
    node.payload
        .as_symbol()
        .ok_or_else(|| ErrorKind::MalformedGraph(format!("{} without a name", node.kind.name())))
}

fn binding(node: &Node) -> Result<(ScopeKind, &Symbol), ErrorKind> {
    node.payload
        .as_binding()
        .ok_or_else(|| ErrorKind::MalformedGraph(format!("{} without a binding", node.kind.name())))
}

fn scoped_constant(scope: &Value, name: &Symbol) -> Result<Value, ErrorKind> {
    let value = match (scope, name.as_bytes()) {
        (Value::Class(Class::Math), b"PI") => std::f64::consts::PI,
        (Value::Class(Class::Math), b"E") => std::f64::consts::E,
        (Value::Class(Class::Float), b"INFINITY") => f64::INFINITY,
        (Value::Class(Class::Float), b"NAN") => f64::NAN,
        (Value::Class(Class::Float), b"EPSILON") => f64::EPSILON,
        (Value::Class(Class::Float), b"MAX") => f64::MAX,
        (Value::Class(Class::Float), b"MIN") => f64::MIN_POSITIVE,
        (Value::Class(class), _) => {
            return Err(ErrorKind::UninitializedConstant(format!("{}::{name}", class.name())))
        }
        (other, _) => {
            return Err(ErrorKind::TypeError {
                expected: "class/module",
                actual: other.type_of(),
            })
        }
    };
    Ok(Value::Float(value))
}

#[cfg(test)]
mod tests {
    use nodemarshal::{GraphBuilder, NodeKind, Payload};

    use super::find_cycle;

    #[test]
    fn cycles_are_found() {
        let mut b = GraphBuilder::new();
        let seq = b.reserve();
        let not = b.node(NodeKind::Not, vec![seq], Payload::None);
        b.fill(seq, nodemarshal::Node::new(NodeKind::Sequence, vec![not], Payload::None))
            .unwrap();
        let graph = b.finish(seq).unwrap();
        assert_eq!(Some(seq), find_cycle(&graph));
    }

    #[test]
    fn sharing_is_not_a_cycle() {
        let mut b = GraphBuilder::new();
        let one = b.int(1);
        let root = b.array(vec![one, one]);
        let graph = b.finish(root).unwrap();
        assert_eq!(None, find_cycle(&graph));
    }
}
