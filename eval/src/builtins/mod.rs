//! Methods of the built-in classes, and the functions callable
//! without a receiver.
//!
//! Each class has a dispatch function which returns `Ok(None)` for
//! method names it does not know, in which case the methods every
//! object has are tried before giving up with `NoMethodError`.

use std::cmp::Ordering;
use std::rc::Rc;

use nodemarshal::{NodeId, Symbol};

use crate::errors::{ErrorKind, Flow, WithNode};
use crate::interpreter::Machine;
use crate::value::{Class, Proc, Value};

mod array;
mod hash;
mod kernel;
mod numeric;
mod string;

pub(crate) use numeric::{arith, Op};

type Dispatch = Result<Option<Value>, Flow>;

/// A method call in the process of being resolved.
pub(crate) struct Call<'n> {
    pub name: &'n Symbol,
    pub args: Vec<Value>,
    pub block: Option<Rc<Proc>>,
    pub at: NodeId,
}

impl Call<'_> {
    fn method(&self) -> &[u8] {
        self.name.as_bytes()
    }

    fn arity(&self, min: usize, max: usize) -> Result<(), Flow> {
        let given = self.args.len();
        if (min..=max).contains(&given) {
            return Ok(());
        }
        let expected = match max {
            usize::MAX => format!("{min}+"),
            max if max == min => min.to_string(),
            max => format!("{min}..{max}"),
        };
        self.fail(ErrorKind::WrongArity { given, expected })
    }

    /// The argument at `i`, or nil if it was not given.
    fn arg(&self, i: usize) -> Value {
        self.args.get(i).cloned().unwrap_or(Value::Nil)
    }

    fn block(&self) -> Result<Rc<Proc>, Flow> {
        match &self.block {
            Some(block) => Ok(block.clone()),
            None => self.fail(ErrorKind::NoBlock),
        }
    }

    fn fail<T>(&self, kind: ErrorKind) -> Result<T, Flow> {
        Err(kind).with_node(self.at)
    }

    fn int_arg(&self, i: usize) -> Result<i64, Flow> {
        self.arg(i).to_i64().with_node(self.at)
    }
}

/// Whether `a` and `b` are the same object.
fn identical(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(a), Value::String(b)) => Rc::ptr_eq(a, b),
        (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
        (Value::Hash(a), Value::Hash(b)) => Rc::ptr_eq(a, b),
        (Value::Range(a), Value::Range(b)) => Rc::ptr_eq(a, b),
        (Value::Regexp(a), Value::Regexp(b)) => Rc::ptr_eq(a, b),
        (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
        _ => a.eql(b),
    }
}

impl Machine<'_> {
    /// Call `name` on an explicit receiver.
    pub(crate) fn call_method(
        &mut self,
        receiver: Value,
        name: &Symbol,
        args: Vec<Value>,
        block: Option<Rc<Proc>>,
        at: NodeId,
    ) -> Result<Value, Flow> {
        let call = Call {
            name,
            args,
            block,
            at,
        };

        let found = match &receiver {
            Value::Nil => nil(&call)?,
            Value::Bool(b) => boolean(*b, &call)?,
            Value::Integer(n) => numeric::integer(self, n, &call)?,
            Value::Float(x) => numeric::float(*x, &call)?,
            Value::String(s) => string::string(self, s, &call)?,
            Value::Symbol(s) => string::symbol(self, s, &call)?,
            Value::Regexp(re) => string::regexp(re, &call)?,
            Value::Array(a) => array::array(self, a, &call)?,
            Value::Hash(h) => hash::hash(self, h, &call)?,
            Value::Range(r) => array::range(self, r, &call)?,
            Value::Proc(p) => kernel::proc(self, p, &call)?,
            Value::Class(c) => kernel::class(self, *c, &call)?,
            Value::Main => match self.methods.get(name) {
                Some(&method) => return self.invoke(method, call.args, call.block, at),
                None => None,
            },
        };
        if let Some(value) = found {
            return Ok(value);
        }

        match self.object(&receiver, &call)? {
            Some(value) => Ok(value),
            None => call.fail(ErrorKind::NoMethod {
                name: name.to_string(),
                class: receiver.class().name(),
            }),
        }
    }

    /// Call `name` on the implicit receiver.
    pub(crate) fn call_function(
        &mut self,
        name: &Symbol,
        args: Vec<Value>,
        block: Option<Rc<Proc>>,
        at: NodeId,
    ) -> Result<Value, Flow> {
        if let Some(&method) = self.methods.get(name) {
            return self.invoke(method, args, block, at);
        }

        let call = Call {
            name,
            args,
            block,
            at,
        };
        if let Some(value) = kernel::function(self, &call)? {
            return Ok(value);
        }
        if let Some(value) = self.object(&Value::Main, &call)? {
            return Ok(value);
        }

        if call.args.is_empty() && call.block.is_none() {
            call.fail(ErrorKind::UndefinedName(name.to_string()))
        } else {
            call.fail(ErrorKind::NoMethod {
                name: name.to_string(),
                class: Class::Object.name(),
            })
        }
    }

    /// Shorthand for calling an operator or conversion method.
    pub(crate) fn send(&mut self, receiver: Value, name: &str, args: Vec<Value>, at: NodeId) -> Result<Value, Flow> {
        self.call_method(receiver, &Symbol::from(name), args, None, at)
    }

    fn compare_values(&self, a: &Value, b: &Value, at: NodeId) -> Result<Ordering, Flow> {
        match a.compare(b).with_node(at)? {
            Some(ordering) => Ok(ordering),
            None => Err(ErrorKind::Incomparable(a.class().name(), b.class().name())).with_node(at),
        }
    }

    /// The methods every object has.
    fn object(&mut self, receiver: &Value, call: &Call) -> Dispatch {
        let value = match call.method() {
            b"class" => Value::Class(receiver.class()),
            b"==" | b"===" => {
                call.arity(1, 1)?;
                Value::Bool(*receiver == call.arg(0))
            }
            b"!=" => {
                call.arity(1, 1)?;
                let equal = self.send(receiver.clone(), "==", call.args.clone(), call.at)?;
                Value::Bool(!equal.is_truthy())
            }
            b"eql?" => {
                call.arity(1, 1)?;
                Value::Bool(receiver.eql(&call.arg(0)))
            }
            b"equal?" => {
                call.arity(1, 1)?;
                Value::Bool(identical(receiver, &call.arg(0)))
            }
            b"!" => Value::Bool(!receiver.is_truthy()),
            b"nil?" => Value::Bool(matches!(receiver, Value::Nil)),
            b"=~" => Value::Nil,
            b"is_a?" | b"kind_of?" | b"instance_of?" => {
                call.arity(1, 1)?;
                let Value::Class(class) = call.arg(0) else {
                    return call.fail(ErrorKind::TypeError {
                        expected: "Class",
                        actual: call.arg(0).type_of(),
                    });
                };
                Value::Bool(if call.method() == b"instance_of?" {
                    receiver.class() == class
                } else {
                    receiver.class().is_a(class)
                })
            }
            b"inspect" => Value::string(receiver.to_string()),
            b"to_s" => Value::string(receiver.to_s()),
            b"itself" | b"freeze" => receiver.clone(),
            b"frozen?" => Value::Bool(!matches!(
                receiver,
                Value::String(_) | Value::Array(_) | Value::Hash(_)
            )),
            b"dup" | b"clone" => match receiver {
                Value::String(s) => Value::string(s.as_ref().clone()),
                Value::Array(a) => Value::array(a.borrow().clone()),
                Value::Hash(h) => Value::hash(h.borrow().clone()),
                other => other.clone(),
            },
            b"tap" => {
                let block = call.block()?;
                self.call_proc(&block, vec![receiver.clone()], call.at)?;
                receiver.clone()
            }
            b"then" | b"yield_self" => {
                let block = call.block()?;
                self.call_proc(&block, vec![receiver.clone()], call.at)?
            }
            b"send" | b"public_send" | b"__send__" => {
                call.arity(1, usize::MAX)?;
                let name = match &call.args[0] {
                    Value::Symbol(name) => name.clone(),
                    Value::String(s) => Symbol::new(s.as_slice()),
                    other => {
                        return call.fail(ErrorKind::TypeError {
                            expected: "Symbol",
                            actual: other.type_of(),
                        })
                    }
                };
                let args = call.args[1..].to_vec();
                self.call_method(receiver.clone(), &name, args, call.block.clone(), call.at)?
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }
}

fn nil(call: &Call) -> Dispatch {
    Ok(Some(match call.method() {
        b"to_a" => Value::array(vec![]),
        b"to_i" => Value::int(0),
        b"to_f" => Value::Float(0.0),
        b"&" => Value::Bool(false),
        b"|" | b"^" => Value::Bool(call.arg(0).is_truthy()),
        _ => return Ok(None),
    }))
}

fn boolean(b: bool, call: &Call) -> Dispatch {
    let other = call.arg(0).is_truthy();
    Ok(Some(match call.method() {
        b"&" => Value::Bool(b && other),
        b"|" => Value::Bool(b || other),
        b"^" => Value::Bool(b != other),
        _ => return Ok(None),
    }))
}

/// Stable merge sort with a comparison that may fail, which the
/// standard library sorts do not support.
fn sort_values<F>(mut items: Vec<Value>, cmp: &mut F) -> Result<Vec<Value>, Flow>
where
    F: FnMut(&Value, &Value) -> Result<Ordering, Flow>,
{
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = sort_values(items, cmp)?;
    let right = sort_values(right, cmp)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(l), Some(r)) = (left.peek(), right.peek()) {
        if cmp(l, r)? == Ordering::Greater {
            merged.extend(right.next());
        } else {
            merged.extend(left.next());
        }
    }
    merged.extend(left);
    merged.extend(right);
    Ok(merged)
}

/// Position `i` in a sequence of `len` elements, counting from the end
/// if negative.
fn resolve_index(i: i64, len: usize) -> Option<usize> {
    let i = if i < 0 { i.checked_add(len as i64)? } else { i };
    usize::try_from(i).ok().filter(|&i| i < len)
}

/// The part of a sequence of `len` elements selected by `[start,
/// length]` or `[range]` arguments.
fn slice_bounds(call: &Call, len: usize) -> Result<Option<std::ops::Range<usize>>, Flow> {
    let len = len as i64;
    let from_end = |i: i64| if i < 0 { i + len } else { i };

    let (start, end) = match (call.args.first(), call.args.get(1)) {
        (Some(Value::Range(range)), None) => {
            let start = from_end(range.start.to_i64().with_node(call.at)?);
            let mut end = from_end(range.end.to_i64().with_node(call.at)?);
            if !range.exclusive {
                end += 1;
            }
            (start, end)
        }
        (Some(start), Some(count)) => {
            let start = from_end(start.to_i64().with_node(call.at)?);
            let count = count.to_i64().with_node(call.at)?;
            if count < 0 {
                return Ok(None);
            }
            (start, start.saturating_add(count))
        }
        _ => return Ok(None),
    };

    if start < 0 || start > len {
        return Ok(None);
    }
    Ok(Some(start as usize..end.clamp(start, len) as usize))
}
