use std::cell::RefCell;
use std::rc::Rc;

use super::{array, Call, Dispatch};
use crate::errors::{ErrorKind, Flow, WithNode};
use crate::interpreter::Machine;
use crate::value::{RubyHash, Value};

type Shared = Rc<RefCell<RubyHash>>;

fn pair(key: &Value, value: &Value) -> Value {
    Value::array(vec![key.clone(), value.clone()])
}

fn entries(h: &Shared) -> Vec<(Value, Value)> {
    h.borrow().iter().cloned().collect()
}

fn other_hash(call: &Call, i: usize) -> Result<Shared, Flow> {
    match call.arg(i) {
        Value::Hash(other) => Ok(other),
        other => call.fail(ErrorKind::TypeError {
            expected: "Hash",
            actual: other.type_of(),
        }),
    }
}

/// Copy the entries of `from` into `into`, asking the block about keys
/// present in both.
fn merge_into(m: &mut Machine, into: &Shared, from: Vec<(Value, Value)>, call: &Call) -> Result<(), Flow> {
    for (key, value) in from {
        let existing = into.borrow().get(&key).with_node(call.at)?.cloned();
        let value = match (existing, &call.block) {
            (Some(old), Some(block)) => m.call_proc(block, vec![key.clone(), old, value], call.at)?,
            _ => value,
        };
        into.borrow_mut().insert(key, value).with_node(call.at)?;
    }
    Ok(())
}

pub(super) fn hash(m: &mut Machine, h: &Shared, call: &Call) -> Dispatch {
    let this = || Value::Hash(h.clone());
    let at = call.at;

    let value = match call.method() {
        b"[]" => {
            call.arity(1, 1)?;
            h.borrow().get(&call.arg(0)).with_node(at)?.cloned().into()
        }
        b"[]=" | b"store" => {
            call.arity(2, 2)?;
            h.borrow_mut().insert(call.arg(0), call.arg(1)).with_node(at)?;
            call.arg(1)
        }
        b"fetch" => {
            call.arity(1, 2)?;
            let key = call.arg(0);
            let found = h.borrow().get(&key).with_node(at)?.cloned();
            match (found, call.args.get(1), &call.block) {
                (Some(value), _, _) => value,
                (None, _, Some(block)) => m.call_proc(block, vec![key], at)?,
                (None, Some(default), None) => default.clone(),
                (None, None, None) => return call.fail(ErrorKind::Raised(format!("key not found: {key}"))),
            }
        }
        b"key?" | b"has_key?" | b"include?" | b"member?" => {
            call.arity(1, 1)?;
            Value::Bool(h.borrow().get(&call.arg(0)).with_node(at)?.is_some())
        }
        b"value?" | b"has_value?" => {
            call.arity(1, 1)?;
            let target = call.arg(0);
            Value::Bool(h.borrow().values().any(|v| *v == target))
        }
        b"key" => {
            call.arity(1, 1)?;
            let target = call.arg(0);
            h.borrow().iter().find(|(_, v)| *v == target).map(|(k, _)| k.clone()).into()
        }
        b"keys" => Value::array(h.borrow().keys().cloned().collect()),
        b"values" => Value::array(h.borrow().values().cloned().collect()),
        b"length" | b"size" => Value::int(h.borrow().len()),
        b"count" if call.args.is_empty() && call.block.is_none() => Value::int(h.borrow().len()),
        b"empty?" => Value::Bool(h.borrow().is_empty()),

        b"each" | b"each_pair" => {
            let block = call.block()?;
            for (key, value) in entries(h) {
                m.call_proc(&block, vec![pair(&key, &value)], at)?;
            }
            this()
        }
        b"each_key" | b"each_value" => {
            let block = call.block()?;
            let keys = call.method() == b"each_key";
            for (key, value) in entries(h) {
                m.call_proc(&block, vec![if keys { key } else { value }], at)?;
            }
            this()
        }
        b"select" | b"filter" | b"reject" => {
            let block = call.block()?;
            let keep = call.method() != b"reject";
            let mut out = RubyHash::default();
            for (key, value) in entries(h) {
                if m.call_proc(&block, vec![pair(&key, &value)], at)?.is_truthy() == keep {
                    out.insert(key, value).with_node(at)?;
                }
            }
            Value::hash(out)
        }
        b"delete_if" | b"keep_if" => {
            let block = call.block()?;
            let keep = call.method() == b"keep_if";
            for (key, value) in entries(h) {
                if m.call_proc(&block, vec![pair(&key, &value)], at)?.is_truthy() != keep {
                    h.borrow_mut().remove(&key).with_node(at)?;
                }
            }
            this()
        }
        b"transform_values" | b"transform_keys" => {
            let block = call.block()?;
            let values = call.method() == b"transform_values";
            let mut out = RubyHash::default();
            for (key, value) in entries(h) {
                if values {
                    let value = m.call_proc(&block, vec![value], at)?;
                    out.insert(key, value).with_node(at)?;
                } else {
                    let key = m.call_proc(&block, vec![key], at)?;
                    out.insert(key, value).with_node(at)?;
                }
            }
            Value::hash(out)
        }
        b"to_a" | b"entries" => Value::array(entries(h).iter().map(|(k, v)| pair(k, v)).collect()),
        b"to_h" if call.block.is_none() => this(),
        b"delete" => {
            call.arity(1, 1)?;
            h.borrow_mut().remove(&call.arg(0)).with_node(at)?.into()
        }
        b"merge" => {
            let out = Rc::new(RefCell::new(h.borrow().clone()));
            for i in 0..call.args.len() {
                let other = entries(&other_hash(call, i)?);
                merge_into(m, &out, other, call)?;
            }
            Value::Hash(out)
        }
        b"merge!" | b"update" => {
            for i in 0..call.args.len() {
                let other = entries(&other_hash(call, i)?);
                merge_into(m, h, other, call)?;
            }
            this()
        }
        b"invert" => {
            let mut out = RubyHash::default();
            for (key, value) in entries(h) {
                out.insert(value, key).with_node(at)?;
            }
            Value::hash(out)
        }
        b"clear" => {
            *h.borrow_mut() = RubyHash::default();
            this()
        }
        name if array::is_enumerable(name) => {
            let pairs = entries(h).iter().map(|(k, v)| pair(k, v)).collect();
            return array::array(m, &Rc::new(RefCell::new(pairs)), call);
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}
