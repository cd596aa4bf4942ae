//! Array and Range, and the iteration methods a Range or Hash answers
//! through its elements.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use nodemarshal::Symbol;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use rustc_hash::FxHashSet;

use super::{resolve_index, slice_bounds, sort_values, Call, Dispatch};
use crate::errors::{ErrorKind, Flow, WithNode};
use crate::interpreter::Machine;
use crate::value::{HashKey, Proc, Range, RubyHash, Value};

type Shared = Rc<RefCell<Vec<Value>>>;

/// Arrays created by padding or materializing a range are refused
/// above this length.
const MAX_ELEMENTS: usize = 1 << 26;

/// Methods that only iterate over the receiver's elements.
pub(super) fn is_enumerable(name: &[u8]) -> bool {
    matches!(
        name,
        b"map"
            | b"collect"
            | b"flat_map"
            | b"collect_concat"
            | b"select"
            | b"filter"
            | b"reject"
            | b"partition"
            | b"find"
            | b"detect"
            | b"find_index"
            | b"all?"
            | b"any?"
            | b"none?"
            | b"one?"
            | b"count"
            | b"sum"
            | b"inject"
            | b"reduce"
            | b"min"
            | b"max"
            | b"min_by"
            | b"max_by"
            | b"sort"
            | b"sort_by"
            | b"group_by"
            | b"tally"
            | b"uniq"
            | b"each_with_index"
            | b"each_with_object"
            | b"each_slice"
            | b"each_cons"
            | b"reverse_each"
            | b"take"
            | b"drop"
            | b"take_while"
            | b"drop_while"
            | b"zip"
            | b"include?"
            | b"member?"
            | b"first"
            | b"to_a"
            | b"entries"
            | b"to_h"
    )
}

fn get(a: &Shared, i: usize) -> Option<Value> {
    a.borrow().get(i).cloned()
}

fn holds(m: &mut Machine, block: &Rc<Proc>, value: Value, call: &Call) -> Result<bool, Flow> {
    Ok(m.call_proc(block, vec![value], call.at)?.is_truthy())
}

/// Ordering of two elements, decided by the block if there is one.
fn order(m: &mut Machine, a: &Value, b: &Value, block: Option<&Rc<Proc>>, call: &Call) -> Result<Ordering, Flow> {
    match block {
        Some(block) => {
            let result = m.call_proc(block, vec![a.clone(), b.clone()], call.at)?;
            Ok(result.to_i64().with_node(call.at)?.cmp(&0))
        }
        None => m.compare_values(a, b, call.at),
    }
}

fn sorted(m: &mut Machine, items: Vec<Value>, block: Option<&Rc<Proc>>, call: &Call) -> Result<Vec<Value>, Flow> {
    sort_values(items, &mut |a, b| order(m, a, b, block, call))
}

/// `min` or `max`: the first element for which no other compares as
/// `want` against it.
fn extreme(m: &mut Machine, items: Vec<Value>, want: Ordering, call: &Call) -> Result<Value, Flow> {
    call.arity(0, 0)?;
    let mut best: Option<Value> = None;
    for item in items {
        let better = match &best {
            None => true,
            Some(current) => order(m, &item, current, call.block.as_ref(), call)? == want,
        };
        if better {
            best = Some(item);
        }
    }
    Ok(best.into())
}

/// `min_by` or `max_by`.
fn extreme_by(m: &mut Machine, items: Vec<Value>, want: Ordering, call: &Call) -> Result<Value, Flow> {
    let block = call.block()?;
    let mut best: Option<(Value, Value)> = None;
    for item in items {
        let key = m.call_proc(&block, vec![item.clone()], call.at)?;
        let better = match &best {
            None => true,
            Some((current, _)) => m.compare_values(&key, current, call.at)? == want,
        };
        if better {
            best = Some((key, item));
        }
    }
    Ok(best.map(|(_, item)| item).into())
}

/// How `inject` combines the accumulator with each element.
enum Step {
    Method(Symbol),
    Block(Rc<Proc>),
}

fn inject(m: &mut Machine, items: Vec<Value>, call: &Call) -> Result<Value, Flow> {
    call.arity(0, 2)?;
    let (init, op) = match (call.args.first(), call.args.get(1)) {
        (Some(init), Some(Value::Symbol(op))) => (Some(init.clone()), Some(op.clone())),
        (Some(Value::Symbol(op)), None) if call.block.is_none() => (None, Some(op.clone())),
        (Some(init), None) => (Some(init.clone()), None),
        (None, _) => (None, None),
        (Some(_), Some(other)) => {
            return call.fail(ErrorKind::TypeError {
                expected: "Symbol",
                actual: other.type_of(),
            })
        }
    };

    let mut items = items.into_iter();
    let Some(mut acc) = init.or_else(|| items.next()) else {
        return Ok(Value::Nil);
    };
    let step = match op {
        Some(op) => Step::Method(op),
        None => Step::Block(call.block()?),
    };
    for item in items {
        acc = match &step {
            Step::Method(op) => m.call_method(acc, op, vec![item], None, call.at)?,
            Step::Block(block) => m.call_proc(block, vec![acc, item], call.at)?,
        };
    }
    Ok(acc)
}

fn sum(m: &mut Machine, items: Vec<Value>, call: &Call) -> Result<Value, Flow> {
    call.arity(0, 1)?;
    let mut acc = call.args.first().cloned().unwrap_or_else(|| Value::int(0));
    for item in items {
        let item = match &call.block {
            Some(block) => m.call_proc(block, vec![item], call.at)?,
            None => item,
        };
        acc = m.send(acc, "+", vec![item], call.at)?;
    }
    Ok(acc)
}

/// `all?`, `any?`, `none?` and `one?`.
fn quantify(m: &mut Machine, items: Vec<Value>, call: &Call) -> Result<Value, Flow> {
    call.arity(0, 1)?;
    let (mut hits, mut misses) = (0usize, 0usize);
    for item in items {
        let hit = match (call.args.first(), &call.block) {
            (Some(pattern), _) => m.send(pattern.clone(), "===", vec![item], call.at)?.is_truthy(),
            (None, Some(block)) => holds(m, block, item, call)?,
            (None, None) => item.is_truthy(),
        };
        if hit {
            hits += 1;
        } else {
            misses += 1;
        }
        let decided = match call.method() {
            b"all?" => misses > 0,
            b"one?" => hits > 1,
            _ => hits > 0,
        };
        if decided {
            break;
        }
    }
    Ok(Value::Bool(match call.method() {
        b"all?" => misses == 0,
        b"any?" => hits > 0,
        b"none?" => hits == 0,
        _ => hits == 1,
    }))
}

fn flatten_into(out: &mut Vec<Value>, items: &Shared, depth: Option<i64>, seen: &mut Vec<*const RefCell<Vec<Value>>>) -> Result<(), ErrorKind> {
    if seen.contains(&Rc::as_ptr(items)) {
        return Err(ErrorKind::Argument("tried to flatten recursive array".into()));
    }
    seen.push(Rc::as_ptr(items));
    for item in items.borrow().iter() {
        match item {
            Value::Array(inner) if depth != Some(0) => {
                flatten_into(out, inner, depth.map(|d| d - 1), seen)?;
            }
            other => out.push(other.clone()),
        }
    }
    seen.pop();
    Ok(())
}

fn join_into(out: &mut Vec<u8>, items: &Shared, sep: &[u8], seen: &mut Vec<*const RefCell<Vec<Value>>>) -> Result<(), ErrorKind> {
    if seen.contains(&Rc::as_ptr(items)) {
        return Err(ErrorKind::Argument("recursive array join".into()));
    }
    seen.push(Rc::as_ptr(items));
    for (i, item) in items.borrow().iter().enumerate() {
        if i > 0 {
            out.extend_from_slice(sep);
        }
        match item {
            Value::Array(inner) => join_into(out, inner, sep, seen)?,
            other => out.extend_from_slice(&other.to_s()),
        }
    }
    seen.pop();
    Ok(())
}

fn uniq(m: &mut Machine, items: Vec<Value>, call: &Call) -> Result<Vec<Value>, Flow> {
    let mut seen = FxHashSet::default();
    let mut out = Vec::new();
    for item in items {
        let key = match &call.block {
            Some(block) => m.call_proc(block, vec![item.clone()], call.at)?,
            None => item.clone(),
        };
        if seen.insert(HashKey::of(&key).with_node(call.at)?) {
            out.push(item);
        }
    }
    Ok(out)
}

fn to_hash(items: Vec<Value>, call: &Call) -> Result<Value, Flow> {
    let mut hash = RubyHash::default();
    for item in items {
        let Value::Array(pair) = &item else {
            return call.fail(ErrorKind::TypeError {
                expected: "Array",
                actual: item.type_of(),
            });
        };
        let pair = pair.borrow();
        if pair.len() != 2 {
            return call.fail(ErrorKind::Argument(format!(
                "wrong array length (expected 2, was {})",
                pair.len()
            )));
        }
        hash.insert(pair[0].clone(), pair[1].clone()).with_node(call.at)?;
    }
    Ok(Value::hash(hash))
}

fn count_arg(call: &Call, i: usize) -> Result<usize, Flow> {
    usize::try_from(call.int_arg(i)?).or_else(|_| call.fail(ErrorKind::Argument("negative array size".into())))
}

pub(super) fn array(m: &mut Machine, a: &Shared, call: &Call) -> Dispatch {
    let this = || Value::Array(a.clone());
    let snapshot = || a.borrow().clone();
    let at = call.at;

    let value = match call.method() {
        b"[]" | b"slice" => {
            call.arity(1, 2)?;
            let items = a.borrow();
            match (&call.args[0], call.args.len()) {
                (Value::Integer(_) | Value::Float(_), 1) => {
                    resolve_index(call.int_arg(0)?, items.len()).map(|i| items[i].clone()).into()
                }
                _ => match slice_bounds(call, items.len())? {
                    Some(range) => Value::array(items[range].to_vec()),
                    None => Value::Nil,
                },
            }
        }
        b"at" => {
            call.arity(1, 1)?;
            let items = a.borrow();
            resolve_index(call.int_arg(0)?, items.len()).map(|i| items[i].clone()).into()
        }
        b"fetch" => {
            call.arity(1, 2)?;
            let index = call.int_arg(0)?;
            let found = {
                let items = a.borrow();
                resolve_index(index, items.len()).map(|i| items[i].clone())
            };
            match (found, call.args.get(1), &call.block) {
                (Some(value), _, _) => value,
                (None, _, Some(block)) => m.call_proc(block, vec![call.arg(0)], at)?,
                (None, Some(default), None) => default.clone(),
                (None, None, None) => {
                    let len = a.borrow().len();
                    return call.fail(ErrorKind::Raised(format!(
                        "index {index} outside of array bounds: -{len}...{len}"
                    )));
                }
            }
        }
        b"[]=" => {
            call.arity(2, 2)?;
            let index = call.int_arg(0)?;
            let value = call.arg(1);
            let mut items = a.borrow_mut();
            let len = items.len();
            let slot = if index < 0 { index + len as i64 } else { index };
            let Ok(slot) = usize::try_from(slot) else {
                return call.fail(ErrorKind::IndexTooSmall { index, len });
            };
            if slot >= len {
                if slot >= MAX_ELEMENTS {
                    return call.fail(ErrorKind::Argument(format!("index {index} too big")));
                }
                items.resize(slot + 1, Value::Nil);
            }
            items[slot] = value.clone();
            value
        }
        b"first" | b"last" => {
            call.arity(0, 1)?;
            let items = a.borrow();
            let first = call.method() == b"first";
            match call.args.first() {
                None if first => items.first().cloned().into(),
                None => items.last().cloned().into(),
                Some(_) => {
                    let n = count_arg(call, 0)?.min(items.len());
                    let range = if first { 0..n } else { items.len() - n..items.len() };
                    Value::array(items[range].to_vec())
                }
            }
        }
        b"push" | b"append" => {
            a.borrow_mut().extend(call.args.iter().cloned());
            this()
        }
        b"<<" => {
            call.arity(1, 1)?;
            a.borrow_mut().push(call.arg(0));
            this()
        }
        b"pop" => a.borrow_mut().pop().into(),
        b"shift" => {
            let mut items = a.borrow_mut();
            if items.is_empty() {
                Value::Nil
            } else {
                items.remove(0)
            }
        }
        b"unshift" | b"prepend" => {
            a.borrow_mut().splice(0..0, call.args.iter().cloned());
            this()
        }
        b"insert" => {
            call.arity(1, usize::MAX)?;
            let index = call.int_arg(0)?;
            let mut items = a.borrow_mut();
            let len = items.len();
            let pos = if index < 0 { index + len as i64 + 1 } else { index };
            let Ok(pos) = usize::try_from(pos) else {
                return call.fail(ErrorKind::IndexTooSmall { index, len });
            };
            if pos > len {
                if pos >= MAX_ELEMENTS {
                    return call.fail(ErrorKind::Argument(format!("index {index} too big")));
                }
                items.resize(pos, Value::Nil);
            }
            items.splice(pos..pos, call.args[1..].iter().cloned());
            drop(items);
            this()
        }
        b"concat" => {
            for arg in &call.args {
                let Value::Array(other) = arg else {
                    return call.fail(ErrorKind::TypeError {
                        expected: "Array",
                        actual: arg.type_of(),
                    });
                };
                let other = other.borrow().clone();
                a.borrow_mut().extend(other);
            }
            this()
        }
        b"delete" => {
            call.arity(1, 1)?;
            let target = call.arg(0);
            let mut items = a.borrow_mut();
            let before = items.len();
            items.retain(|item| *item != target);
            if items.len() == before {
                Value::Nil
            } else {
                target
            }
        }
        b"delete_at" => {
            call.arity(1, 1)?;
            let mut items = a.borrow_mut();
            match resolve_index(call.int_arg(0)?, items.len()) {
                Some(i) => items.remove(i),
                None => Value::Nil,
            }
        }
        b"clear" => {
            a.borrow_mut().clear();
            this()
        }
        b"length" | b"size" => Value::int(a.borrow().len()),
        b"empty?" => Value::Bool(a.borrow().is_empty()),
        b"include?" | b"member?" => {
            call.arity(1, 1)?;
            let target = call.arg(0);
            Value::Bool(a.borrow().iter().any(|item| *item == target))
        }
        b"index" | b"find_index" => {
            call.arity(0, 1)?;
            let mut found = None;
            for (i, item) in snapshot().into_iter().enumerate() {
                let hit = match (call.args.first(), &call.block) {
                    (Some(target), _) => item == *target,
                    (None, Some(block)) => holds(m, block, item, call)?,
                    (None, None) => return call.fail(ErrorKind::NoBlock),
                };
                if hit {
                    found = Some(Value::int(i));
                    break;
                }
            }
            found.into()
        }
        b"count" => {
            call.arity(0, 1)?;
            match (call.args.first(), &call.block) {
                (None, None) => Value::int(a.borrow().len()),
                (Some(target), _) => Value::int(a.borrow().iter().filter(|item| *item == target).count()),
                (None, Some(block)) => {
                    let mut n = 0usize;
                    for item in snapshot() {
                        if holds(m, block, item, call)? {
                            n += 1;
                        }
                    }
                    Value::int(n)
                }
            }
        }

        b"each" => {
            let block = call.block()?;
            let mut i = 0;
            while let Some(item) = get(a, i) {
                m.call_proc(&block, vec![item], at)?;
                i += 1;
            }
            this()
        }
        b"each_with_index" => {
            let block = call.block()?;
            let mut i = 0;
            while let Some(item) = get(a, i) {
                m.call_proc(&block, vec![item, Value::int(i)], at)?;
                i += 1;
            }
            this()
        }
        b"each_index" => {
            let block = call.block()?;
            let mut i = 0;
            while i < a.borrow().len() {
                m.call_proc(&block, vec![Value::int(i)], at)?;
                i += 1;
            }
            this()
        }
        b"reverse_each" => {
            let block = call.block()?;
            for item in snapshot().into_iter().rev() {
                m.call_proc(&block, vec![item], at)?;
            }
            this()
        }
        b"each_slice" | b"each_cons" => {
            call.arity(1, 1)?;
            let block = call.block()?;
            let n = count_arg(call, 0)?;
            if n == 0 {
                return call.fail(ErrorKind::Argument("invalid size".into()));
            }
            let items = snapshot();
            let groups: Vec<&[Value]> = if call.method() == b"each_slice" {
                items.chunks(n).collect()
            } else {
                items.windows(n).collect()
            };
            for group in groups {
                m.call_proc(&block, vec![Value::array(group.to_vec())], at)?;
            }
            this()
        }
        b"each_with_object" => {
            call.arity(1, 1)?;
            let block = call.block()?;
            let memo = call.arg(0);
            for item in snapshot() {
                m.call_proc(&block, vec![item, memo.clone()], at)?;
            }
            memo
        }
        b"cycle" => {
            call.arity(0, 1)?;
            let block = call.block()?;
            let rounds = match call.args.first() {
                Some(_) => Some(count_arg(call, 0)?),
                None => None,
            };
            let mut round = 0;
            while rounds.map_or(true, |n| round < n) && !a.borrow().is_empty() {
                for item in snapshot() {
                    m.call_proc(&block, vec![item], at)?;
                }
                round += 1;
            }
            Value::Nil
        }

        b"map" | b"collect" => {
            let block = call.block()?;
            let mut out = Vec::new();
            let mut i = 0;
            while let Some(item) = get(a, i) {
                out.push(m.call_proc(&block, vec![item], at)?);
                i += 1;
            }
            Value::array(out)
        }
        b"map!" | b"collect!" => {
            let block = call.block()?;
            let mut out = Vec::new();
            for item in snapshot() {
                out.push(m.call_proc(&block, vec![item], at)?);
            }
            *a.borrow_mut() = out;
            this()
        }
        b"flat_map" | b"collect_concat" => {
            let block = call.block()?;
            let mut out = Vec::new();
            for item in snapshot() {
                match m.call_proc(&block, vec![item], at)? {
                    Value::Array(inner) => out.extend(inner.borrow().iter().cloned()),
                    other => out.push(other),
                }
            }
            Value::array(out)
        }
        b"select" | b"filter" | b"reject" => {
            let block = call.block()?;
            let keep = call.method() != b"reject";
            let mut out = Vec::new();
            for item in snapshot() {
                if holds(m, &block, item.clone(), call)? == keep {
                    out.push(item);
                }
            }
            Value::array(out)
        }
        b"select!" | b"filter!" | b"keep_if" | b"reject!" | b"delete_if" => {
            let block = call.block()?;
            let keep = !matches!(call.method(), b"reject!" | b"delete_if");
            let items = snapshot();
            let before = items.len();
            let mut out = Vec::new();
            for item in items {
                if holds(m, &block, item.clone(), call)? == keep {
                    out.push(item);
                }
            }
            let changed = out.len() != before;
            *a.borrow_mut() = out;
            if changed || matches!(call.method(), b"keep_if" | b"delete_if") {
                this()
            } else {
                Value::Nil
            }
        }
        b"partition" => {
            let block = call.block()?;
            let (mut yes, mut no) = (Vec::new(), Vec::new());
            for item in snapshot() {
                if holds(m, &block, item.clone(), call)? {
                    yes.push(item);
                } else {
                    no.push(item);
                }
            }
            Value::array(vec![Value::array(yes), Value::array(no)])
        }
        b"find" | b"detect" => {
            let block = call.block()?;
            let mut found = None;
            for item in snapshot() {
                if holds(m, &block, item.clone(), call)? {
                    found = Some(item);
                    break;
                }
            }
            found.into()
        }
        b"all?" | b"any?" | b"none?" | b"one?" => quantify(m, snapshot(), call)?,
        b"sum" => sum(m, snapshot(), call)?,
        b"inject" | b"reduce" => inject(m, snapshot(), call)?,
        b"min" => extreme(m, snapshot(), Ordering::Less, call)?,
        b"max" => extreme(m, snapshot(), Ordering::Greater, call)?,
        b"min_by" => extreme_by(m, snapshot(), Ordering::Less, call)?,
        b"max_by" => extreme_by(m, snapshot(), Ordering::Greater, call)?,
        b"sort" => Value::array(sorted(m, snapshot(), call.block.as_ref(), call)?),
        b"sort!" => {
            let out = sorted(m, snapshot(), call.block.as_ref(), call)?;
            *a.borrow_mut() = out;
            this()
        }
        b"sort_by" => {
            let block = call.block()?;
            let mut keyed = Vec::new();
            for item in snapshot() {
                let key = m.call_proc(&block, vec![item.clone()], at)?;
                keyed.push(Value::array(vec![key, item]));
            }
            let keyed = sort_values(keyed, &mut |x, y| {
                let (Value::Array(x), Value::Array(y)) = (x, y) else {
                    return Ok(Ordering::Equal);
                };
                m.compare_values(&x.borrow()[0], &y.borrow()[0], at)
            })?;
            let out = keyed
                .into_iter()
                .filter_map(|pair| match pair {
                    Value::Array(pair) => pair.borrow().get(1).cloned(),
                    _ => None,
                })
                .collect();
            Value::array(out)
        }
        b"group_by" => {
            let block = call.block()?;
            let mut groups = RubyHash::default();
            for item in snapshot() {
                let key = m.call_proc(&block, vec![item.clone()], at)?;
                let existing = match groups.get(&key).with_node(at)? {
                    Some(Value::Array(list)) => Some(list.clone()),
                    _ => None,
                };
                match existing {
                    Some(list) => list.borrow_mut().push(item),
                    None => groups.insert(key, Value::array(vec![item])).with_node(at)?,
                }
            }
            Value::hash(groups)
        }
        b"tally" => {
            let mut counts = RubyHash::default();
            for item in snapshot() {
                let n = match counts.get(&item).with_node(at)? {
                    Some(Value::Integer(n)) => n + 1u32,
                    _ => BigInt::from(1),
                };
                counts.insert(item, Value::Integer(n)).with_node(at)?;
            }
            Value::hash(counts)
        }
        b"uniq" => Value::array(uniq(m, snapshot(), call)?),
        b"compact" => Value::array(a.borrow().iter().filter(|v| !matches!(v, Value::Nil)).cloned().collect()),
        b"flatten" => {
            call.arity(0, 1)?;
            let depth = match call.args.first() {
                Some(_) => Some(call.int_arg(0)?),
                None => None,
            };
            let mut out = Vec::new();
            flatten_into(&mut out, a, depth, &mut Vec::new()).with_node(at)?;
            Value::array(out)
        }
        b"reverse" => {
            let mut items = snapshot();
            items.reverse();
            Value::array(items)
        }
        b"rotate" => {
            call.arity(0, 1)?;
            let mut items = snapshot();
            if !items.is_empty() {
                let n = match call.args.first() {
                    Some(_) => call.int_arg(0)?,
                    None => 1,
                };
                let shift = n.rem_euclid(items.len() as i64) as usize;
                items.rotate_left(shift);
            }
            Value::array(items)
        }
        b"join" => {
            call.arity(0, 1)?;
            let sep = match call.args.first() {
                Some(Value::Nil) | None => Default::default(),
                Some(sep) => sep.to_bytes().with_node(at)?.as_ref().clone(),
            };
            let mut out = Vec::new();
            join_into(&mut out, a, &sep, &mut Vec::new()).with_node(at)?;
            Value::string(out)
        }
        b"take" | b"drop" => {
            call.arity(1, 1)?;
            let n = count_arg(call, 0)?;
            let items = a.borrow();
            let n = n.min(items.len());
            let range = if call.method() == b"take" { 0..n } else { n..items.len() };
            Value::array(items[range].to_vec())
        }
        b"take_while" | b"drop_while" => {
            let block = call.block()?;
            let items = snapshot();
            let mut n = 0;
            while n < items.len() && holds(m, &block, items[n].clone(), call)? {
                n += 1;
            }
            let range = if call.method() == b"take_while" { 0..n } else { n..items.len() };
            Value::array(items[range].to_vec())
        }
        b"zip" => {
            let others = call
                .args
                .iter()
                .map(|other| match other {
                    Value::Array(other) => Ok(other.borrow().clone()),
                    other => call.fail(ErrorKind::TypeError {
                        expected: "Array",
                        actual: other.type_of(),
                    }),
                })
                .collect::<Result<Vec<_>, _>>()?;
            let out = snapshot()
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    let mut row = vec![item];
                    row.extend(others.iter().map(|o| o.get(i).cloned().unwrap_or(Value::Nil)));
                    Value::array(row)
                })
                .collect();
            Value::array(out)
        }
        b"to_a" | b"entries" => this(),
        b"to_h" => to_hash(snapshot(), call)?,
        b"+" | b"-" | b"&" | b"|" => {
            call.arity(1, 1)?;
            let Value::Array(other) = call.arg(0) else {
                return call.fail(ErrorKind::TypeError {
                    expected: "Array",
                    actual: call.arg(0).type_of(),
                });
            };
            let (mine, theirs) = (snapshot(), other.borrow().clone());
            let out = match call.method() {
                b"+" => mine.into_iter().chain(theirs).collect(),
                b"-" => mine.into_iter().filter(|x| !theirs.contains(x)).collect(),
                b"&" => uniq(m, mine.into_iter().filter(|x| theirs.contains(x)).collect(), call)?,
                _ => uniq(m, mine.into_iter().chain(theirs).collect(), call)?,
            };
            Value::array(out)
        }
        b"*" => {
            call.arity(1, 1)?;
            match call.arg(0) {
                Value::String(sep) => {
                    let mut out = Vec::new();
                    join_into(&mut out, a, &sep, &mut Vec::new()).with_node(at)?;
                    Value::string(out)
                }
                _ => {
                    let n = count_arg(call, 0)?;
                    let items = snapshot();
                    if items.len().saturating_mul(n) > MAX_ELEMENTS {
                        return call.fail(ErrorKind::Argument("argument too big".into()));
                    }
                    Value::array(std::iter::repeat(items.iter().cloned()).take(n).flatten().collect())
                }
            }
        }
        b"<=>" => {
            call.arity(1, 1)?;
            this()
                .compare(&call.arg(0))
                .with_node(at)?
                .map_or(Value::Nil, |o| Value::int(o as i8))
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

/// The elements of an integer range.
fn range_items(r: &Range, call: &Call) -> Result<Vec<Value>, Flow> {
    let (start, end) = r.int_bounds().with_node(call.at)?;
    let len = (&end - &start).to_usize().unwrap_or(if end > start { usize::MAX } else { 0 });
    if len > MAX_ELEMENTS {
        return call.fail(ErrorKind::Argument(format!("range {}..{} too large", r.start, r.end)));
    }
    let mut items = Vec::with_capacity(len);
    let mut i = start;
    while i < end {
        items.push(Value::Integer(i.clone()));
        i += 1;
    }
    Ok(items)
}

pub(super) fn range(m: &mut Machine, r: &Rc<Range>, call: &Call) -> Dispatch {
    let this = || Value::Range(r.clone());
    let at = call.at;

    let value = match call.method() {
        b"begin" => r.start.clone(),
        b"end" => r.end.clone(),
        b"first" if call.args.is_empty() => r.start.clone(),
        b"last" if call.args.is_empty() => r.end.clone(),
        b"last" => {
            let items = Rc::new(RefCell::new(range_items(r, call)?));
            return array(m, &items, call);
        }
        b"exclude_end?" => Value::Bool(r.exclusive),
        b"include?" | b"member?" | b"cover?" | b"===" => {
            call.arity(1, 1)?;
            Value::Bool(r.contains(&call.arg(0)).with_node(at)?)
        }
        b"size" | b"count" if call.args.is_empty() && call.block.is_none() => {
            let (start, end) = r.int_bounds().with_node(at)?;
            Value::Integer((end - start).max(BigInt::from(0)))
        }
        b"min" if call.block.is_none() => {
            let (start, end) = r.int_bounds().with_node(at)?;
            if start < end {
                Value::Integer(start)
            } else {
                Value::Nil
            }
        }
        b"max" if call.block.is_none() => {
            let (start, end) = r.int_bounds().with_node(at)?;
            if start < end {
                Value::Integer(end - 1)
            } else {
                Value::Nil
            }
        }
        b"sum" if call.args.is_empty() && call.block.is_none() => {
            let (start, end) = r.int_bounds().with_node(at)?;
            if start >= end {
                Value::int(0)
            } else {
                let n = &end - &start;
                Value::Integer((&start + &end - 1) * n / 2)
            }
        }
        b"each" => {
            let block = call.block()?;
            let (mut i, end) = r.int_bounds().with_node(at)?;
            while i < end {
                m.call_proc(&block, vec![Value::Integer(i.clone())], at)?;
                i += 1;
            }
            this()
        }
        b"step" => {
            call.arity(1, 1)?;
            let block = call.block()?;
            let step = call.arg(0);
            if !step.is_number() || !matches!(step.compare(&Value::int(0)).with_node(at)?, Some(Ordering::Greater)) {
                return call.fail(ErrorKind::Argument("step can't be negative or zero".into()));
            }
            let mut i = r.start.clone();
            loop {
                let ordering = m.compare_values(&i, &r.end, at)?;
                if ordering.is_gt() || (r.exclusive && ordering.is_eq()) {
                    break;
                }
                m.call_proc(&block, vec![i.clone()], at)?;
                i = super::arith(super::Op::Add, &i, &step).with_node(at)?;
            }
            this()
        }
        b"to_a" | b"entries" => Value::array(range_items(r, call)?),
        name if is_enumerable(name) => {
            let items = Rc::new(RefCell::new(range_items(r, call)?));
            return array(m, &items, call);
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}
