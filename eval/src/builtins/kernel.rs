//! Functions called without a receiver, and the methods of procs and
//! of the built-in classes themselves (`Array.new`, `Math.sqrt`).

use std::rc::Rc;

use bstr::{BString, ByteSlice};
use nodemarshal::PatternFlags;
use num_bigint::BigInt;
use num_traits::{FromPrimitive, Signed, ToPrimitive};

use super::{numeric, Call, Dispatch};
use crate::errors::{ErrorKind, Flow, WithNode};
use crate::interpreter::Machine;
use crate::value::{Class, Proc, Regexp, RubyHash, Value};

/// Bytes `puts` writes for one argument; arrays print one element per
/// line.
fn puts_lines(value: &Value, out: &mut Vec<u8>, depth: usize) {
    match value {
        Value::Array(items) if depth < 64 => {
            let items = items.borrow();
            if items.is_empty() && depth == 0 {
                out.push(b'\n');
            }
            for item in items.iter() {
                puts_lines(item, out, depth + 1);
            }
        }
        Value::Array(_) => out.extend_from_slice(b"[...]\n"),
        other => {
            let text = other.to_s();
            out.extend_from_slice(&text);
            if !text.ends_with(b"\n") {
                out.push(b'\n');
            }
        }
    }
}

fn strict_int(value: &Value, call: &Call) -> Result<BigInt, Flow> {
    let invalid = || ErrorKind::Argument(format!("invalid value for Integer(): {value}"));
    match value {
        Value::Integer(n) => Ok(n.clone()),
        Value::Float(x) => match BigInt::from_f64(x.trunc()) {
            Some(n) => Ok(n),
            None => call.fail(ErrorKind::FloatDomain(value.to_string())),
        },
        Value::String(s) => {
            let text: Vec<u8> = s.trim().iter().copied().filter(|c| *c != b'_').collect();
            let (radix, digits) = match text.as_slice() {
                [b'0', b'x' | b'X', rest @ ..] => (16, rest),
                [b'0', b'b' | b'B', rest @ ..] => (2, rest),
                [b'0', b'o' | b'O', rest @ ..] => (8, rest),
                other => (10, other),
            };
            match BigInt::parse_bytes(digits, radix) {
                Some(n) if !digits.is_empty() => Ok(n),
                _ => call.fail(invalid()),
            }
        }
        other => call.fail(ErrorKind::TypeError {
            expected: "Integer",
            actual: other.type_of(),
        }),
    }
}

fn strict_float(value: &Value, call: &Call) -> Result<f64, Flow> {
    match value {
        Value::String(s) => {
            let text: String = s.trim().to_str_lossy().chars().filter(|c| *c != '_').collect();
            // Rust accepts "inf" and "NaN", Ruby does not
            let named = text.chars().any(|c| c.is_ascii_alphabetic() && !matches!(c, 'e' | 'E'));
            match text.parse::<f64>() {
                Ok(x) if !named => Ok(x),
                _ => call.fail(ErrorKind::Argument(format!("invalid value for Float(): {value}"))),
            }
        }
        other => other.to_f64().with_node(call.at),
    }
}

/// Kernel functions. Returns `Ok(None)` for unknown names.
pub(super) fn function(m: &mut Machine, call: &Call) -> Dispatch {
    let at = call.at;
    let value = match call.method() {
        b"puts" => {
            let mut out = Vec::new();
            if call.args.is_empty() {
                out.push(b'\n');
            }
            for arg in &call.args {
                puts_lines(arg, &mut out, 0);
            }
            m.write(&out, at)?;
            Value::Nil
        }
        b"print" => {
            let mut out = Vec::new();
            for arg in &call.args {
                out.extend_from_slice(&arg.to_s());
            }
            m.write(&out, at)?;
            Value::Nil
        }
        b"p" | b"pp" => {
            let mut out = Vec::new();
            for arg in &call.args {
                out.extend_from_slice(arg.to_string().as_bytes());
                out.push(b'\n');
            }
            m.write(&out, at)?;
            match call.args.as_slice() {
                [] => Value::Nil,
                [one] => one.clone(),
                many => Value::array(many.to_vec()),
            }
        }
        b"lambda" => {
            call.arity(0, 0)?;
            let block = call.block()?;
            Value::Proc(m.into_lambda(&block))
        }
        b"proc" => {
            call.arity(0, 0)?;
            Value::Proc(call.block()?)
        }
        b"loop" => {
            call.arity(0, 0)?;
            let block = call.block()?;
            loop {
                m.call_proc(&block, vec![], at)?;
            }
        }
        b"raise" | b"fail" => {
            call.arity(0, 2)?;
            let message = match call.args.as_slice() {
                [] => "unhandled exception".to_string(),
                [Value::Class(class)] => class.name().to_string(),
                [Value::Class(class), message] => format!("{} ({})", message.to_s(), class.name()),
                [message, ..] => message.to_s().to_string(),
            };
            return call.fail(ErrorKind::Raised(message));
        }
        b"block_given?" => Value::Bool(m.block.is_some()),
        b"Integer" => {
            call.arity(1, 1)?;
            Value::Integer(strict_int(&call.arg(0), call)?)
        }
        b"Float" => {
            call.arity(1, 1)?;
            Value::Float(strict_float(&call.arg(0), call)?)
        }
        b"String" => {
            call.arity(1, 1)?;
            Value::string(call.arg(0).to_s())
        }
        b"Array" => {
            call.arity(1, 1)?;
            match call.arg(0) {
                Value::Nil => Value::array(vec![]),
                Value::Array(items) => Value::Array(items),
                Value::Hash(h) => Value::array(
                    h.borrow()
                        .iter()
                        .map(|(k, v)| Value::array(vec![k.clone(), v.clone()]))
                        .collect(),
                ),
                other => Value::array(vec![other]),
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

pub(super) fn proc(m: &mut Machine, p: &Rc<Proc>, call: &Call) -> Dispatch {
    let value = match call.method() {
        b"call" | b"()" | b"yield" | b"[]" | b"===" => m.call_proc(p, call.args.clone(), call.at)?,
        b"to_proc" => Value::Proc(p.clone()),
        b"lambda?" => Value::Bool(p.lambda),
        b"arity" => Value::int(m.arity(p)),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

/// `Integer.sqrt`: the integer square root.
fn isqrt(call: &Call) -> Result<Value, Flow> {
    call.arity(1, 1)?;
    let n = call.arg(0).to_int().with_node(call.at)?;
    if n.is_negative() {
        return call.fail(ErrorKind::FloatDomain(
            "Numerical argument is out of domain - \"isqrt\"".into(),
        ));
    }
    Ok(Value::Integer(n.sqrt()))
}

fn new_array(m: &mut Machine, call: &Call) -> Result<Value, Flow> {
    call.arity(0, 2)?;
    if let [Value::Array(items)] = call.args.as_slice() {
        return Ok(Value::array(items.borrow().clone()));
    }
    let len = match call.args.first() {
        Some(_) => call.int_arg(0)?,
        None => 0,
    };
    let Some(len) = usize::try_from(len).ok().filter(|&n| n < 1 << 26) else {
        return call.fail(ErrorKind::Argument(if len < 0 {
            "negative array size".into()
        } else {
            "array size too big".into()
        }));
    };

    let mut items = Vec::with_capacity(len);
    match &call.block {
        Some(block) => {
            for i in 0..len {
                items.push(m.call_proc(block, vec![Value::int(i)], call.at)?);
            }
        }
        None => items.resize(len, call.arg(1)),
    }
    Ok(Value::array(items))
}

fn new_regexp(call: &Call) -> Result<Value, Flow> {
    call.arity(1, 2)?;
    let (source, mut flags) = match call.arg(0) {
        Value::Regexp(re) => (re.source.clone(), re.flags),
        Value::String(s) => (s.as_ref().clone(), PatternFlags::empty()),
        other => {
            return call.fail(ErrorKind::TypeError {
                expected: "String",
                actual: other.type_of(),
            })
        }
    };
    match call.args.get(1) {
        None | Some(Value::Nil | Value::Bool(false)) => {}
        Some(Value::Integer(bits)) => {
            let bits = bits.to_u32().unwrap_or(u32::MAX);
            flags |= PatternFlags::from_bits_truncate(bits);
        }
        Some(_) => flags |= PatternFlags::IGNORECASE,
    }
    let re = Regexp::new(BString::from(source), flags).with_node(call.at)?;
    Ok(Value::Regexp(Rc::new(re)))
}

/// Class methods of the built-in classes.
pub(super) fn class(m: &mut Machine, c: Class, call: &Call) -> Dispatch {
    let value = match (c, call.method()) {
        (Class::Math, _) => return numeric::math(call),
        (_, b"name" | b"to_s" | b"inspect") => Value::string(c.name()),
        (_, b"===") => {
            call.arity(1, 1)?;
            Value::Bool(call.arg(0).class().is_a(c))
        }
        (Class::Integer, b"sqrt") => isqrt(call)?,
        (Class::Array, b"new") => new_array(m, call)?,
        (Class::Hash, b"new") => {
            call.arity(0, 0)?;
            Value::hash(RubyHash::default())
        }
        (Class::String, b"new") => {
            call.arity(0, 1)?;
            match call.args.first() {
                Some(s) => Value::string(s.to_bytes().with_node(call.at)?.as_ref().clone()),
                None => Value::string(""),
            }
        }
        (Class::Regexp, b"new") => new_regexp(call)?,
        (Class::Proc, b"new") => {
            call.arity(0, 0)?;
            Value::Proc(call.block()?)
        }
        (_, b"new") => return call.fail(ErrorKind::Unsupported("instantiating this class")),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::puts_lines;
    use crate::value::Value;

    #[test]
    fn puts_flattens_arrays() {
        let mut out = Vec::new();
        let nested = Value::array(vec![Value::int(1), Value::array(vec![Value::string("a\n"), Value::Nil])]);
        puts_lines(&nested, &mut out, 0);
        assert_eq!(b"1\na\n\n".as_slice(), out.as_slice());

        out.clear();
        puts_lines(&Value::array(vec![]), &mut out, 0);
        assert_eq!(b"\n".as_slice(), out.as_slice());
    }
}
