//! Integer, Float and Math.

use num_bigint::BigInt;
use num_traits::{FromPrimitive, Signed, ToPrimitive, Zero};

use super::{Call, Dispatch};
use crate::errors::{ErrorKind, Flow, WithNode};
use crate::interpreter::Machine;
use crate::value::Value;

/// Exponentiation results above this many bits are refused.
const MAX_POW_BITS: u64 = 1 << 24;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl Op {
    fn from_name(name: &[u8]) -> Option<Self> {
        Some(match name {
            b"+" => Op::Add,
            b"-" => Op::Sub,
            b"*" => Op::Mul,
            b"/" | b"div" => Op::Div,
            b"%" | b"modulo" => Op::Mod,
            b"**" | b"pow" => Op::Pow,
            _ => return None,
        })
    }
}

/// Floored division, so that the remainder has the sign of `b`.
fn floor_div(a: &BigInt, b: &BigInt) -> Result<(BigInt, BigInt), ErrorKind> {
    if b.is_zero() {
        return Err(ErrorKind::ZeroDivision);
    }
    let (q, r) = (a / b, a % b);
    if !r.is_zero() && r.is_negative() != b.is_negative() {
        Ok((q - 1, r + b))
    } else {
        Ok((q, r))
    }
}

fn float_mod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && (r < 0.0) != (b < 0.0) {
        r + b
    } else {
        r
    }
}

fn int_pow(base: &BigInt, exp: &BigInt) -> Result<Value, ErrorKind> {
    if exp.is_negative() {
        let base = base.to_f64().unwrap_or(f64::NAN);
        return Ok(Value::Float(base.powf(exp.to_f64().unwrap_or(f64::NAN))));
    }

    let trivial = base.is_zero() || base.abs() == BigInt::from(1);
    let too_large = || ErrorKind::ExponentTooLarge(exp.to_string());
    let exp32 = match exp.to_u32() {
        Some(e) => e,
        None if trivial => (exp % 2u32).to_u32().unwrap_or(0) + 2,
        None => return Err(too_large()),
    };
    if !trivial && base.bits().saturating_mul(u64::from(exp32)) > MAX_POW_BITS {
        return Err(too_large());
    }
    Ok(Value::Integer(base.pow(exp32)))
}

pub(crate) fn arith(op: Op, lhs: &Value, rhs: &Value) -> Result<Value, ErrorKind> {
    if let (Value::Integer(a), Value::Integer(b)) = (lhs, rhs) {
        return Ok(Value::Integer(match op {
            Op::Add => a + b,
            Op::Sub => a - b,
            Op::Mul => a * b,
            Op::Div => floor_div(a, b)?.0,
            Op::Mod => floor_div(a, b)?.1,
            Op::Pow => return int_pow(a, b),
        }));
    }

    let (a, b) = (lhs.to_f64()?, rhs.to_f64()?);
    Ok(Value::Float(match op {
        Op::Add => a + b,
        Op::Sub => a - b,
        Op::Mul => a * b,
        Op::Div => a / b,
        Op::Mod => float_mod(a, b),
        Op::Pow => a.powf(b),
    }))
}

fn float_divmod(x: f64, y: f64) -> Result<Value, ErrorKind> {
    if y == 0.0 {
        return Err(ErrorKind::ZeroDivision);
    }
    let quotient = float_to_int((x / y).floor())?;
    Ok(Value::array(vec![quotient, Value::Float(float_mod(x, y))]))
}

fn float_to_int(x: f64) -> Result<Value, ErrorKind> {
    BigInt::from_f64(x)
        .map(Value::Integer)
        .ok_or_else(|| ErrorKind::FloatDomain(Value::Float(x).to_string()))
}

/// Operators shared by both numeric classes.
fn operator(lhs: &Value, call: &Call) -> Dispatch {
    let name = call.method();
    let comparison = matches!(name, b"<" | b"<=" | b">" | b">=" | b"<=>" | b"==" | b"===");
    let op = Op::from_name(name);
    if !comparison && op.is_none() {
        return Ok(None);
    }
    call.arity(1, 1)?;
    let rhs = call.arg(0);

    if comparison {
        if matches!(name, b"==" | b"===") {
            return Ok(Some(Value::Bool(*lhs == rhs)));
        }
        let ordering = lhs.compare(&rhs).with_node(call.at)?;
        if name == b"<=>" {
            return Ok(Some(ordering.map_or(Value::Nil, |o| Value::int(o as i8))));
        }
        let Some(ordering) = ordering else {
            return call.fail(ErrorKind::Incomparable(lhs.class().name(), rhs.class().name()));
        };
        return Ok(Some(Value::Bool(match name {
            b"<" => ordering.is_lt(),
            b"<=" => ordering.is_le(),
            b">" => ordering.is_gt(),
            _ => ordering.is_ge(),
        })));
    }

    if !rhs.is_number() {
        return call.fail(ErrorKind::TypeError {
            expected: lhs.class().name(),
            actual: rhs.type_of(),
        });
    }
    let Some(op) = op else { return Ok(None) };

    // Float#div floors into an Integer
    if name == b"div" && !(matches!(lhs, Value::Integer(_)) && matches!(rhs, Value::Integer(_))) {
        if rhs.is_zero() {
            return call.fail(ErrorKind::ZeroDivision);
        }
        let quotient = lhs.to_f64().with_node(call.at)? / rhs.to_f64().with_node(call.at)?;
        return float_to_int(quotient.floor()).with_node(call.at).map(Some);
    }
    arith(op, lhs, &rhs).with_node(call.at).map(Some)
}

/// `to_s` with an optional radix.
fn int_to_s(n: &BigInt, call: &Call) -> Result<Value, Flow> {
    call.arity(0, 1)?;
    let radix = match call.args.first() {
        Some(r) => r.to_i64().with_node(call.at)?,
        None => 10,
    };
    if !(2..=36).contains(&radix) {
        return call.fail(ErrorKind::Argument(format!("invalid radix {radix}")));
    }
    Ok(Value::string(n.to_str_radix(radix as u32)))
}

pub(super) fn integer(m: &mut Machine, n: &BigInt, call: &Call) -> Dispatch {
    let receiver = Value::Integer(n.clone());
    if let Some(value) = operator(&receiver, call)? {
        return Ok(Some(value));
    }

    let value = match call.method() {
        b"-@" => Value::Integer(-n),
        b"+@" | b"to_i" | b"to_int" | b"floor" | b"ceil" | b"round" | b"truncate" | b"ord" => receiver,
        b"~" => Value::Integer(!n),
        b"&" | b"|" | b"^" => {
            call.arity(1, 1)?;
            let other = call.arg(0).to_int().with_node(call.at)?;
            Value::Integer(match call.method() {
                b"&" => n & other,
                b"|" => n | other,
                _ => n ^ other,
            })
        }
        b"<<" | b">>" => {
            call.arity(1, 1)?;
            let mut shift = call.int_arg(0)?;
            if call.method() == b">>" {
                shift = -shift;
            }
            if shift >= 0 {
                if n.bits().saturating_add(shift.unsigned_abs()) > MAX_POW_BITS {
                    return call.fail(ErrorKind::ExponentTooLarge(shift.to_string()));
                }
                Value::Integer(n << shift.unsigned_abs())
            } else {
                let shift = shift.unsigned_abs().min(n.bits() + 1);
                Value::Integer(n >> shift)
            }
        }
        b"abs" | b"magnitude" => Value::Integer(n.abs()),
        b"succ" | b"next" => Value::Integer(n + 1),
        b"pred" => Value::Integer(n - 1),
        b"to_f" => Value::Float(n.to_f64().unwrap_or(f64::INFINITY)),
        b"fdiv" => {
            call.arity(1, 1)?;
            let divisor = call.arg(0).to_f64().with_node(call.at)?;
            Value::Float(n.to_f64().unwrap_or(f64::NAN) / divisor)
        }
        b"divmod" => {
            call.arity(1, 1)?;
            match call.arg(0) {
                Value::Integer(d) => {
                    let (q, r) = floor_div(n, &d).with_node(call.at)?;
                    Value::array(vec![Value::Integer(q), Value::Integer(r)])
                }
                other => {
                    let y = other.to_f64().with_node(call.at)?;
                    float_divmod(n.to_f64().unwrap_or(f64::NAN), y).with_node(call.at)?
                }
            }
        }
        b"to_s" | b"inspect" => int_to_s(n, call)?,
        b"chr" => match n.to_u8() {
            Some(byte) => Value::string(vec![byte]),
            None => return call.fail(ErrorKind::Argument(format!("{n} out of char range"))),
        },
        b"even?" => Value::Bool(!n.bit(0)),
        b"odd?" => Value::Bool(n.bit(0)),
        b"zero?" => Value::Bool(n.is_zero()),
        b"positive?" => Value::Bool(n.is_positive()),
        b"negative?" => Value::Bool(n.is_negative()),
        b"bit_length" => Value::int(n.bits()),
        b"digits" => {
            if n.is_negative() {
                return call.fail(ErrorKind::Argument("out of domain".into()));
            }
            let digits = n.to_radix_le(10).1;
            Value::array(digits.into_iter().map(Value::int).collect())
        }
        b"times" => {
            let block = call.block()?;
            let mut i = BigInt::zero();
            while &i < n {
                m.call_proc(&block, vec![Value::Integer(i.clone())], call.at)?;
                i += 1;
            }
            receiver
        }
        b"upto" | b"downto" => {
            call.arity(1, 1)?;
            let block = call.block()?;
            let limit = call.arg(0).to_int().with_node(call.at)?;
            let up = call.method() == b"upto";
            let mut i = n.clone();
            while if up { i <= limit } else { i >= limit } {
                m.call_proc(&block, vec![Value::Integer(i.clone())], call.at)?;
                if up {
                    i += 1;
                } else {
                    i -= 1;
                }
            }
            receiver
        }
        b"step" => {
            call.arity(1, 2)?;
            let block = call.block()?;
            let limit = call.arg(0);
            let step = match call.args.get(1) {
                Some(step) => step.clone(),
                None => Value::int(1),
            };
            if step.is_zero() {
                return call.fail(ErrorKind::Argument("step can't be 0".into()));
            }
            let ascending = step.compare(&Value::int(0)).with_node(call.at)?.is_some_and(|o| o.is_gt());
            let mut i = receiver.clone();
            loop {
                let ordering = m.compare_values(&i, &limit, call.at)?;
                if (ascending && ordering.is_gt()) || (!ascending && ordering.is_lt()) {
                    break;
                }
                m.call_proc(&block, vec![i.clone()], call.at)?;
                i = arith(Op::Add, &i, &step).with_node(call.at)?;
            }
            receiver
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

/// Round `x` to `digits` decimal places with `f`.
fn round_to(x: f64, call: &Call, f: fn(f64) -> f64) -> Result<Value, Flow> {
    call.arity(0, 1)?;
    let digits = match call.args.first() {
        Some(d) => d.to_i64().with_node(call.at)?,
        None => 0,
    };
    if digits > 0 {
        let scale = 10f64.powi(digits.min(308) as i32);
        return Ok(Value::Float(f(x * scale) / scale));
    }
    float_to_int(f(x)).with_node(call.at)
}

pub(super) fn float(x: f64, call: &Call) -> Dispatch {
    let receiver = Value::Float(x);
    if let Some(value) = operator(&receiver, call)? {
        return Ok(Some(value));
    }

    let value = match call.method() {
        b"-@" => Value::Float(-x),
        b"+@" | b"to_f" => receiver,
        b"abs" | b"magnitude" => Value::Float(x.abs()),
        b"to_i" | b"to_int" | b"truncate" => float_to_int(x.trunc()).with_node(call.at)?,
        b"floor" => round_to(x, call, f64::floor)?,
        b"ceil" => round_to(x, call, f64::ceil)?,
        b"round" => round_to(x, call, f64::round)?,
        b"fdiv" | b"quo" => {
            call.arity(1, 1)?;
            Value::Float(x / call.arg(0).to_f64().with_node(call.at)?)
        }
        b"divmod" => {
            call.arity(1, 1)?;
            float_divmod(x, call.arg(0).to_f64().with_node(call.at)?).with_node(call.at)?
        }
        b"nan?" => Value::Bool(x.is_nan()),
        b"finite?" => Value::Bool(x.is_finite()),
        b"infinite?" if x.is_infinite() => Value::int(x.signum() as i64),
        b"infinite?" => Value::Nil,
        b"zero?" => Value::Bool(x == 0.0),
        b"positive?" => Value::Bool(x > 0.0),
        b"negative?" => Value::Bool(x < 0.0),
        b"to_s" | b"inspect" => Value::string(receiver.to_string()),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn domain_error(function: &str) -> ErrorKind {
    ErrorKind::FloatDomain(format!("Numerical argument is out of domain - \"{function}\""))
}

/// Functions of the `Math` module.
pub(super) fn math(call: &Call) -> Dispatch {
    let unary: Option<fn(f64) -> f64> = match call.method() {
        b"sin" => Some(f64::sin),
        b"cos" => Some(f64::cos),
        b"tan" => Some(f64::tan),
        b"atan" => Some(f64::atan),
        b"sinh" => Some(f64::sinh),
        b"cosh" => Some(f64::cosh),
        b"tanh" => Some(f64::tanh),
        b"exp" => Some(f64::exp),
        b"cbrt" => Some(f64::cbrt),
        _ => None,
    };
    if let Some(f) = unary {
        call.arity(1, 1)?;
        let x = call.arg(0).to_f64().with_node(call.at)?;
        return Ok(Some(Value::Float(f(x))));
    }

    let float = |i: usize| call.arg(i).to_f64().with_node(call.at);
    let value = match call.method() {
        b"sqrt" => {
            call.arity(1, 1)?;
            let x = float(0)?;
            if x < 0.0 {
                return call.fail(domain_error("sqrt"));
            }
            x.sqrt()
        }
        b"asin" | b"acos" => {
            call.arity(1, 1)?;
            let x = float(0)?;
            if !(-1.0..=1.0).contains(&x) {
                return call.fail(domain_error(if call.method() == b"asin" { "asin" } else { "acos" }));
            }
            if call.method() == b"asin" {
                x.asin()
            } else {
                x.acos()
            }
        }
        b"log" => {
            call.arity(1, 2)?;
            let x = float(0)?;
            if x < 0.0 {
                return call.fail(domain_error("log"));
            }
            match call.args.get(1) {
                Some(_) => x.ln() / float(1)?.ln(),
                None => x.ln(),
            }
        }
        b"log2" | b"log10" => {
            call.arity(1, 1)?;
            let x = float(0)?;
            if x < 0.0 {
                return call.fail(domain_error(if call.method() == b"log2" { "log2" } else { "log10" }));
            }
            if call.method() == b"log2" {
                x.log2()
            } else {
                x.log10()
            }
        }
        b"atan2" => {
            call.arity(2, 2)?;
            float(0)?.atan2(float(1)?)
        }
        b"hypot" => {
            call.arity(2, 2)?;
            float(0)?.hypot(float(1)?)
        }
        _ => return Ok(None),
    };
    Ok(Some(Value::Float(value)))
}
