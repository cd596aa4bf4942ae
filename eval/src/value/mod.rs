//! Runtime representation of values.
//!
//! Arrays and hashes are shared mutable containers, so that a method
//! like `select!` is visible through every reference to the same
//! array. Everything else is immutable once created.

use std::cell::RefCell;
use std::fmt::{self, Display};
use std::rc::Rc;

use bstr::{BString, ByteSlice};
use nodemarshal::Symbol;
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};

use crate::errors::ErrorKind;

mod hash;
mod proc;
mod regexp;

pub use hash::{HashKey, RubyHash};
pub use proc::{Proc, ProcBody};
pub use regexp::Regexp;

/// The built-in classes values can belong to. User-defined classes
/// are not evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Class {
    Object,
    NilClass,
    TrueClass,
    FalseClass,
    Integer,
    Float,
    String,
    Symbol,
    Array,
    Hash,
    Range,
    Proc,
    Regexp,
    Class,
    Math,
}

impl Class {
    pub fn name(self) -> &'static str {
        match self {
            Class::Object => "Object",
            Class::NilClass => "NilClass",
            Class::TrueClass => "TrueClass",
            Class::FalseClass => "FalseClass",
            Class::Integer => "Integer",
            Class::Float => "Float",
            Class::String => "String",
            Class::Symbol => "Symbol",
            Class::Array => "Array",
            Class::Hash => "Hash",
            Class::Range => "Range",
            Class::Proc => "Proc",
            Class::Regexp => "Regexp",
            Class::Class => "Class",
            Class::Math => "Math",
        }
    }

    /// The class a top-level constant refers to, if it is built in.
    pub fn from_constant(name: &[u8]) -> Option<Self> {
        Some(match name {
            b"Object" => Class::Object,
            b"NilClass" => Class::NilClass,
            b"TrueClass" => Class::TrueClass,
            b"FalseClass" => Class::FalseClass,
            b"Integer" => Class::Integer,
            b"Float" => Class::Float,
            b"String" => Class::String,
            b"Symbol" => Class::Symbol,
            b"Array" => Class::Array,
            b"Hash" => Class::Hash,
            b"Range" => Class::Range,
            b"Proc" => Class::Proc,
            b"Regexp" => Class::Regexp,
            b"Class" => Class::Class,
            b"Math" => Class::Math,
            _ => return None,
        })
    }

    /// Whether instances of `self` are also instances of `other`.
    pub fn is_a(self, other: Class) -> bool {
        self == other || other == Class::Object
    }
}

/// Inclusive or exclusive range between two values.
#[derive(Clone, Debug, PartialEq)]
pub struct Range {
    pub start: Value,
    pub end: Value,
    pub exclusive: bool,
}

impl Range {
    /// Integer bounds of the range, with `end` already made exclusive.
    pub fn int_bounds(&self) -> Result<(BigInt, BigInt), ErrorKind> {
        let start = self.start.to_int()?;
        let mut end = self.end.to_int()?;
        if !self.exclusive {
            end += 1;
        }
        Ok((start, end))
    }

    pub fn contains(&self, value: &Value) -> Result<bool, ErrorKind> {
        let (Some(low), Some(high)) = (
            value.compare(&self.start)?,
            value.compare(&self.end)?,
        ) else {
            return Ok(false);
        };
        Ok(low.is_ge() && if self.exclusive { high.is_lt() } else { high.is_le() })
    }
}

#[derive(Clone, Debug)]
pub enum Value {
    Nil,
    Bool(bool),
    Integer(BigInt),
    Float(f64),
    String(Rc<BString>),
    Symbol(Symbol),
    Array(Rc<RefCell<Vec<Value>>>),
    Hash(Rc<RefCell<RubyHash>>),
    Range(Rc<Range>),
    Proc(Rc<Proc>),
    Regexp(Rc<Regexp>),
    Class(Class),
    /// The top-level `self`.
    Main,
}

impl Value {
    pub fn string(bytes: impl Into<BString>) -> Self {
        Value::String(Rc::new(bytes.into()))
    }

    pub fn array(elements: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(elements)))
    }

    pub fn hash(hash: RubyHash) -> Self {
        Value::Hash(Rc::new(RefCell::new(hash)))
    }

    pub fn int(n: impl Into<BigInt>) -> Self {
        Value::Integer(n.into())
    }

    pub fn class(&self) -> Class {
        match self {
            Value::Nil => Class::NilClass,
            Value::Bool(true) => Class::TrueClass,
            Value::Bool(false) => Class::FalseClass,
            Value::Integer(_) => Class::Integer,
            Value::Float(_) => Class::Float,
            Value::String(_) => Class::String,
            Value::Symbol(_) => Class::Symbol,
            Value::Array(_) => Class::Array,
            Value::Hash(_) => Class::Hash,
            Value::Range(_) => Class::Range,
            Value::Proc(_) => Class::Proc,
            Value::Regexp(_) => Class::Regexp,
            Value::Class(_) => Class::Class,
            Value::Main => Class::Object,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(true) => "true",
            Value::Bool(false) => "false",
            other => other.class().name(),
        }
    }

    /// Everything except `nil` and `false` is true.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    pub fn to_int(&self) -> Result<BigInt, ErrorKind> {
        match self {
            Value::Integer(n) => Ok(n.clone()),
            other => Err(ErrorKind::TypeError {
                expected: "Integer",
                actual: other.type_of(),
            }),
        }
    }

    /// An integer argument that has to fit a machine word, such as a
    /// count or an index.
    pub fn to_i64(&self) -> Result<i64, ErrorKind> {
        match self {
            Value::Integer(n) => n
                .to_i64()
                .ok_or_else(|| ErrorKind::Argument(format!("integer {n} too big to convert"))),
            Value::Float(x) if x.is_finite() => Ok(x.trunc() as i64),
            other => Err(ErrorKind::TypeError {
                expected: "Integer",
                actual: other.type_of(),
            }),
        }
    }

    pub fn to_f64(&self) -> Result<f64, ErrorKind> {
        match self {
            Value::Integer(n) => Ok(n.to_f64().unwrap_or(f64::NAN)),
            Value::Float(x) => Ok(*x),
            other => Err(ErrorKind::TypeError {
                expected: "Float",
                actual: other.type_of(),
            }),
        }
    }

    pub fn to_bytes(&self) -> Result<Rc<BString>, ErrorKind> {
        match self {
            Value::String(s) => Ok(s.clone()),
            other => Err(ErrorKind::TypeError {
                expected: "String",
                actual: other.type_of(),
            }),
        }
    }

    /// The result of `to_s`, as used by `puts` and interpolation.
    pub fn to_s(&self) -> BString {
        match self {
            Value::Nil => BString::default(),
            Value::String(s) => s.as_ref().clone(),
            Value::Symbol(s) => s.as_bytes().into(),
            Value::Main => "main".into(),
            other => other.to_string().into(),
        }
    }

    /// Ordering for `<=>` and the comparison operators. `None` means
    /// the values are not comparable with each other.
    pub fn compare(&self, other: &Value) -> Result<Option<std::cmp::Ordering>, ErrorKind> {
        Ok(match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Float(_) | Value::Integer(_), Value::Float(_) | Value::Integer(_)) => {
                self.to_f64()?.partial_cmp(&other.to_f64()?)
            }
            (Value::String(a), Value::String(b)) => Some(a.as_slice().cmp(b.as_slice())),
            (Value::Symbol(a), Value::Symbol(b)) => Some(a.cmp(b)),
            (Value::Array(a), Value::Array(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y)? {
                        Some(std::cmp::Ordering::Equal) => continue,
                        other => return Ok(other),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        })
    }

    /// `eql?`: like `==` but without numeric conversion.
    pub fn eql(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(_), Value::Float(_)) | (Value::Float(_), Value::Integer(_)) => false,
            _ => self == other,
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Value::Integer(n) => n.is_zero(),
            Value::Float(x) => *x == 0.0,
            _ => false,
        }
    }
}

/// Ruby `==`.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) | (Value::Main, Value::Main) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                a.to_f64() == Some(*b)
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Hash(a), Value::Hash(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Range(a), Value::Range(b)) => a == b,
            (Value::Proc(a), Value::Proc(b)) => Rc::ptr_eq(a, b),
            (Value::Regexp(a), Value::Regexp(b)) => a == b,
            (Value::Class(a), Value::Class(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<BigInt> for Value {
    fn from(value: BigInt) -> Self {
        Value::Integer(value)
    }
}

impl From<Option<Value>> for Value {
    fn from(value: Option<Value>) -> Self {
        value.unwrap_or(Value::Nil)
    }
}

fn fmt_float(x: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if x.is_nan() {
        return f.write_str("NaN");
    }
    if x.is_infinite() {
        return f.write_str(if x > 0.0 { "Infinity" } else { "-Infinity" });
    }

    let magnitude = x.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        // 1.0e+20, 2.5e-05
        let text = format!("{x:e}");
        let (mantissa, exponent) = text.split_once('e').unwrap_or((&text, "0"));
        let (sign, digits) = match exponent.strip_prefix('-') {
            Some(digits) => ('-', digits),
            None => ('+', exponent),
        };
        let point = if mantissa.contains('.') { "" } else { ".0" };
        return write!(f, "{mantissa}{point}e{sign}{digits:0>2}");
    }

    if x.fract() == 0.0 {
        write!(f, "{x:.1}")
    } else {
        write!(f, "{x}")
    }
}

/// Bytes of a string literal as `inspect` shows them.
fn fmt_string(bytes: &[u8], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("\"")?;
    for chunk in bytes.utf8_chunks() {
        for c in chunk.valid().chars() {
            match c {
                '"' => f.write_str("\\\"")?,
                '\\' => f.write_str("\\\\")?,
                '\n' => f.write_str("\\n")?,
                '\t' => f.write_str("\\t")?,
                '\r' => f.write_str("\\r")?,
                '\x1b' => f.write_str("\\e")?,
                c if c.is_control() => write!(f, "\\x{:02X}", c as u32)?,
                c => write!(f, "{c}")?,
            }
        }
        for b in chunk.invalid() {
            write!(f, "\\x{b:02X}")?;
        }
    }
    f.write_str("\"")
}

fn fmt_symbol(name: &[u8], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let plain = name.first().is_some_and(|c| c.is_ascii_alphabetic() || *c == b'_')
        && name
            .iter()
            .enumerate()
            .all(|(i, c)| c.is_ascii_alphanumeric() || *c == b'_' || (i + 1 == name.len() && matches!(c, b'?' | b'!' | b'=')));
    let operator = matches!(
        name,
        b"+" | b"-"
            | b"*"
            | b"/"
            | b"%"
            | b"**"
            | b"=="
            | b"==="
            | b"!="
            | b"=~"
            | b"<=>"
            | b"<"
            | b"<="
            | b">"
            | b">="
            | b"<<"
            | b">>"
            | b"&"
            | b"|"
            | b"^"
            | b"~"
            | b"!"
            | b"[]"
            | b"[]="
            | b"-@"
            | b"+@"
    );
    if plain || operator {
        write!(f, ":{}", name.as_bstr())
    } else {
        f.write_str(":")?;
        fmt_string(name, f)
    }
}

impl Value {
    /// `inspect` of a container, printing `[...]` or `{...}` for one
    /// that is already being printed further out.
    pub(crate) fn fmt_nested(&self, f: &mut fmt::Formatter<'_>, seen: &mut Vec<*const ()>) -> fmt::Result {
        match self {
            Value::Array(elements) => {
                let ptr = Rc::as_ptr(elements) as *const ();
                if seen.contains(&ptr) {
                    return f.write_str("[...]");
                }
                seen.push(ptr);
                f.write_str("[")?;
                for (i, v) in elements.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    v.fmt_nested(f, seen)?;
                }
                seen.pop();
                f.write_str("]")
            }
            Value::Hash(hash) => {
                let ptr = Rc::as_ptr(hash) as *const ();
                if seen.contains(&ptr) {
                    return f.write_str("{...}");
                }
                seen.push(ptr);
                hash.borrow().fmt_nested(f, seen)?;
                seen.pop();
                Ok(())
            }
            other => other.fmt(f),
        }
    }
}

/// `inspect`.
impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(x) => fmt_float(*x, f),
            Value::String(s) => fmt_string(s, f),
            Value::Symbol(s) => fmt_symbol(s.as_bytes(), f),
            Value::Array(_) | Value::Hash(_) => self.fmt_nested(f, &mut Vec::new()),
            Value::Range(r) => {
                write!(f, "{}{}{}", r.start, if r.exclusive { "..." } else { ".." }, r.end)
            }
            Value::Proc(p) => p.fmt(f),
            Value::Regexp(r) => r.fmt(f),
            Value::Class(c) => f.write_str(c.name()),
            Value::Main => f.write_str("main"),
        }
    }
}

#[cfg(test)]
mod tests {
    use bstr::BString;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::{RubyHash, Value};

    #[rstest]
    #[case::whole(1.0, "1.0")]
    #[case::fraction(0.5, "0.5")]
    #[case::negative(-2.25, "-2.25")]
    #[case::large(1e20, "1.0e+20")]
    #[case::small(2.5e-5, "2.5e-05")]
    #[case::nan(f64::NAN, "NaN")]
    #[case::infinity(f64::NEG_INFINITY, "-Infinity")]
    fn floats(#[case] x: f64, #[case] expected: &str) {
        assert_eq!(expected, Value::Float(x).to_string());
    }

    #[rstest]
    #[case::plain(b"abc", "\"abc\"")]
    #[case::escapes(b"a\"b\\\n", "\"a\\\"b\\\\\\n\"")]
    #[case::invalid_utf8(b"\xff!", "\"\\xFF!\"")]
    fn strings(#[case] bytes: &[u8], #[case] expected: &str) {
        assert_eq!(expected, Value::string(bytes).to_string());
    }

    #[test]
    fn containers() {
        let mut hash = RubyHash::default();
        hash.insert(Value::Symbol("a".into()), Value::int(1)).unwrap();
        hash.insert(Value::string("b"), Value::array(vec![Value::Nil, Value::Bool(true)]))
            .unwrap();
        assert_eq!(
            "{:a=>1, \"b\"=>[nil, true]}",
            Value::hash(hash).to_string()
        );
        assert_eq!(":\"with space\"", Value::Symbol("with space".into()).to_string());
        assert_eq!(":[]=", Value::Symbol("[]=".into()).to_string());
    }

    #[test]
    fn numeric_equality() {
        assert_eq!(Value::int(1), Value::Float(1.0));
        assert!(!Value::int(1).eql(&Value::Float(1.0)));
        assert_ne!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_eq!(
            Value::array(vec![Value::int(2), Value::string("x")]),
            Value::array(vec![Value::Float(2.0), Value::string(BString::from("x"))])
        );
    }

    #[test]
    fn recursive_containers() {
        let array = Value::array(vec![Value::int(1)]);
        if let Value::Array(elements) = &array {
            elements.borrow_mut().push(array.clone());
            elements.borrow_mut().push(Value::array(vec![array.clone()]));
        }
        assert_eq!("[1, [...], [[...]]]", array.to_string());

        let hash = Value::hash(RubyHash::default());
        if let Value::Hash(h) = &hash {
            h.borrow_mut().insert(Value::Symbol("me".into()), hash.clone()).unwrap();
        }
        assert_eq!("{:me=>{...}}", hash.to_string());
        assert_eq!("[{:me=>{...}}]", Value::array(vec![hash.clone()]).to_string());
    }

    #[test]
    fn to_s() {
        assert_eq!("", Value::Nil.to_s());
        assert_eq!("sym", Value::Symbol("sym".into()).to_s());
        assert_eq!("[1, \"a\"]", Value::array(vec![Value::int(1), Value::string("a")]).to_s());
    }
}
