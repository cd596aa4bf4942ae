//! Insertion ordered hashes.
use std::fmt::{self, Display};

use bstr::BString;
use nodemarshal::Symbol;
use num_bigint::BigInt;
use rustc_hash::FxHashMap;

use super::{Class, Value};
use crate::errors::ErrorKind;

/// The part of a value that decides which hash slot it addresses.
/// Two keys are the same if they are `eql?`, so `1` and `1.0` differ.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum HashKey {
    Nil,
    Bool(bool),
    Integer(BigInt),
    Float(u64),
    String(BString),
    Symbol(Symbol),
    Array(Vec<HashKey>),
    Class(Class),
}

impl HashKey {
    pub fn of(value: &Value) -> Result<Self, ErrorKind> {
        Ok(match value {
            Value::Nil => HashKey::Nil,
            Value::Bool(b) => HashKey::Bool(*b),
            Value::Integer(n) => HashKey::Integer(n.clone()),
            // 0.0 and -0.0 are the same key
            Value::Float(x) if *x == 0.0 => HashKey::Float(0),
            Value::Float(x) => HashKey::Float(x.to_bits()),
            Value::String(s) => HashKey::String(s.as_ref().clone()),
            Value::Symbol(s) => HashKey::Symbol(s.clone()),
            Value::Array(elements) => HashKey::Array(
                elements
                    .borrow()
                    .iter()
                    .map(HashKey::of)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Class(c) => HashKey::Class(*c),
            other => {
                return Err(ErrorKind::TypeError {
                    expected: "hash key",
                    actual: other.type_of(),
                })
            }
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct RubyHash {
    entries: Vec<(Value, Value)>,
    index: FxHashMap<HashKey, usize>,
}

impl RubyHash {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> Result<Option<&Value>, ErrorKind> {
        let key = HashKey::of(key)?;
        Ok(self.index.get(&key).map(|&i| &self.entries[i].1))
    }

    /// Set `key` to `value`. An existing key keeps its position.
    pub fn insert(&mut self, key: Value, value: Value) -> Result<(), ErrorKind> {
        let hashed = HashKey::of(&key)?;
        match self.index.get(&hashed) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(hashed, self.entries.len());
                self.entries.push((key, value));
            }
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &Value) -> Result<Option<Value>, ErrorKind> {
        let Some(i) = self.index.remove(&HashKey::of(key)?) else {
            return Ok(None);
        };
        let (_, value) = self.entries.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Ok(Some(value))
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Value, Value)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }
}

/// Order does not matter for equality.
impl PartialEq for RubyHash {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.entries.iter().all(|(key, value)| {
                matches!(other.get(key), Ok(Some(theirs)) if theirs == value)
            })
    }
}

impl RubyHash {
    pub(super) fn fmt_nested(&self, f: &mut fmt::Formatter<'_>, seen: &mut Vec<*const ()>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            key.fmt_nested(f, seen)?;
            f.write_str("=>")?;
            value.fmt_nested(f, seen)?;
        }
        f.write_str("}")
    }
}

impl Display for RubyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_nested(f, &mut Vec::new())
    }
}
