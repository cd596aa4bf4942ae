use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use bstr::{BStr, BString};
use num_bigint::BigInt;

use super::kind::PayloadKind;

/// An interned method, variable or constant name.
///
/// Names are byte strings, as the source language does not
/// guarantee that they are valid UTF-8. Cloning is cheap, and
/// equality is by value: two symbols with the same bytes are the
/// same symbol, whether or not they share an allocation.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(Arc<[u8]>);

impl Symbol {
    pub fn new(name: impl AsRef<[u8]>) -> Self {
        Symbol(Arc::from(name.as_ref()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn as_bstr(&self) -> &BStr {
        BStr::new(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether both symbols point at the same allocation.
    pub fn ptr_eq(&self, other: &Symbol) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.as_bstr())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.as_bstr(), f)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Symbol::new(value)
    }
}

impl From<&[u8]> for Symbol {
    fn from(value: &[u8]) -> Self {
        Symbol::new(value)
    }
}

impl PartialEq<str> for Symbol {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<&str> for Symbol {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

/// Where a named binding lives. Resolution to an actual slot is left
/// to the evaluator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ScopeKind {
    Local = 0,
    Instance = 1,
    Class = 2,
    Global = 3,
    Constant = 4,
}

impl ScopeKind {
    pub fn from_u8(x: u8) -> Option<Self> {
        Some(match x {
            0 => ScopeKind::Local,
            1 => ScopeKind::Instance,
            2 => ScopeKind::Class,
            3 => ScopeKind::Global,
            4 => ScopeKind::Constant,
            _ => return None,
        })
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// The prefix used for bindings of this kind in source code.
    pub fn sigil(self) -> &'static str {
        match self {
            ScopeKind::Local | ScopeKind::Constant => "",
            ScopeKind::Instance => "@",
            ScopeKind::Class => "@@",
            ScopeKind::Global => "$",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ScopeKind::Local => "local",
            ScopeKind::Instance => "instance",
            ScopeKind::Class => "class",
            ScopeKind::Global => "global",
            ScopeKind::Constant => "constant",
        }
    }
}

bitflags! {
    /// Options of a pattern literal.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PatternFlags: u32 {
        const IGNORECASE = 1;
        const EXTENDED = 1 << 1;
        const MULTILINE = 1 << 2;
        /// Interpolated pattern compiled only on first evaluation.
        const ONCE = 1 << 3;
    }
}

/// Literal data attached to a node. Which variant a node carries is
/// determined by its tag, see [super::NodeKind::payload_kind].
#[derive(Clone, Debug)]
pub enum Payload {
    None,
    Integer(BigInt),
    Float(f64),
    Bytes(BString),
    Symbol(Symbol),
    Pattern { source: BString, flags: PatternFlags },
    Binding { scope: ScopeKind, name: Symbol },
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::None => PayloadKind::None,
            Payload::Integer(_) => PayloadKind::Integer,
            Payload::Float(_) => PayloadKind::Float,
            Payload::Bytes(_) => PayloadKind::Bytes,
            Payload::Symbol(_) => PayloadKind::Symbol,
            Payload::Pattern { .. } => PayloadKind::Pattern,
            Payload::Binding { .. } => PayloadKind::Binding,
        }
    }

    pub fn as_integer(&self) -> Option<&BigInt> {
        match self {
            Payload::Integer(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Payload::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&BStr> {
        match self {
            Payload::Bytes(b) => Some(b.as_ref()),
            _ => None,
        }
    }

    /// The symbol of a `Symbol` payload, or the name of a `Binding`.
    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Payload::Symbol(s) | Payload::Binding { name: s, .. } => Some(s),
            _ => None,
        }
    }

    pub fn as_binding(&self) -> Option<(ScopeKind, &Symbol)> {
        match self {
            Payload::Binding { scope, name } => Some((*scope, name)),
            _ => None,
        }
    }
}

/// Floats compare by bit pattern, so that NaN payloads and the sign
/// of zero survive round trip checks.
impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Payload::None, Payload::None) => true,
            (Payload::Integer(a), Payload::Integer(b)) => a == b,
            (Payload::Float(a), Payload::Float(b)) => a.to_bits() == b.to_bits(),
            (Payload::Bytes(a), Payload::Bytes(b)) => a == b,
            (Payload::Symbol(a), Payload::Symbol(b)) => a == b,
            (
                Payload::Pattern {
                    source: a,
                    flags: fa,
                },
                Payload::Pattern {
                    source: b,
                    flags: fb,
                },
            ) => a == b && fa == fb,
            (
                Payload::Binding {
                    scope: sa,
                    name: na,
                },
                Payload::Binding {
                    scope: sb,
                    name: nb,
                },
            ) => sa == sb && na == nb,
            _ => false,
        }
    }
}
