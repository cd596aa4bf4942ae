//! The closed set of node tags understood by this version of the
//! wire format.
//!
//! Every tag has a fixed wire byte, a payload kind and a child arity.
//! The table below is the single source of truth for all three; the
//! encoder and decoder consult it instead of matching on tags
//! themselves.

use std::fmt;

/// Number of children a node of a given [NodeKind] may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    /// Inclusive on both ends.
    Between(usize, usize),
    AtLeast(usize),
    /// Any even number of children, read as key/value pairs.
    Pairs,
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exact(n) => count == n,
            Arity::Between(min, max) => (min..=max).contains(&count),
            Arity::AtLeast(min) => count >= min,
            Arity::Pairs => count % 2 == 0,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "exactly {n}"),
            Arity::Between(min, max) => write!(f, "{min} to {max}"),
            Arity::AtLeast(0) => f.write_str("any number of"),
            Arity::AtLeast(min) => write!(f, "at least {min}"),
            Arity::Pairs => f.write_str("an even number of"),
        }
    }
}

/// Shape of the literal data attached to a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadKind {
    None,
    Integer,
    Float,
    Bytes,
    Symbol,
    Pattern,
    Binding,
}

/// Tag groups. These are informational only, consumers switch on
/// [NodeKind] directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    Literal,
    Container,
    Reference,
    Control,
    Definition,
    Call,
}

/// Generate [NodeKind] together with its lookup functions.
///
/// Distinct wire bytes are enforced by the compiler through the
/// `#[repr(u8)]` discriminants.
macro_rules! node_kinds {
    (
        $(
            $(#[doc = $doc:expr])*
            $Var:ident = $tag:literal, $name:literal, $cat:ident, $payload:ident, $arity:expr;
        )+
    ) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum NodeKind {
            $(
                $(#[doc = $doc])*
                $Var = $tag,
            )+
        }

        impl NodeKind {
            /// All tags, in wire byte order.
            pub const ALL: &'static [NodeKind] = &[$(NodeKind::$Var),+];

            /// Convert a wire byte into the corresponding tag.
            #[inline(always)]
            pub fn from_u8(x: u8) -> Option<Self> {
                match x {
                    $($tag => Some(Self::$Var),)+
                    _ => None,
                }
            }

            #[inline(always)]
            pub fn as_u8(self) -> u8 {
                self as u8
            }

            /// Stable lowercase name, used in diagnostics and dumps.
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$Var => $name,)+
                }
            }

            pub fn category(self) -> Category {
                match self {
                    $(Self::$Var => Category::$cat,)+
                }
            }

            pub fn payload_kind(self) -> PayloadKind {
                match self {
                    $(Self::$Var => PayloadKind::$payload,)+
                }
            }

            pub fn arity(self) -> Arity {
                match self {
                    $(Self::$Var => $arity,)+
                }
            }
        }
    };
}

node_kinds! {
    Nil = 0, "nil", Literal, None, Arity::Exact(0);
    True = 1, "true", Literal, None, Arity::Exact(0);
    False = 2, "false", Literal, None, Arity::Exact(0);
    SelfRef = 3, "self", Literal, None, Arity::Exact(0);
    Integer = 4, "integer", Literal, Integer, Arity::Exact(0);
    Float = 5, "float", Literal, Float, Arity::Exact(0);
    /// Literal string. The payload is raw bytes and need not be UTF-8.
    Str = 6, "str", Literal, Bytes, Arity::Exact(0);
    Sym = 7, "sym", Literal, Symbol, Arity::Exact(0);
    Regex = 8, "regex", Literal, Pattern, Arity::Exact(0);

    Array = 9, "array", Container, None, Arity::AtLeast(0);
    /// Hash literal, children alternate between keys and values.
    Hash = 10, "hash", Container, None, Arity::Pairs;
    /// Interpolated string; children are `Str` and `EvStr` fragments.
    DStr = 11, "dstr", Container, None, Arity::AtLeast(0);
    /// A single interpolated expression inside a `DStr`.
    EvStr = 12, "evstr", Container, None, Arity::Exact(1);
    /// Argument list of a call.
    Args = 13, "args", Container, None, Arity::AtLeast(0);
    /// Statements evaluated in order, yielding the last value.
    Sequence = 14, "sequence", Container, None, Arity::AtLeast(0);

    Var = 15, "var", Reference, Binding, Arity::Exact(0);
    Assign = 16, "assign", Reference, Binding, Arity::Exact(1);
    /// `Scope::Name` lookup; the child is the scope expression.
    ScopedConst = 17, "scoped_const", Reference, Symbol, Arity::Exact(1);

    /// `cond, then[, else]`
    If = 18, "if", Control, None, Arity::Between(2, 3);
    Ternary = 19, "ternary", Control, None, Arity::Exact(3);
    While = 20, "while", Control, None, Arity::Exact(2);
    Until = 21, "until", Control, None, Arity::Exact(2);
    And = 22, "and", Control, None, Arity::Exact(2);
    Or = 23, "or", Control, None, Arity::Exact(2);
    Not = 24, "not", Control, None, Arity::Exact(1);
    /// `read ||= write`: evaluates `write` only if `read` is nil or false.
    OrAssign = 25, "or_assign", Control, None, Arity::Exact(2);
    /// `read &&= write`: evaluates `write` only if `read` is truthy.
    AndAssign = 26, "and_assign", Control, None, Arity::Exact(2);
    /// `subject, when*[, else]`
    Case = 27, "case", Control, None, Arity::AtLeast(1);
    /// `patterns, body`; the patterns child is an `Array`.
    When = 28, "when", Control, None, Arity::Exact(2);
    Return = 29, "return", Control, None, Arity::Between(0, 1);
    Break = 30, "break", Control, None, Arity::Between(0, 1);
    Next = 31, "next", Control, None, Arity::Between(0, 1);
    RangeIncl = 32, "range_incl", Control, None, Arity::Exact(2);
    RangeExcl = 33, "range_excl", Control, None, Arity::Exact(2);

    /// `params, body`
    Def = 34, "def", Definition, Symbol, Arity::Exact(2);
    /// `[superclass, ]body`
    Class = 35, "class", Definition, Symbol, Arity::Between(1, 2);
    /// Closure literal: `params, body`. Captures the enclosing scope
    /// by reference.
    Block = 36, "block", Definition, None, Arity::Exact(2);
    Params = 37, "params", Definition, None, Arity::AtLeast(0);
    /// A named parameter with an optional default value.
    Param = 38, "param", Definition, Symbol, Arity::Between(0, 1);

    /// `receiver, args[, block]`
    Call = 39, "call", Call, Symbol, Arity::Between(2, 3);
    /// Call without an explicit receiver: `args[, block]`
    FCall = 40, "fcall", Call, Symbol, Arity::Between(1, 2);
    Yield = 41, "yield", Call, None, Arity::AtLeast(0);
    /// `&expr` passed in the block slot of a call.
    BlockPass = 42, "block_pass", Call, None, Arity::Exact(1);
    Super = 43, "super", Call, None, Arity::AtLeast(0);
    /// `super` without an argument list, forwarding the current ones.
    ZSuper = 44, "zsuper", Call, None, Arity::Exact(0);
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
