//! Tokens produced by the [lexer](crate::lexer).

use std::fmt;

use bstr::ByteSlice;
use nodemarshal::PatternFlags;
use num_bigint::BigInt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keyword {
    And,
    Begin,
    Break,
    Case,
    Class,
    Def,
    Do,
    Else,
    Elsif,
    End,
    Ensure,
    False,
    If,
    Module,
    Next,
    Nil,
    Not,
    Or,
    Rescue,
    Return,
    SelfRef,
    Super,
    Then,
    True,
    Unless,
    Until,
    When,
    While,
    Yield,
}

impl Keyword {
    pub fn from_bytes(word: &[u8]) -> Option<Self> {
        Some(match word {
            b"and" => Keyword::And,
            b"begin" => Keyword::Begin,
            b"break" => Keyword::Break,
            b"case" => Keyword::Case,
            b"class" => Keyword::Class,
            b"def" => Keyword::Def,
            b"do" => Keyword::Do,
            b"else" => Keyword::Else,
            b"elsif" => Keyword::Elsif,
            b"end" => Keyword::End,
            b"ensure" => Keyword::Ensure,
            b"false" => Keyword::False,
            b"if" => Keyword::If,
            b"module" => Keyword::Module,
            b"next" => Keyword::Next,
            b"nil" => Keyword::Nil,
            b"not" => Keyword::Not,
            b"or" => Keyword::Or,
            b"rescue" => Keyword::Rescue,
            b"return" => Keyword::Return,
            b"self" => Keyword::SelfRef,
            b"super" => Keyword::Super,
            b"then" => Keyword::Then,
            b"true" => Keyword::True,
            b"unless" => Keyword::Unless,
            b"until" => Keyword::Until,
            b"when" => Keyword::When,
            b"while" => Keyword::While,
            b"yield" => Keyword::Yield,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::And => "and",
            Keyword::Begin => "begin",
            Keyword::Break => "break",
            Keyword::Case => "case",
            Keyword::Class => "class",
            Keyword::Def => "def",
            Keyword::Do => "do",
            Keyword::Else => "else",
            Keyword::Elsif => "elsif",
            Keyword::End => "end",
            Keyword::Ensure => "ensure",
            Keyword::False => "false",
            Keyword::If => "if",
            Keyword::Module => "module",
            Keyword::Next => "next",
            Keyword::Nil => "nil",
            Keyword::Not => "not",
            Keyword::Or => "or",
            Keyword::Rescue => "rescue",
            Keyword::Return => "return",
            Keyword::SelfRef => "self",
            Keyword::Super => "super",
            Keyword::Then => "then",
            Keyword::True => "true",
            Keyword::Unless => "unless",
            Keyword::Until => "until",
            Keyword::When => "when",
            Keyword::While => "while",
            Keyword::Yield => "yield",
        }
    }
}

/// One piece of a double-quoted string.
#[derive(Clone, Debug, PartialEq)]
pub enum StrPart {
    Lit(Vec<u8>),
    /// The tokens of a `#{...}` interpolation, without the braces.
    Code(Vec<Spanned>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Int(BigInt),
    Float(f64),
    Str(Vec<StrPart>),
    /// `%w[...]` or, with `symbols` set, `%i[...]`.
    Words {
        symbols: bool,
        words: Vec<Vec<u8>>,
    },
    Sym(Vec<u8>),
    Regex(Vec<u8>, PatternFlags),

    Ident(Vec<u8>),
    Const(Vec<u8>),
    IVar(Vec<u8>),
    CVar(Vec<u8>),
    GVar(Vec<u8>),
    /// `name:` inside hash literals and argument lists.
    Label(Vec<u8>),
    Kw(Keyword),

    Plus,
    Minus,
    Star,
    Pow,
    Slash,
    Percent,
    Eq,
    EqEq,
    EqEqEq,
    NotEq,
    Match,
    NotMatch,
    Cmp,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    Amp,
    Pipe,
    Caret,
    Tilde,
    AndAnd,
    OrOr,
    Bang,
    /// `op=`, holding the operator without the `=`.
    OpAssign(&'static str),
    Dot,
    Dot2,
    Dot3,
    Colon,
    Colon2,
    Comma,
    Semi,
    Question,
    Arrow,
    Lambda,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    Newline,
    Eof,
}

impl Token {
    /// Whether the token can end an operand, which decides between
    /// division and a regex literal for a following `/`.
    pub fn ends_value(&self) -> bool {
        matches!(
            self,
            Token::Int(_)
                | Token::Float(_)
                | Token::Str(_)
                | Token::Words { .. }
                | Token::Sym(_)
                | Token::Regex(..)
                | Token::Ident(_)
                | Token::Const(_)
                | Token::IVar(_)
                | Token::CVar(_)
                | Token::GVar(_)
                | Token::RParen
                | Token::RBracket
                | Token::RBrace
                | Token::Kw(
                    Keyword::End | Keyword::SelfRef | Keyword::Nil | Keyword::True | Keyword::False
                )
        )
    }

    /// Whether a line ending in this token continues on the next one.
    pub fn continues_line(&self) -> bool {
        matches!(
            self,
            Token::Plus
                | Token::Minus
                | Token::Star
                | Token::Pow
                | Token::Slash
                | Token::Percent
                | Token::Eq
                | Token::EqEq
                | Token::EqEqEq
                | Token::NotEq
                | Token::Match
                | Token::NotMatch
                | Token::Cmp
                | Token::Lt
                | Token::Le
                | Token::Gt
                | Token::Ge
                | Token::Shl
                | Token::Shr
                | Token::Amp
                | Token::Caret
                | Token::Tilde
                | Token::AndAnd
                | Token::OrOr
                | Token::Bang
                | Token::OpAssign(_)
                | Token::Dot
                | Token::Dot2
                | Token::Dot3
                | Token::Colon
                | Token::Colon2
                | Token::Comma
                | Token::Question
                | Token::Arrow
                | Token::Lambda
                | Token::Label(_)
                | Token::LParen
                | Token::LBracket
                | Token::LBrace
                | Token::Kw(Keyword::And | Keyword::Or | Keyword::Not)
        )
    }

    /// Punctuation spelling for operators that double as method names.
    pub fn operator_name(&self) -> Option<&'static str> {
        Some(match self {
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Pow => "**",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::EqEq => "==",
            Token::EqEqEq => "===",
            Token::NotEq => "!=",
            Token::Match => "=~",
            Token::Cmp => "<=>",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            Token::Shl => "<<",
            Token::Shr => ">>",
            Token::Amp => "&",
            Token::Pipe => "|",
            Token::Caret => "^",
            Token::Tilde => "~",
            Token::Bang => "!",
            _ => return None,
        })
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Int(n) => write!(f, "integer {n}"),
            Token::Float(x) => write!(f, "float {x}"),
            Token::Str(_) => f.write_str("string literal"),
            Token::Words { .. } => f.write_str("word list"),
            Token::Sym(s) => write!(f, "symbol :{}", s.as_bstr()),
            Token::Regex(..) => f.write_str("regexp literal"),
            Token::Ident(s) | Token::Const(s) => write!(f, "'{}'", s.as_bstr()),
            Token::IVar(s) => write!(f, "'@{}'", s.as_bstr()),
            Token::CVar(s) => write!(f, "'@@{}'", s.as_bstr()),
            Token::GVar(s) => write!(f, "'${}'", s.as_bstr()),
            Token::Label(s) => write!(f, "label '{}:'", s.as_bstr()),
            Token::Kw(k) => write!(f, "'{}'", k.as_str()),
            Token::OpAssign(op) => write!(f, "'{op}='"),
            Token::Newline => f.write_str("end of line"),
            Token::Eof => f.write_str("end of input"),
            other => {
                let text = match other {
                    Token::Eq => "=",
                    Token::NotMatch => "!~",
                    Token::AndAnd => "&&",
                    Token::OrOr => "||",
                    Token::Dot => ".",
                    Token::Dot2 => "..",
                    Token::Dot3 => "...",
                    Token::Colon => ":",
                    Token::Colon2 => "::",
                    Token::Comma => ",",
                    Token::Semi => ";",
                    Token::Question => "?",
                    Token::Arrow => "=>",
                    Token::Lambda => "->",
                    Token::LParen => "(",
                    Token::RParen => ")",
                    Token::LBracket => "[",
                    Token::RBracket => "]",
                    Token::LBrace => "{",
                    Token::RBrace => "}",
                    op => op.operator_name().unwrap_or("?"),
                };
                write!(f, "'{text}'")
            }
        }
    }
}

/// A token with the position of its first byte.
#[derive(Clone, Debug, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
    pub column: usize,
    /// Whitespace or a comment precedes the token on its line.
    pub space_before: bool,
}
