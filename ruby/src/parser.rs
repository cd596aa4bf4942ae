//! Recursive descent over the token stream, building the graph as it
//! goes.
//!
//! Operator precedence follows Ruby, from loosest to tightest:
//! statement modifiers, `and`/`or`, `not`, assignment, `?:`, ranges,
//! `||`, `&&`, equality and matching, comparisons, `|`/`^`, `&`,
//! shifts, `+`/`-`, `*`/`/`/`%`, unary minus, `**`, `!`/`~`, and
//! finally method calls and indexing.

use nodemarshal::{Graph, GraphBuilder, NodeId, NodeKind, Payload, ScopeKind, Symbol};
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::errors::SyntaxError;
use crate::lexer::tokenize;
use crate::token::{Keyword, Spanned, StrPart, Token};

/// Deepest recursion through the expression grammar accepted before
/// giving up. Every parenthesis, bracket, block or operand nests a few
/// levels.
const MAX_DEPTH: usize = 256;

/// Parse a whole program. The root of the result is a `Sequence` of
/// its top-level statements.
pub fn parse(src: &[u8]) -> Result<Graph, SyntaxError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser::new(tokens);
    let root = parser.program()?;
    debug!(nodes = parser.builder.len(), "parsed program");

    parser
        .builder
        .finish(root)
        .map_err(|e| SyntaxError::new(1, 1, format!("malformed tree: {e}")))
}

/// Local variable names known at some point of the program.
struct Scope {
    locals: FxHashSet<Vec<u8>>,
    /// Block bodies see the locals around them, method and class
    /// bodies do not.
    transparent: bool,
}

/// Where an assignment stores its value.
enum Target {
    Local(Vec<u8>),
    Binding(ScopeKind, Symbol),
    Index { receiver: NodeId, index: Vec<NodeId> },
    Attr { receiver: NodeId, name: Symbol },
}

/// Arguments collected for a call, before they become an `Args` node.
#[derive(Default)]
struct CallArgs {
    args: Vec<NodeId>,
    /// Trailing `key => value` and `key: value` pairs, passed as one
    /// hash.
    pairs: Vec<NodeId>,
    block: Option<NodeId>,
}

impl CallArgs {
    fn into_nodes(self, builder: &mut GraphBuilder) -> Vec<NodeId> {
        let mut args = self.args;
        if !self.pairs.is_empty() {
            args.push(builder.node(NodeKind::Hash, self.pairs, Payload::None));
        }
        args
    }
}

fn is_local_name(name: &[u8]) -> bool {
    match name.first() {
        Some(c) if c.is_ascii_lowercase() || *c == b'_' || *c >= 0x80 => {}
        _ => return false,
    }
    !matches!(name.last(), Some(b'?' | b'!'))
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    builder: GraphBuilder,
    scopes: Vec<Scope>,
    /// Set while a `do` belongs to an enclosing construct, such as the
    /// condition of `while` or the arguments of a command call.
    no_do: bool,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>) -> Self {
        Parser {
            tokens,
            pos: 0,
            builder: GraphBuilder::new(),
            scopes: vec![Scope {
                locals: FxHashSet::default(),
                transparent: false,
            }],
            no_do: false,
            depth: 0,
        }
    }

    /// Run `parse` one level deeper in the grammar.
    fn nested<T>(&mut self, parse: fn(&mut Self) -> Result<T, SyntaxError>) -> Result<T, SyntaxError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn current(&self) -> &Spanned {
        &self.tokens[self.pos]
    }

    fn peek(&self) -> &Token {
        &self.current().token
    }

    fn peek_nth(&self, n: usize) -> &Spanned {
        // the stream always ends in Eof
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)]
    }

    fn at(&self, token: &Token) -> bool {
        self.peek() == token
    }

    /// Take the current token, leaving [Token::Eof] in its slot.
    fn advance(&mut self) -> Token {
        let token = std::mem::replace(&mut self.tokens[self.pos].token, Token::Eof);
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.at(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), SyntaxError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("unexpected {}, expecting {token}", self.peek())))
        }
    }

    /// Name carried by the current token, which is consumed.
    fn take_name(&mut self) -> Vec<u8> {
        match self.advance() {
            Token::Ident(name) | Token::Const(name) | Token::Label(name) => name,
            _ => Vec::new(),
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        let at = self.current();
        SyntaxError::new(at.line, at.column, message)
    }

    fn unexpected(&self) -> SyntaxError {
        self.error(format!("unexpected {}", self.peek()))
    }

    fn skip_newlines(&mut self) {
        while self.at(&Token::Newline) {
            self.advance();
        }
    }

    fn skip_terms(&mut self) {
        while matches!(self.peek(), Token::Newline | Token::Semi) {
            self.advance();
        }
    }

    /// An argument list in parentheses starts right here, with no
    /// space before it.
    fn paren_follows(&self, n: usize) -> bool {
        let next = self.peek_nth(n);
        next.token == Token::LParen && !next.space_before
    }

    fn push_scope(&mut self, transparent: bool) {
        self.scopes.push(Scope {
            locals: FxHashSet::default(),
            transparent,
        });
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn is_local(&self, name: &[u8]) -> bool {
        for scope in self.scopes.iter().rev() {
            if scope.locals.contains(name) {
                return true;
            }
            if !scope.transparent {
                break;
            }
        }
        false
    }

    fn declare(&mut self, name: &[u8]) {
        if self.is_local(name) {
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.locals.insert(name.to_vec());
        }
    }

    fn node(&mut self, kind: NodeKind, children: Vec<NodeId>) -> NodeId {
        self.builder.node(kind, children, Payload::None)
    }

    fn named(&mut self, kind: NodeKind, children: Vec<NodeId>, name: impl Into<Symbol>) -> NodeId {
        self.builder
            .node(kind, children, Payload::Symbol(name.into()))
    }

    /// A single statement stands for itself, several become a
    /// `Sequence`, none is `nil`.
    fn body(&mut self, mut statements: Vec<NodeId>) -> NodeId {
        match statements.len() {
            0 => self.builder.nil(),
            1 => statements.remove(0),
            _ => self.builder.seq(statements),
        }
    }

    fn program(&mut self) -> Result<NodeId, SyntaxError> {
        let statements = self.statements()?;
        if !self.at(&Token::Eof) {
            return Err(self.unexpected());
        }
        Ok(self.builder.seq(statements))
    }

    fn at_statements_end(&self) -> bool {
        matches!(
            self.peek(),
            Token::Eof
                | Token::RBrace
                | Token::RParen
                | Token::Kw(
                    Keyword::End
                        | Keyword::Else
                        | Keyword::Elsif
                        | Keyword::When
                        | Keyword::Rescue
                        | Keyword::Ensure
                )
        )
    }

    /// Statements up to whatever closes the enclosing construct, which
    /// is left for the caller.
    fn statements(&mut self) -> Result<Vec<NodeId>, SyntaxError> {
        let no_do = std::mem::replace(&mut self.no_do, false);
        let mut out = Vec::new();
        loop {
            self.skip_terms();
            if self.at_statements_end() {
                break;
            }
            out.push(self.statement()?);
            match self.peek() {
                Token::Newline | Token::Semi => {}
                _ if self.at_statements_end() => {}
                Token::Comma => return Err(self.error("multiple assignment is not supported")),
                _ => {
                    return Err(self.error(format!(
                        "unexpected {}, expecting end of statement",
                        self.peek()
                    )))
                }
            }
        }
        self.no_do = no_do;
        Ok(out)
    }

    fn statement(&mut self) -> Result<NodeId, SyntaxError> {
        let mut node = self.expression_statement()?;
        loop {
            let keyword = match self.peek() {
                Token::Kw(k @ (Keyword::If | Keyword::Unless | Keyword::While | Keyword::Until)) => *k,
                _ => return Ok(node),
            };
            self.advance();
            let cond = self.expression_statement()?;
            node = match keyword {
                Keyword::If => self.node(NodeKind::If, vec![cond, node]),
                Keyword::Unless => {
                    let cond = self.node(NodeKind::Not, vec![cond]);
                    self.node(NodeKind::If, vec![cond, node])
                }
                Keyword::While => self.node(NodeKind::While, vec![cond, node]),
                _ => self.node(NodeKind::Until, vec![cond, node]),
            };
        }
    }

    /// `and` and `or`, which bind looser than assignment.
    fn expression_statement(&mut self) -> Result<NodeId, SyntaxError> {
        let mut left = self.not_expression()?;
        loop {
            let kind = match self.peek() {
                Token::Kw(Keyword::And) => NodeKind::And,
                Token::Kw(Keyword::Or) => NodeKind::Or,
                _ => return Ok(left),
            };
            self.advance();
            self.skip_newlines();
            let right = self.not_expression()?;
            left = self.node(kind, vec![left, right]);
        }
    }

    fn not_expression(&mut self) -> Result<NodeId, SyntaxError> {
        self.nested(Self::not_operand)
    }

    fn not_operand(&mut self) -> Result<NodeId, SyntaxError> {
        if self.eat(&Token::Kw(Keyword::Not)) {
            let operand = self.not_expression()?;
            return Ok(self.node(NodeKind::Not, vec![operand]));
        }
        self.expression()
    }

    /// Assignment level. The left-hand side is parsed as an ordinary
    /// expression first and reinterpreted once an `=` shows up.
    fn expression(&mut self) -> Result<NodeId, SyntaxError> {
        self.nested(Self::assignment)
    }

    fn assignment(&mut self) -> Result<NodeId, SyntaxError> {
        let lhs = self.ternary()?;
        let op = match self.peek() {
            Token::Eq => None,
            Token::OpAssign(op) => Some(*op),
            _ => return Ok(lhs),
        };

        let target = self.target(lhs)?;
        self.advance();
        self.skip_newlines();
        if let Target::Local(name) = &target {
            let name = name.clone();
            self.declare(&name);
        }
        let value = self.expression()?;

        Ok(match op {
            None => self.assign(&target, value),
            Some(op) => self.op_assign(&target, lhs, op, value),
        })
    }

    fn target(&self, lhs: NodeId) -> Result<Target, SyntaxError> {
        let not_assignable = || self.error(format!("unexpected {}, left-hand side is not assignable", self.peek()));
        let node = self.builder.get(lhs).ok_or_else(not_assignable)?;

        match (node.kind, &node.payload) {
            (NodeKind::Var, Payload::Binding { scope: ScopeKind::Local, name }) => {
                Ok(Target::Local(name.as_bytes().to_vec()))
            }
            (NodeKind::Var, Payload::Binding { scope, name }) => Ok(Target::Binding(*scope, name.clone())),

            // a bare identifier that was not yet known as a local
            (NodeKind::FCall, Payload::Symbol(name))
                if node.children.len() == 1
                    && is_local_name(name.as_bytes())
                    && self.builder.get(node.children[0]).is_some_and(|a| a.children.is_empty()) =>
            {
                Ok(Target::Local(name.as_bytes().to_vec()))
            }

            (NodeKind::Call, Payload::Symbol(name)) if node.children.len() == 2 => {
                let receiver = node.children[0];
                let args = self
                    .builder
                    .get(node.children[1])
                    .map(|a| a.children.clone())
                    .unwrap_or_default();
                if *name == "[]" {
                    Ok(Target::Index {
                        receiver,
                        index: args,
                    })
                } else if args.is_empty()
                    && name
                        .as_bytes()
                        .last()
                        .is_some_and(|c| c.is_ascii_alphanumeric() || *c == b'_')
                {
                    Ok(Target::Attr {
                        receiver,
                        name: name.clone(),
                    })
                } else {
                    Err(not_assignable())
                }
            }

            (NodeKind::ScopedConst, _) => {
                Err(self.error("assignment to a scoped constant is not supported"))
            }
            _ => Err(not_assignable()),
        }
    }

    fn assign(&mut self, target: &Target, value: NodeId) -> NodeId {
        match target {
            Target::Local(name) => self
                .builder
                .assign(ScopeKind::Local, name.as_slice(), value),
            Target::Binding(scope, name) => self.builder.assign(*scope, name.clone(), value),
            Target::Index { receiver, index } => {
                let mut args = index.clone();
                args.push(value);
                self.builder.call(*receiver, "[]=", args, None)
            }
            Target::Attr { receiver, name } => {
                let mut setter = name.as_bytes().to_vec();
                setter.push(b'=');
                self.builder
                    .call(*receiver, setter.as_slice(), vec![value], None)
            }
        }
    }

    /// `target op= value`. For index and attribute targets the read
    /// and the write share the receiver and index nodes.
    fn op_assign(&mut self, target: &Target, lhs: NodeId, op: &'static str, value: NodeId) -> NodeId {
        let read = match target {
            Target::Local(name) if self.builder.get(lhs).is_some_and(|n| n.kind != NodeKind::Var) => {
                self.builder.var(ScopeKind::Local, name.as_slice())
            }
            _ => lhs,
        };

        match op {
            "||" => {
                let write = self.assign(target, value);
                self.node(NodeKind::OrAssign, vec![read, write])
            }
            "&&" => {
                let write = self.assign(target, value);
                self.node(NodeKind::AndAssign, vec![read, write])
            }
            _ => {
                let combined = self.builder.call(read, op, vec![value], None);
                self.assign(target, combined)
            }
        }
    }

    fn ternary(&mut self) -> Result<NodeId, SyntaxError> {
        self.nested(Self::conditional)
    }

    fn conditional(&mut self) -> Result<NodeId, SyntaxError> {
        let cond = self.range()?;
        if !self.eat(&Token::Question) {
            return Ok(cond);
        }
        self.skip_newlines();
        let then = self.ternary()?;
        self.skip_newlines();
        self.expect(&Token::Colon)?;
        self.skip_newlines();
        let otherwise = self.ternary()?;
        Ok(self.node(NodeKind::Ternary, vec![cond, then, otherwise]))
    }

    fn range(&mut self) -> Result<NodeId, SyntaxError> {
        let left = self.or_op()?;
        let kind = match self.peek() {
            Token::Dot2 => NodeKind::RangeIncl,
            Token::Dot3 => NodeKind::RangeExcl,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.or_op()?;
        Ok(self.node(kind, vec![left, right]))
    }

    fn or_op(&mut self) -> Result<NodeId, SyntaxError> {
        let mut left = self.and_op()?;
        while self.eat(&Token::OrOr) {
            let right = self.and_op()?;
            left = self.node(NodeKind::Or, vec![left, right]);
        }
        Ok(left)
    }

    fn and_op(&mut self) -> Result<NodeId, SyntaxError> {
        let mut left = self.equality()?;
        while self.eat(&Token::AndAnd) {
            let right = self.equality()?;
            left = self.node(NodeKind::And, vec![left, right]);
        }
        Ok(left)
    }

    /// A left-associative level of binary operators, all of which
    /// become method calls on the left operand.
    fn binary(
        &mut self,
        operand: fn(&mut Self) -> Result<NodeId, SyntaxError>,
        operator: fn(&Token) -> Option<&'static str>,
    ) -> Result<NodeId, SyntaxError> {
        let mut left = operand(self)?;
        while let Some(op) = operator(self.peek()) {
            self.advance();
            let right = operand(self)?;
            left = self.builder.call(left, op, vec![right], None);
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<NodeId, SyntaxError> {
        let mut left = self.comparison()?;
        loop {
            let op = match self.peek() {
                Token::EqEq => "==",
                Token::EqEqEq => "===",
                Token::NotEq => "!=",
                Token::Match | Token::NotMatch => "=~",
                Token::Cmp => "<=>",
                _ => return Ok(left),
            };
            let negated = self.advance() == Token::NotMatch;
            let right = self.comparison()?;
            left = self.builder.call(left, op, vec![right], None);
            if negated {
                left = self.node(NodeKind::Not, vec![left]);
            }
        }
    }

    fn comparison(&mut self) -> Result<NodeId, SyntaxError> {
        self.binary(Self::bit_or, |t| match t {
            Token::Lt => Some("<"),
            Token::Le => Some("<="),
            Token::Gt => Some(">"),
            Token::Ge => Some(">="),
            _ => None,
        })
    }

    fn bit_or(&mut self) -> Result<NodeId, SyntaxError> {
        self.binary(Self::bit_and, |t| match t {
            Token::Pipe => Some("|"),
            Token::Caret => Some("^"),
            _ => None,
        })
    }

    fn bit_and(&mut self) -> Result<NodeId, SyntaxError> {
        self.binary(Self::shift, |t| match t {
            Token::Amp => Some("&"),
            _ => None,
        })
    }

    fn shift(&mut self) -> Result<NodeId, SyntaxError> {
        self.binary(Self::additive, |t| match t {
            Token::Shl => Some("<<"),
            Token::Shr => Some(">>"),
            _ => None,
        })
    }

    fn additive(&mut self) -> Result<NodeId, SyntaxError> {
        self.binary(Self::multiplicative, |t| match t {
            Token::Plus => Some("+"),
            Token::Minus => Some("-"),
            _ => None,
        })
    }

    fn multiplicative(&mut self) -> Result<NodeId, SyntaxError> {
        self.binary(Self::unary_minus, |t| match t {
            Token::Star => Some("*"),
            Token::Slash => Some("/"),
            Token::Percent => Some("%"),
            _ => None,
        })
    }

    /// `-x` calls `-@`, but a minus glued to a number literal is part
    /// of the literal, unless the literal is the base of `**`.
    fn unary_minus(&mut self) -> Result<NodeId, SyntaxError> {
        self.nested(Self::negation)
    }

    fn negation(&mut self) -> Result<NodeId, SyntaxError> {
        if !self.at(&Token::Minus) {
            return self.power();
        }
        let next = self.peek_nth(1);
        let literal = matches!(next.token, Token::Int(_) | Token::Float(_)) && !next.space_before;
        self.advance();

        if !literal {
            let operand = self.unary_minus()?;
            return Ok(self.builder.call(operand, "-@", vec![], None));
        }

        // the literal is the first node pushed while parsing the operand
        let first = NodeId(self.builder.len() as u32);
        let operand = self.power()?;
        let is_power = self.builder.get(operand).is_some_and(|n| {
            n.kind == NodeKind::Call
                && n.children.first() == Some(&first)
                && n.payload.as_symbol().is_some_and(|s| *s == "**")
        });
        if is_power {
            return Ok(self.builder.call(operand, "-@", vec![], None));
        }

        if let Some(node) = self.builder.get_mut(first) {
            match &mut node.payload {
                Payload::Integer(n) => *n = -std::mem::take(n),
                Payload::Float(x) => *x = -*x,
                _ => {}
            }
        }
        Ok(operand)
    }

    fn power(&mut self) -> Result<NodeId, SyntaxError> {
        let base = self.unary()?;
        if !self.eat(&Token::Pow) {
            return Ok(base);
        }
        let exponent = self.unary_minus()?;
        Ok(self.builder.call(base, "**", vec![exponent], None))
    }

    fn unary(&mut self) -> Result<NodeId, SyntaxError> {
        self.nested(Self::prefix)
    }

    fn prefix(&mut self) -> Result<NodeId, SyntaxError> {
        match self.peek() {
            Token::Bang => {
                self.advance();
                let operand = self.unary()?;
                Ok(self.node(NodeKind::Not, vec![operand]))
            }
            Token::Tilde => {
                self.advance();
                let operand = self.unary()?;
                Ok(self.builder.call(operand, "~", vec![], None))
            }
            Token::Plus => {
                self.advance();
                self.unary()
            }
            Token::Minus => self.unary_minus(),
            _ => {
                let node = self.primary()?;
                self.postfix(node)
            }
        }
    }

    /// Method calls, `::` lookups and indexing after an operand.
    fn postfix(&mut self, mut node: NodeId) -> Result<NodeId, SyntaxError> {
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    self.skip_newlines();
                    if self.at(&Token::LParen) {
                        let args = self.paren_args()?;
                        node = self.finish_call(Some(node), Symbol::from("call"), args)?;
                    } else {
                        let name = self.method_name()?;
                        node = self.call_rest(Some(node), name)?;
                    }
                }
                Token::Colon2 => {
                    self.advance();
                    if matches!(self.peek(), Token::Const(_)) && !self.paren_follows(1) {
                        let name = self.take_name();
                        node = self.named(NodeKind::ScopedConst, vec![node], name.as_slice());
                    } else {
                        let name = self.method_name()?;
                        node = self.call_rest(Some(node), name)?;
                    }
                }
                Token::LBracket if !self.current().space_before => {
                    self.advance();
                    let args = self.arg_list(&Token::RBracket)?;
                    if args.block.is_some() {
                        return Err(self.error("block argument is not allowed in an index"));
                    }
                    let index = args.into_nodes(&mut self.builder);
                    node = self.builder.call(node, "[]", index, None);
                }
                _ => return Ok(node),
            }
        }
    }

    fn method_name(&mut self) -> Result<Symbol, SyntaxError> {
        let name = match self.peek() {
            Token::Ident(name) | Token::Const(name) => Symbol::new(name),
            other => match other.operator_name() {
                Some(op) => Symbol::from(op),
                None => {
                    return Err(self.error(format!(
                        "unexpected {other}, expecting method name"
                    )))
                }
            },
        };
        self.advance();
        Ok(name)
    }

    /// Arguments and block of a call whose name was just consumed.
    fn call_rest(&mut self, receiver: Option<NodeId>, name: Symbol) -> Result<NodeId, SyntaxError> {
        let args = if self.paren_follows(0) {
            self.paren_args()?
        } else if self.command_arg_follows() {
            self.command_args()?
        } else {
            CallArgs::default()
        };
        self.finish_call(receiver, name, args)
    }

    fn finish_call(
        &mut self,
        receiver: Option<NodeId>,
        name: Symbol,
        mut args: CallArgs,
    ) -> Result<NodeId, SyntaxError> {
        let (line, column) = (self.current().line, self.current().column);
        let literal = self.block()?;
        let block = match (args.block.take(), literal) {
            (Some(_), Some(_)) => {
                return Err(SyntaxError::new(line, column, "both block arg and actual block given"))
            }
            (pass, literal) => pass.or(literal),
        };
        let args = args.into_nodes(&mut self.builder);
        Ok(match receiver {
            Some(receiver) => self.builder.call(receiver, name, args, block),
            None => self.builder.fcall(name, args, block),
        })
    }

    /// Whether the current token starts the first argument of a call
    /// written without parentheses, like `puts "x"` or `foo -1`.
    fn command_arg_follows(&self) -> bool {
        let current = self.current();
        if !current.space_before {
            return false;
        }
        let tight = !self.peek_nth(1).space_before;

        match &current.token {
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
            | Token::Label(_)
            | Token::Lambda
            | Token::LBracket
            | Token::LParen => true,
            Token::Kw(
                Keyword::Nil
                | Keyword::True
                | Keyword::False
                | Keyword::SelfRef
                | Keyword::Not
                | Keyword::Super
                | Keyword::Yield
                | Keyword::Def
                | Keyword::Case,
            ) => true,
            Token::Minus | Token::Star | Token::Pow | Token::Amp | Token::Bang => tight,
            _ => false,
        }
    }

    fn paren_args(&mut self) -> Result<CallArgs, SyntaxError> {
        self.expect(&Token::LParen)?;
        let no_do = std::mem::replace(&mut self.no_do, false);
        let args = self.arg_list(&Token::RParen)?;
        self.no_do = no_do;
        Ok(args)
    }

    /// Comma separated arguments up to `close`, which is consumed.
    fn arg_list(&mut self, close: &Token) -> Result<CallArgs, SyntaxError> {
        let mut args = CallArgs::default();
        self.skip_newlines();
        while !self.eat(close) {
            if args.block.is_some() {
                return Err(self.error("block argument should be the last"));
            }
            self.argument(&mut args)?;
            self.skip_newlines();
            if !self.eat(&Token::Comma) {
                self.expect(close)?;
                break;
            }
            self.skip_newlines();
        }
        Ok(args)
    }

    fn command_args(&mut self) -> Result<CallArgs, SyntaxError> {
        let no_do = std::mem::replace(&mut self.no_do, true);
        let mut args = CallArgs::default();
        loop {
            self.argument(&mut args)?;
            if !self.eat(&Token::Comma) {
                break;
            }
            self.skip_newlines();
            if args.block.is_some() {
                return Err(self.error("block argument should be the last"));
            }
        }
        self.no_do = no_do;
        Ok(args)
    }

    fn argument(&mut self, args: &mut CallArgs) -> Result<(), SyntaxError> {
        match self.peek() {
            Token::Amp => {
                self.advance();
                let value = self.ternary()?;
                args.block = Some(self.node(NodeKind::BlockPass, vec![value]));
            }
            Token::Star | Token::Pow => {
                return Err(self.error("splat arguments are not supported"));
            }
            Token::Label(_) => {
                let name = self.take_name();
                let key = self.builder.sym(name.as_slice());
                self.skip_newlines();
                let value = self.expression()?;
                args.pairs.extend([key, value]);
            }
            _ => {
                let value = self.expression()?;
                if self.eat(&Token::Arrow) {
                    self.skip_newlines();
                    let pair = self.expression()?;
                    args.pairs.extend([value, pair]);
                } else {
                    args.args.push(value);
                }
            }
        }
        Ok(())
    }

    fn block(&mut self) -> Result<Option<NodeId>, SyntaxError> {
        let close = match self.peek() {
            Token::LBrace => Token::RBrace,
            Token::Kw(Keyword::Do) if !self.no_do => Token::Kw(Keyword::End),
            _ => return Ok(None),
        };
        self.advance();

        self.push_scope(true);
        let params = self.block_params()?;
        let statements = self.statements()?;
        self.expect(&close)?;
        self.pop_scope();

        let body = self.body(statements);
        Ok(Some(self.node(NodeKind::Block, vec![params, body])))
    }

    fn block_params(&mut self) -> Result<NodeId, SyntaxError> {
        let mut params = Vec::new();
        if !self.eat(&Token::OrOr) && self.eat(&Token::Pipe) {
            while !self.eat(&Token::Pipe) {
                params.push(self.param(true)?);
                if !self.eat(&Token::Comma) {
                    self.expect(&Token::Pipe)?;
                    break;
                }
            }
        }
        Ok(self.node(NodeKind::Params, params))
    }

    /// A parenthesized or bare parameter list of a method or lambda.
    fn param_list(&mut self, in_block: bool) -> Result<NodeId, SyntaxError> {
        let mut params = Vec::new();
        if self.eat(&Token::LParen) {
            self.skip_newlines();
            while !self.eat(&Token::RParen) {
                params.push(self.param(in_block)?);
                self.skip_newlines();
                if !self.eat(&Token::Comma) {
                    self.expect(&Token::RParen)?;
                    break;
                }
                self.skip_newlines();
            }
        } else {
            while matches!(self.peek(), Token::Ident(_) | Token::Star | Token::Amp | Token::Pow) {
                params.push(self.param(in_block)?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        Ok(self.node(NodeKind::Params, params))
    }

    fn param(&mut self, in_block: bool) -> Result<NodeId, SyntaxError> {
        let name = match self.peek() {
            Token::Ident(name) if is_local_name(name) => name.clone(),
            Token::Star | Token::Pow | Token::Amp | Token::Label(_) => {
                return Err(self.error("only required and optional parameters are supported"))
            }
            other => {
                return Err(self.error(format!(
                    "unexpected {other}, expecting parameter name"
                )))
            }
        };
        self.advance();
        self.declare(&name);

        let mut children = Vec::new();
        if self.eat(&Token::Eq) {
            // a `|` would close the parameter list of a block
            let default = if in_block {
                self.shift()?
            } else {
                self.ternary()?
            };
            children.push(default);
        }
        Ok(self.named(NodeKind::Param, children, name.as_slice()))
    }

    fn primary(&mut self) -> Result<NodeId, SyntaxError> {
        let (line, column) = (self.current().line, self.current().column);
        let paren_follows = self.paren_follows(1);

        match self.advance() {
            Token::Int(n) => Ok(self.builder.int(n)),
            Token::Float(x) => Ok(self.builder.float(x)),
            Token::Str(parts) => self.string(parts),
            Token::Words { symbols, words } => {
                let elements = words
                    .into_iter()
                    .map(|w| {
                        if symbols {
                            self.builder.sym(w.as_slice())
                        } else {
                            self.builder.str(w)
                        }
                    })
                    .collect();
                Ok(self.builder.array(elements))
            }
            Token::Sym(name) => Ok(self.builder.sym(name.as_slice())),
            Token::Regex(source, flags) => Ok(self.builder.regex(source, flags)),

            Token::IVar(name) => Ok(self.builder.var(ScopeKind::Instance, name.as_slice())),
            Token::CVar(name) => Ok(self.builder.var(ScopeKind::Class, name.as_slice())),
            Token::GVar(name) => Ok(self.builder.var(ScopeKind::Global, name.as_slice())),
            Token::Const(name) if paren_follows => self.call_rest(None, Symbol::new(name)),
            Token::Const(name) => Ok(self.builder.var(ScopeKind::Constant, name.as_slice())),
            Token::Ident(name) if self.is_local(&name) && !paren_follows => {
                Ok(self.builder.var(ScopeKind::Local, name.as_slice()))
            }
            Token::Ident(name) => self.call_rest(None, Symbol::new(name)),

            Token::LBracket => {
                let no_do = std::mem::replace(&mut self.no_do, false);
                let args = self.arg_list(&Token::RBracket)?;
                self.no_do = no_do;
                if args.block.is_some() {
                    return Err(SyntaxError::new(line, column, "block argument in an array literal"));
                }
                let elements = args.into_nodes(&mut self.builder);
                Ok(self.builder.array(elements))
            }
            Token::LBrace => self.hash(),
            Token::LParen => {
                let statements = self.statements()?;
                self.expect(&Token::RParen)?;
                Ok(self.body(statements))
            }
            Token::Lambda => self.lambda(),

            Token::Kw(keyword) => self.keyword(keyword, line, column),

            other => Err(SyntaxError::new(line, column, format!("unexpected {other}"))),
        }
    }

    fn keyword(&mut self, keyword: Keyword, line: usize, column: usize) -> Result<NodeId, SyntaxError> {
        match keyword {
            Keyword::Nil => Ok(self.builder.nil()),
            Keyword::True => Ok(self.builder.boolean(true)),
            Keyword::False => Ok(self.builder.boolean(false)),
            Keyword::SelfRef => Ok(self.builder.leaf(NodeKind::SelfRef)),
            Keyword::If => self.if_rest(false),
            Keyword::Unless => self.if_rest(true),
            Keyword::While => self.loop_rest(NodeKind::While),
            Keyword::Until => self.loop_rest(NodeKind::Until),
            Keyword::Case => self.case_rest(),
            Keyword::Def => self.def_rest(),
            Keyword::Class => self.class_rest(),
            Keyword::Yield => self.yield_rest(),
            Keyword::Super => self.super_rest(),
            Keyword::Return => self.jump(NodeKind::Return),
            Keyword::Break => self.jump(NodeKind::Break),
            Keyword::Next => self.jump(NodeKind::Next),
            Keyword::Not => {
                let operand = self.expression()?;
                Ok(self.node(NodeKind::Not, vec![operand]))
            }
            Keyword::Begin | Keyword::Rescue | Keyword::Ensure | Keyword::Module => Err(
                SyntaxError::new(line, column, format!("'{}' is not supported", keyword.as_str())),
            ),
            other => Err(SyntaxError::new(
                line,
                column,
                format!("unexpected '{}'", other.as_str()),
            )),
        }
    }

    /// A string literal, which is interpolated if any part is code.
    fn string(&mut self, parts: Vec<StrPart>) -> Result<NodeId, SyntaxError> {
        let mut parts = parts;
        if let [StrPart::Lit(bytes)] = parts.as_mut_slice() {
            return Ok(self.builder.str(std::mem::take(bytes)));
        }

        let mut children = Vec::with_capacity(parts.len());
        for part in parts {
            let child = match part {
                StrPart::Lit(bytes) => self.builder.str(bytes),
                StrPart::Code(tokens) => {
                    let body = self.interpolation(tokens)?;
                    self.node(NodeKind::EvStr, vec![body])
                }
            };
            children.push(child);
        }
        Ok(self.node(NodeKind::DStr, children))
    }

    /// Parse the tokens of one `#{...}` in place of the main stream.
    fn interpolation(&mut self, mut tokens: Vec<Spanned>) -> Result<NodeId, SyntaxError> {
        let end = tokens.last().unwrap_or(self.current());
        let (line, column) = (end.line, end.column + 1);
        tokens.push(Spanned {
            token: Token::Eof,
            line,
            column,
            space_before: false,
        });

        let outer = std::mem::replace(&mut self.tokens, tokens);
        let outer_pos = std::mem::replace(&mut self.pos, 0);
        let statements = self.statements()?;
        if !self.at(&Token::Eof) {
            return Err(self.unexpected());
        }
        self.tokens = outer;
        self.pos = outer_pos;

        Ok(self.body(statements))
    }

    fn hash(&mut self) -> Result<NodeId, SyntaxError> {
        let no_do = std::mem::replace(&mut self.no_do, false);
        let mut children = Vec::new();
        self.skip_newlines();
        while !self.eat(&Token::RBrace) {
            if matches!(self.peek(), Token::Label(_)) {
                let name = self.take_name();
                children.push(self.builder.sym(name.as_slice()));
            } else {
                children.push(self.expression()?);
                self.skip_newlines();
                self.expect(&Token::Arrow)?;
            }
            self.skip_newlines();
            children.push(self.expression()?);

            self.skip_newlines();
            if !self.eat(&Token::Comma) {
                self.expect(&Token::RBrace)?;
                break;
            }
            self.skip_newlines();
        }
        self.no_do = no_do;
        Ok(self.node(NodeKind::Hash, children))
    }

    /// `-> (params) { body }`, which becomes a call of `lambda`.
    fn lambda(&mut self) -> Result<NodeId, SyntaxError> {
        self.push_scope(true);
        let params = self.param_list(true)?;
        let close = match self.peek() {
            Token::LBrace => Token::RBrace,
            Token::Kw(Keyword::Do) => Token::Kw(Keyword::End),
            other => {
                return Err(self.error(format!("unexpected {other}, expecting lambda body")))
            }
        };
        self.advance();
        let statements = self.statements()?;
        self.expect(&close)?;
        self.pop_scope();

        let body = self.body(statements);
        let block = self.node(NodeKind::Block, vec![params, body]);
        Ok(self.builder.fcall("lambda", vec![], Some(block)))
    }

    /// Separator between a condition and its body.
    fn then(&mut self) -> Result<(), SyntaxError> {
        match self.peek() {
            Token::Kw(Keyword::Then) | Token::Newline | Token::Semi => {
                self.advance();
                self.skip_terms();
                self.eat(&Token::Kw(Keyword::Then));
                Ok(())
            }
            other => Err(self.error(format!("unexpected {other}, expecting 'then' or ';'"))),
        }
    }

    fn if_rest(&mut self, negated: bool) -> Result<NodeId, SyntaxError> {
        let mut cond = self.expression_statement()?;
        if negated {
            cond = self.node(NodeKind::Not, vec![cond]);
        }
        self.then()?;
        let statements = self.statements()?;
        let body = self.body(statements);
        let mut children = vec![cond, body];

        match self.peek() {
            Token::Kw(Keyword::Elsif) if !negated => {
                self.advance();
                // the nested branch consumes the shared `end`
                children.push(self.if_rest(false)?);
                return Ok(self.node(NodeKind::If, children));
            }
            Token::Kw(Keyword::Else) => {
                self.advance();
                let statements = self.statements()?;
                children.push(self.body(statements));
            }
            _ => {}
        }
        self.expect(&Token::Kw(Keyword::End))?;
        Ok(self.node(NodeKind::If, children))
    }

    fn loop_rest(&mut self, kind: NodeKind) -> Result<NodeId, SyntaxError> {
        let no_do = std::mem::replace(&mut self.no_do, true);
        let cond = self.expression_statement()?;
        self.no_do = no_do;

        match self.peek() {
            Token::Kw(Keyword::Do) | Token::Newline | Token::Semi => {
                self.advance();
            }
            other => return Err(self.error(format!("unexpected {other}, expecting 'do' or ';'"))),
        }
        let statements = self.statements()?;
        self.expect(&Token::Kw(Keyword::End))?;

        let body = self.body(statements);
        Ok(self.node(kind, vec![cond, body]))
    }

    fn case_rest(&mut self) -> Result<NodeId, SyntaxError> {
        if matches!(self.peek(), Token::Newline | Token::Semi) {
            return Err(self.error("case without a subject is not supported"));
        }
        let subject = self.expression_statement()?;
        self.skip_terms();

        let mut children = vec![subject];
        while self.eat(&Token::Kw(Keyword::When)) {
            let mut patterns = Vec::new();
            loop {
                patterns.push(self.ternary()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
                self.skip_newlines();
            }
            self.then()?;
            let statements = self.statements()?;
            let patterns = self.builder.array(patterns);
            let body = self.body(statements);
            children.push(self.node(NodeKind::When, vec![patterns, body]));
        }
        if children.len() == 1 {
            return Err(self.error(format!("unexpected {}, expecting 'when'", self.peek())));
        }

        if self.eat(&Token::Kw(Keyword::Else)) {
            let statements = self.statements()?;
            children.push(self.body(statements));
        }
        self.expect(&Token::Kw(Keyword::End))?;
        Ok(self.node(NodeKind::Case, children))
    }

    fn def_rest(&mut self) -> Result<NodeId, SyntaxError> {
        let name = self.def_name()?;
        self.push_scope(false);
        let params = self.param_list(false)?;
        let statements = self.statements()?;
        self.expect(&Token::Kw(Keyword::End))?;
        self.pop_scope();

        let body = self.body(statements);
        Ok(self.named(NodeKind::Def, vec![params, body], name))
    }

    fn def_name(&mut self) -> Result<Symbol, SyntaxError> {
        let (line, column) = (self.current().line, self.current().column);
        let mut name = match self.advance() {
            Token::Ident(name) | Token::Const(name) => name,
            Token::Kw(keyword) => keyword.as_str().as_bytes().to_vec(),
            Token::LBracket => {
                self.expect(&Token::RBracket)?;
                b"[]".to_vec()
            }
            other => match other.operator_name() {
                Some(op) => op.as_bytes().to_vec(),
                None => {
                    return Err(SyntaxError::new(
                        line,
                        column,
                        format!("unexpected {other}, expecting method name"),
                    ))
                }
            },
        };

        // setters, `def name=(value)` and `def []=(key, value)`
        let settable = name == b"[]" || name.last().is_some_and(|c| c.is_ascii_alphanumeric() || *c == b'_');
        if settable && self.at(&Token::Eq) && !self.current().space_before && self.paren_follows(1) {
            self.advance();
            name.push(b'=');
        }
        Ok(Symbol::new(name))
    }

    fn class_rest(&mut self) -> Result<NodeId, SyntaxError> {
        let name = match self.peek() {
            Token::Const(_) => self.take_name(),
            other => {
                return Err(self.error(format!("unexpected {other}, class name must be a constant")))
            }
        };
        let mut children = Vec::with_capacity(2);
        if self.eat(&Token::Lt) {
            children.push(self.expression()?);
        }

        self.push_scope(false);
        let statements = self.statements()?;
        self.expect(&Token::Kw(Keyword::End))?;
        self.pop_scope();

        children.push(self.body(statements));
        Ok(self.named(NodeKind::Class, children, name.as_slice()))
    }

    /// Arguments of `yield` and `super`, if any were written.
    fn bare_args(&mut self) -> Result<Option<CallArgs>, SyntaxError> {
        let args = if self.paren_follows(0) {
            self.paren_args()?
        } else if self.command_arg_follows() {
            self.command_args()?
        } else {
            return Ok(None);
        };
        if args.block.is_some() {
            return Err(self.error("block arguments are not supported here"));
        }
        Ok(Some(args))
    }

    fn yield_rest(&mut self) -> Result<NodeId, SyntaxError> {
        let args = self
            .bare_args()?
            .map(|a| a.into_nodes(&mut self.builder))
            .unwrap_or_default();
        Ok(self.node(NodeKind::Yield, args))
    }

    fn super_rest(&mut self) -> Result<NodeId, SyntaxError> {
        match self.bare_args()? {
            Some(args) => {
                let args = args.into_nodes(&mut self.builder);
                Ok(self.node(NodeKind::Super, args))
            }
            None => Ok(self.builder.leaf(NodeKind::ZSuper)),
        }
    }

    /// `return`, `break` and `next`, with an optional value.
    fn jump(&mut self, kind: NodeKind) -> Result<NodeId, SyntaxError> {
        let valueless = matches!(
            self.peek(),
            Token::Newline
                | Token::Semi
                | Token::Eof
                | Token::RBrace
                | Token::RParen
                | Token::RBracket
                | Token::Colon
                | Token::Kw(
                    Keyword::End
                        | Keyword::If
                        | Keyword::Unless
                        | Keyword::While
                        | Keyword::Until
                        | Keyword::And
                        | Keyword::Or
                        | Keyword::Else
                        | Keyword::Elsif
                        | Keyword::When
                        | Keyword::Then
                        | Keyword::Do
                )
        );
        let children = if valueless {
            vec![]
        } else {
            vec![self.expression()?]
        };
        Ok(self.node(kind, children))
    }
}
