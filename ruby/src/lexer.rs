//! Bytes to tokens.
//!
//! Ruby is context sensitive at the token level: whether `/` starts a
//! regexp and whether a line break ends a statement both depend on the
//! token in front of it. The lexer keeps just enough of that context
//! in [Last] to decide.

use nodemarshal::PatternFlags;
use num_bigint::BigInt;

use crate::errors::SyntaxError;
use crate::token::{Keyword, Spanned, StrPart, Token};

/// Operators which may follow `:` to form a symbol, longest first.
const OPERATOR_SYMBOLS: &[&[u8]] = &[
    b"[]=", b"[]", b"<=>", b"===", b"==", b"=~", b"!=", b"!~", b"**", b"+@", b"-@", b"<<",
    b">>", b"<=", b">=", b"+", b"-", b"*", b"/", b"%", b"<", b">", b"!", b"~", b"&", b"|",
    b"^",
];

/// What the lexer remembers about the previous token.
#[derive(Clone, Copy, Debug)]
struct Last {
    value: bool,
    continues: bool,
    ident: bool,
    dot: bool,
    separator: bool,
}

impl Last {
    const START: Last = Last {
        value: false,
        continues: false,
        ident: false,
        dot: false,
        separator: true,
    };

    fn of(token: &Token) -> Self {
        Last {
            value: token.ends_value(),
            continues: token.continues_line(),
            ident: matches!(token, Token::Ident(_)),
            dot: matches!(token, Token::Dot | Token::Colon2),
            separator: matches!(token, Token::Semi | Token::Newline),
        }
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c >= 0x80
}

fn is_ident_char(c: u8) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

/// Split `src` into tokens, terminated by a single [Token::Eof].
pub fn tokenize(src: &[u8]) -> Result<Vec<Spanned>, SyntaxError> {
    let mut lexer = Lexer::new(src);
    let mut tokens = lexer.tokens(false)?;
    let (line, column) = lexer.position();
    tokens.push(Spanned {
        token: Token::Eof,
        line,
        column,
        space_before: true,
    });
    Ok(tokens)
}

pub struct Lexer<'src> {
    src: &'src [u8],
    pos: usize,
    line: usize,
    line_start: usize,
    last: Last,
    /// Interpolations the current position is nested in.
    interpolations: usize,
}

/// Most interpolations nested inside each other.
const MAX_INTERPOLATIONS: usize = 64;

impl<'src> Lexer<'src> {
    pub fn new(src: &'src [u8]) -> Self {
        Lexer {
            src,
            pos: 0,
            line: 1,
            line_start: 0,
            last: Last::START,
            interpolations: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<u8> {
        self.src.get(self.pos + n).copied()
    }

    fn rest(&self) -> &'src [u8] {
        &self.src[self.pos..]
    }

    fn eat(&mut self, s: &[u8]) -> bool {
        if self.rest().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn position(&self) -> (usize, usize) {
        (self.line, self.pos - self.line_start + 1)
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        let (line, column) = self.position();
        SyntaxError::new(line, column, message)
    }

    /// Step over the `\n` at the current position.
    fn newline(&mut self) {
        self.pos += 1;
        self.line += 1;
        self.line_start = self.pos;
    }

    /// Lex until end of input or, inside an interpolation, until the
    /// `}` closing it.
    fn tokens(&mut self, interpolation: bool) -> Result<Vec<Spanned>, SyntaxError> {
        let mut out = Vec::new();
        let mut depth = 0usize;

        loop {
            let space_before = self.skip_space()?;
            let Some(c) = self.peek() else {
                if interpolation {
                    return Err(self.error("unterminated string interpolation"));
                }
                return Ok(out);
            };

            if c == b'\n' {
                let (line, column) = self.position();
                self.newline();
                if !self.last.separator && !self.last.continues && !self.leading_dot() {
                    out.push(Spanned {
                        token: Token::Newline,
                        line,
                        column,
                        space_before,
                    });
                    self.last = Last::START;
                }
                continue;
            }

            if interpolation && c == b'}' && depth == 0 {
                self.pos += 1;
                return Ok(out);
            }

            if !interpolation && self.pos == self.line_start && self.at_end_marker() {
                return Ok(out);
            }

            let (line, column) = self.position();
            let token = self.token(space_before)?;
            match token {
                Token::LBrace => depth += 1,
                Token::RBrace => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.last = Last::of(&token);
            out.push(Spanned {
                token,
                line,
                column,
                space_before,
            });
        }
    }

    fn at_end_marker(&self) -> bool {
        self.rest().starts_with(b"__END__") && matches!(self.peek_at(7), None | Some(b'\n' | b'\r'))
    }

    /// Skip blanks, comments and escaped line breaks. Returns whether
    /// anything was skipped.
    fn skip_space(&mut self) -> Result<bool, SyntaxError> {
        let start = self.pos;
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\x0c') => self.pos += 1,
                Some(b'\\') if self.peek_at(1) == Some(b'\n') => {
                    self.pos += 1;
                    self.newline();
                }
                Some(b'#') => self.skip_line(),
                Some(b'=') if self.pos == self.line_start && self.rest().starts_with(b"=begin") => {
                    self.block_comment()?
                }
                _ => break,
            }
        }
        Ok(self.pos != start)
    }

    /// Advance up to, but not over, the next `\n`.
    fn skip_line(&mut self) {
        while !matches!(self.peek(), None | Some(b'\n')) {
            self.pos += 1;
        }
    }

    fn block_comment(&mut self) -> Result<(), SyntaxError> {
        let (line, column) = self.position();
        loop {
            self.skip_line();
            if self.peek().is_none() {
                return Err(SyntaxError::new(
                    line,
                    column,
                    "embedded document meets end of file",
                ));
            }
            self.newline();
            if self.rest().starts_with(b"=end") {
                self.skip_line();
                return Ok(());
            }
        }
    }

    /// Whether the next line starts with a method call continuing the
    /// previous one.
    fn leading_dot(&self) -> bool {
        let rest = self.rest();
        let indent = rest
            .iter()
            .take_while(|c| matches!(c, b' ' | b'\t'))
            .count();
        let rest = &rest[indent..];
        (rest.starts_with(b".") && !rest.starts_with(b"..")) || rest.starts_with(b"&.")
    }

    fn token(&mut self, space_before: bool) -> Result<Token, SyntaxError> {
        let c = self.src[self.pos];
        if c.is_ascii_digit() {
            return self.number();
        }
        if is_ident_start(c) {
            return Ok(self.identifier());
        }

        match c {
            b'"' => {
                self.pos += 1;
                Ok(Token::Str(self.double_quoted()?))
            }
            b'\'' => {
                self.pos += 1;
                Ok(Token::Str(self.single_quoted()?))
            }
            b'@' => self.instance_var(),
            b'$' => self.global_var(),
            b':' => self.colon(),
            b'/' if self.regex_allowed(space_before) => {
                self.pos += 1;
                self.regex()
            }
            b'%' if self.words_allowed(space_before) => self.words(),
            _ => self.operator(),
        }
    }

    /// `/` starts a regexp unless it follows an operand. After an
    /// identifier it still does when written like a command argument,
    /// as in `split /,/`.
    fn regex_allowed(&self, space_before: bool) -> bool {
        !self.last.value
            || (self.last.ident
                && space_before
                && !matches!(self.peek_at(1), Some(b' ' | b'\t' | b'=')))
    }

    fn words_allowed(&self, space_before: bool) -> bool {
        matches!(self.peek_at(1), Some(b'w' | b'W' | b'i' | b'I'))
            && matches!(
                self.peek_at(2),
                Some(b'[' | b'(' | b'{' | b'<' | b'|' | b'!' | b'/')
            )
            && (!self.last.value || (self.last.ident && space_before))
    }

    fn identifier(&mut self) -> Token {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if matches!(self.peek(), Some(b'?' | b'!'))
            && self.peek_at(1) != Some(b'=')
            && !self.src[start].is_ascii_uppercase()
        {
            self.pos += 1;
        }
        let word = self.src[start..self.pos].to_vec();

        if self.peek() == Some(b':') && self.peek_at(1) != Some(b':') && !self.last.dot {
            self.pos += 1;
            return Token::Label(word);
        }

        if !self.last.dot {
            if let Some(keyword) = Keyword::from_bytes(&word) {
                return Token::Kw(keyword);
            }
        }

        if word[0].is_ascii_uppercase() {
            Token::Const(word)
        } else {
            Token::Ident(word)
        }
    }

    fn name(&mut self) -> Option<Vec<u8>> {
        let start = self.pos;
        if !self.peek().is_some_and(is_ident_start) {
            return None;
        }
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        Some(self.src[start..self.pos].to_vec())
    }

    fn instance_var(&mut self) -> Result<Token, SyntaxError> {
        let class = self.eat(b"@@");
        if !class {
            self.pos += 1;
        }
        match self.name() {
            Some(name) if class => Ok(Token::CVar(name)),
            Some(name) => Ok(Token::IVar(name)),
            None => Err(self.error("'@' without identifiers is not allowed as a variable name")),
        }
    }

    fn global_var(&mut self) -> Result<Token, SyntaxError> {
        self.pos += 1;
        self.name()
            .map(Token::GVar)
            .ok_or_else(|| self.error("unsupported global variable name"))
    }

    fn colon(&mut self) -> Result<Token, SyntaxError> {
        if self.eat(b"::") {
            return Ok(Token::Colon2);
        }

        match self.peek_at(1) {
            Some(b'"') => {
                self.pos += 2;
                match self.double_quoted()?.as_mut_slice() {
                    [StrPart::Lit(name)] => Ok(Token::Sym(std::mem::take(name))),
                    _ => Err(self.error("interpolated symbols are not supported")),
                }
            }
            Some(c) if is_ident_start(c) => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(is_ident_char) {
                    self.pos += 1;
                }
                if matches!(self.peek(), Some(b'?' | b'!' | b'='))
                    && !matches!(self.peek_at(1), Some(b'=' | b'~' | b'>'))
                {
                    self.pos += 1;
                }
                Ok(Token::Sym(self.src[start..self.pos].to_vec()))
            }
            // after an operand this is the colon of a ternary
            _ if !self.last.value => {
                let rest = &self.src[self.pos + 1..];
                for op in OPERATOR_SYMBOLS {
                    if rest.starts_with(op) {
                        self.pos += 1 + op.len();
                        return Ok(Token::Sym(op.to_vec()));
                    }
                }
                self.pos += 1;
                Ok(Token::Colon)
            }
            _ => {
                self.pos += 1;
                Ok(Token::Colon)
            }
        }
    }

    fn operator(&mut self) -> Result<Token, SyntaxError> {
        use Token::*;

        let (token, len) = match self.rest() {
            [b'*', b'*', b'=', ..] => (OpAssign("**"), 3),
            [b'*', b'*', ..] => (Pow, 2),
            [b'*', b'=', ..] => (OpAssign("*"), 2),
            [b'*', ..] => (Star, 1),
            [b'+', b'=', ..] => (OpAssign("+"), 2),
            [b'+', ..] => (Plus, 1),
            [b'-', b'>', ..] => (Lambda, 2),
            [b'-', b'=', ..] => (OpAssign("-"), 2),
            [b'-', ..] => (Minus, 1),
            [b'/', b'=', ..] => (OpAssign("/"), 2),
            [b'/', ..] => (Slash, 1),
            [b'%', b'=', ..] => (OpAssign("%"), 2),
            [b'%', ..] => (Percent, 1),
            [b'=', b'=', b'=', ..] => (EqEqEq, 3),
            [b'=', b'=', ..] => (EqEq, 2),
            [b'=', b'~', ..] => (Match, 2),
            [b'=', b'>', ..] => (Arrow, 2),
            [b'=', ..] => (Eq, 1),
            [b'!', b'=', ..] => (NotEq, 2),
            [b'!', b'~', ..] => (NotMatch, 2),
            [b'!', ..] => (Bang, 1),
            [b'<', b'=', b'>', ..] => (Cmp, 3),
            [b'<', b'<', b'=', ..] => (OpAssign("<<"), 3),
            [b'<', b'<', ..] => (Shl, 2),
            [b'<', b'=', ..] => (Le, 2),
            [b'<', ..] => (Lt, 1),
            [b'>', b'>', b'=', ..] => (OpAssign(">>"), 3),
            [b'>', b'>', ..] => (Shr, 2),
            [b'>', b'=', ..] => (Ge, 2),
            [b'>', ..] => (Gt, 1),
            [b'&', b'&', b'=', ..] => (OpAssign("&&"), 3),
            [b'&', b'&', ..] => (AndAnd, 2),
            [b'&', b'.', ..] => return Err(self.error("safe navigation is not supported")),
            [b'&', b'=', ..] => (OpAssign("&"), 2),
            [b'&', ..] => (Amp, 1),
            [b'|', b'|', b'=', ..] => (OpAssign("||"), 3),
            [b'|', b'|', ..] => (OrOr, 2),
            [b'|', b'=', ..] => (OpAssign("|"), 2),
            [b'|', ..] => (Pipe, 1),
            [b'^', b'=', ..] => (OpAssign("^"), 2),
            [b'^', ..] => (Caret, 1),
            [b'~', ..] => (Tilde, 1),
            [b'.', b'.', b'.', ..] => (Dot3, 3),
            [b'.', b'.', ..] => (Dot2, 2),
            [b'.', ..] => (Dot, 1),
            [b',', ..] => (Comma, 1),
            [b';', ..] => (Semi, 1),
            [b'?', ..] => (Question, 1),
            [b'(', ..] => (LParen, 1),
            [b')', ..] => (RParen, 1),
            [b'[', ..] => (LBracket, 1),
            [b']', ..] => (RBracket, 1),
            [b'{', ..] => (LBrace, 1),
            [b'}', ..] => (RBrace, 1),
            [b'`', ..] => return Err(self.error("backtick commands are not supported")),
            [c, ..] => {
                return Err(self.error(format!("invalid character {:?}", char::from(*c))))
            }
            [] => return Err(self.error("unexpected end of input")),
        };

        self.pos += len;
        Ok(token)
    }

    fn number(&mut self) -> Result<Token, SyntaxError> {
        let start = self.pos;
        let (radix, prefix) = match (
            self.peek(),
            self.peek_at(1).map(|c| c.to_ascii_lowercase()),
        ) {
            (Some(b'0'), Some(b'x')) => (16, 2),
            (Some(b'0'), Some(b'b')) => (2, 2),
            (Some(b'0'), Some(b'o')) => (8, 2),
            (Some(b'0'), Some(b'd')) => (10, 2),
            (Some(b'0'), Some(b'0'..=b'9' | b'_')) => (8, 1),
            _ => (10, 0),
        };
        self.pos += prefix;
        let digits = self.digits(radix);

        if prefix == 0 {
            let mut float = false;
            if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
                self.digits(10);
                float = true;
            }
            if matches!(self.peek(), Some(b'e' | b'E')) {
                let sign = usize::from(matches!(self.peek_at(1), Some(b'+' | b'-')));
                if self.peek_at(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1 + sign;
                    self.digits(10);
                    float = true;
                }
            }
            if float {
                let text: String = self.src[start..self.pos]
                    .iter()
                    .filter(|c| **c != b'_')
                    .map(|c| char::from(*c))
                    .collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| self.error("invalid float literal"))?;
                return self.after_number(Token::Float(value));
            }
        }

        if digits.is_empty() {
            return Err(self.error("numeric literal without digits"));
        }
        let value = BigInt::parse_bytes(&digits, radix)
            .ok_or_else(|| self.error("invalid numeric literal"))?;
        self.after_number(Token::Int(value))
    }

    /// Collect digits of the given radix, dropping `_` separators.
    fn digits(&mut self, radix: u32) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(c) = self.peek() {
            if c != b'_' {
                if !char::from(c).is_digit(radix) {
                    break;
                }
                out.push(c);
            }
            self.pos += 1;
        }
        out
    }

    fn after_number(&self, token: Token) -> Result<Token, SyntaxError> {
        if self.peek().is_some_and(is_ident_char) {
            return Err(self.error("invalid numeric literal"));
        }
        Ok(token)
    }

    /// Body of a `"` string, the opening quote already consumed.
    fn double_quoted(&mut self) -> Result<Vec<StrPart>, SyntaxError> {
        let (line, column) = self.position();
        let mut parts = Vec::new();
        let mut buf = Vec::new();

        loop {
            let Some(c) = self.peek() else {
                return Err(SyntaxError::new(
                    line,
                    column,
                    "unterminated string meets end of file",
                ));
            };
            match c {
                b'"' => {
                    self.pos += 1;
                    break;
                }
                b'\\' => {
                    self.pos += 1;
                    self.escape(&mut buf)?;
                }
                b'#' if self.peek_at(1) == Some(b'{') => {
                    self.pos += 2;
                    if !buf.is_empty() {
                        parts.push(StrPart::Lit(std::mem::take(&mut buf)));
                    }
                    let last = std::mem::replace(&mut self.last, Last::START);
                    if self.interpolations >= MAX_INTERPOLATIONS {
                        return Err(self.error("nesting too deep"));
                    }
                    self.interpolations += 1;
                    let code = self.tokens(true);
                    self.interpolations -= 1;
                    let code = code?;
                    self.last = last;
                    parts.push(StrPart::Code(code));
                }
                b'\n' => {
                    buf.push(c);
                    self.newline();
                }
                _ => {
                    buf.push(c);
                    self.pos += 1;
                }
            }
        }

        if !buf.is_empty() || parts.is_empty() {
            parts.push(StrPart::Lit(buf));
        }
        Ok(parts)
    }

    fn escape(&mut self, buf: &mut Vec<u8>) -> Result<(), SyntaxError> {
        let Some(c) = self.peek() else {
            return Err(self.error("unterminated string meets end of file"));
        };
        if c == b'\n' {
            // escaped line break, dropped
            self.newline();
            return Ok(());
        }
        self.pos += 1;

        match c {
            b'n' => buf.push(b'\n'),
            b't' => buf.push(b'\t'),
            b'r' => buf.push(b'\r'),
            b's' => buf.push(b' '),
            b'e' => buf.push(0x1b),
            b'a' => buf.push(0x07),
            b'b' => buf.push(0x08),
            b'f' => buf.push(0x0c),
            b'v' => buf.push(0x0b),
            b'0'..=b'7' => {
                self.pos -= 1;
                let value = self.radix_digits(8, 3).unwrap_or(0);
                buf.push((value & 0xff) as u8);
            }
            b'x' => {
                let value = self
                    .radix_digits(16, 2)
                    .ok_or_else(|| self.error("invalid hex escape"))?;
                buf.push(value as u8);
            }
            b'u' => {
                let braced = self.eat(b"{");
                let value = if braced {
                    self.radix_digits(16, 6)
                } else {
                    self.radix_digits(16, 4)
                };
                if braced && !self.eat(b"}") {
                    return Err(self.error("unterminated Unicode escape"));
                }
                let c = value
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.error("invalid Unicode escape"))?;
                buf.extend_from_slice(c.encode_utf8(&mut [0; 4]).as_bytes());
            }
            other => buf.push(other),
        }
        Ok(())
    }

    /// Up to `max` digits of `radix`, or `None` if there are none.
    fn radix_digits(&mut self, radix: u32, max: usize) -> Option<u32> {
        let mut value = None;
        for _ in 0..max {
            let Some(digit) = self.peek().and_then(|c| char::from(c).to_digit(radix)) else {
                break;
            };
            value = Some(value.unwrap_or(0) * radix + digit);
            self.pos += 1;
        }
        value
    }

    /// Body of a `'` string, where only `\\` and `\'` are escapes.
    fn single_quoted(&mut self) -> Result<Vec<StrPart>, SyntaxError> {
        let (line, column) = self.position();
        let mut buf = Vec::new();
        loop {
            match self.peek() {
                None => {
                    return Err(SyntaxError::new(
                        line,
                        column,
                        "unterminated string meets end of file",
                    ))
                }
                Some(b'\'') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') if matches!(self.peek_at(1), Some(b'\\' | b'\'')) => {
                    buf.push(self.src[self.pos + 1]);
                    self.pos += 2;
                }
                Some(b'\n') => {
                    buf.push(b'\n');
                    self.newline();
                }
                Some(c) => {
                    buf.push(c);
                    self.pos += 1;
                }
            }
        }
        Ok(vec![StrPart::Lit(buf)])
    }

    /// Body of a regexp literal, the opening slash already consumed.
    fn regex(&mut self) -> Result<Token, SyntaxError> {
        let (line, column) = self.position();
        let mut source = Vec::new();
        loop {
            match self.peek() {
                None => {
                    return Err(SyntaxError::new(
                        line,
                        column,
                        "unterminated regexp meets end of file",
                    ))
                }
                Some(b'/') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => match self.peek_at(1) {
                    Some(b'/') => {
                        source.push(b'/');
                        self.pos += 2;
                    }
                    Some(b'\n') => {
                        self.pos += 1;
                        self.newline();
                    }
                    Some(c) => {
                        source.extend_from_slice(&[b'\\', c]);
                        self.pos += 2;
                    }
                    None => self.pos += 1,
                },
                Some(b'#') if self.peek_at(1) == Some(b'{') => {
                    return Err(self.error("interpolation in regexp literals is not supported"))
                }
                Some(b'\n') => {
                    source.push(b'\n');
                    self.newline();
                }
                Some(c) => {
                    source.push(c);
                    self.pos += 1;
                }
            }
        }

        let mut flags = PatternFlags::empty();
        while let Some(c) = self.peek() {
            flags |= match c {
                b'i' => PatternFlags::IGNORECASE,
                b'x' => PatternFlags::EXTENDED,
                b'm' => PatternFlags::MULTILINE,
                b'o' => PatternFlags::ONCE,
                _ => break,
            };
            self.pos += 1;
        }
        if self.peek().is_some_and(is_ident_char) {
            return Err(self.error("unknown regexp option"));
        }
        Ok(Token::Regex(source, flags))
    }

    /// `%w[...]` and `%i[...]` lists.
    fn words(&mut self) -> Result<Token, SyntaxError> {
        let (line, column) = self.position();
        let symbols = matches!(self.peek_at(1), Some(b'i' | b'I'));
        let open = self.src[self.pos + 2];
        let close = match open {
            b'[' => b']',
            b'(' => b')',
            b'{' => b'}',
            b'<' => b'>',
            c => c,
        };
        self.pos += 3;

        let mut words = Vec::new();
        let mut word = Vec::new();
        let mut depth = 0usize;
        loop {
            let Some(c) = self.peek() else {
                return Err(SyntaxError::new(
                    line,
                    column,
                    "unterminated list meets end of file",
                ));
            };
            if c == close && depth == 0 {
                self.pos += 1;
                break;
            }

            match c {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    if !word.is_empty() {
                        words.push(std::mem::take(&mut word));
                    }
                    if c == b'\n' {
                        self.newline();
                        continue;
                    }
                }
                b'\\' if matches!(self.peek_at(1), Some(b' ') | Some(b'\\')) => {
                    word.push(self.src[self.pos + 1]);
                    self.pos += 1;
                }
                _ => {
                    if open != close {
                        if c == open {
                            depth += 1;
                        } else if c == close {
                            depth -= 1;
                        }
                    }
                    word.push(c);
                }
            }
            self.pos += 1;
        }
        if !word.is_empty() {
            words.push(word);
        }

        Ok(Token::Words { symbols, words })
    }
}

#[cfg(test)]
mod tests {
    use super::tokenize;
    use crate::token::{Keyword, StrPart, Token};
    use nodemarshal::PatternFlags;
    use num_bigint::BigInt;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn tokens(src: &str) -> Vec<Token> {
        tokenize(src.as_bytes())
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    fn ident(s: &str) -> Token {
        Token::Ident(s.as_bytes().to_vec())
    }

    fn int(n: i64) -> Token {
        Token::Int(BigInt::from(n))
    }

    #[test]
    fn increment_is_two_pluses() {
        assert_eq!(
            vec![
                ident("a"),
                Token::Eq,
                int(1),
                Token::Semi,
                ident("a"),
                Token::Plus,
                Token::Plus,
                Token::Eof
            ],
            tokens("a = 1; a++")
        );
    }

    #[rstest]
    #[case::division("x / 2", Token::Slash)]
    #[case::tight_division("x/2", Token::Slash)]
    #[case::after_paren("(x) /2/", Token::Slash)]
    #[case::command_argument("split /,/", Token::Regex(b",".to_vec(), PatternFlags::empty()))]
    #[case::assignment("x = /a\\/b/i", Token::Regex(b"a/b".to_vec(), PatternFlags::IGNORECASE))]
    fn slash_context(#[case] src: &str, #[case] expected: Token) {
        let found = tokens(src);
        assert!(found.contains(&expected), "{found:?}");
    }

    #[test]
    fn line_continuation() {
        assert_eq!(
            vec![
                ident("a"),
                Token::Plus,
                int(1),
                Token::Newline,
                ident("b"),
                Token::Newline,
                Token::Eof
            ],
            tokens("a +\n  1\nb\n")
        );
        assert_eq!(
            vec![ident("a"), Token::Dot, ident("b"), Token::Eof],
            tokens("a\n  .b")
        );
        assert_eq!(
            vec![ident("a"), Token::Newline, ident("b"), Token::Eof],
            tokens("a # trailing\n\n\n# whole line\nb")
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            vec![
                int(1_000),
                int(255),
                int(5),
                int(15),
                Token::Float(1.5),
                Token::Float(2e-3),
                Token::Eof
            ],
            tokens("1_000 0xff 0b101 017 1.5 2e-3")
        );
        // a range, not a float
        assert_eq!(
            vec![int(1), Token::Dot2, int(50), Token::Eof],
            tokens("1..50")
        );
        assert!(tokenize(b"12abc").is_err());
    }

    #[test]
    fn interpolation() {
        let found = tokens(r#""a#{ {b: 1}[:b] }c\n""#);
        let Token::Str(parts) = &found[0] else {
            panic!("{found:?}")
        };
        assert_eq!(3, parts.len());
        assert_eq!(StrPart::Lit(b"a".to_vec()), parts[0]);
        let StrPart::Code(code) = &parts[1] else {
            panic!("{parts:?}")
        };
        let inner: Vec<_> = code.iter().map(|s| s.token.clone()).collect();
        assert_eq!(
            vec![
                Token::LBrace,
                Token::Label(b"b".to_vec()),
                int(1),
                Token::RBrace,
                Token::LBracket,
                Token::Sym(b"b".to_vec()),
                Token::RBracket
            ],
            inner
        );
        assert_eq!(StrPart::Lit(b"c\n".to_vec()), parts[2]);
    }

    #[test]
    fn single_quotes_keep_escapes() {
        assert_eq!(
            vec![Token::Str(vec![StrPart::Lit(br"a\n'b".to_vec())]), Token::Eof],
            tokens(r"'a\n\'b'")
        );
    }

    #[test]
    fn keywords_after_dot_are_names() {
        assert_eq!(
            vec![int(1), Token::Dot, ident("class"), Token::Eof],
            tokens("1.class")
        );
        assert_eq!(Token::Kw(Keyword::Class), tokens("class")[0]);
    }

    #[rstest]
    #[case(":foo", b"foo")]
    #[case(":empty?", b"empty?")]
    #[case(":x=", b"x=")]
    #[case(":[]=", b"[]=")]
    #[case(":<=>", b"<=>")]
    #[case(":\"with space\"", b"with space")]
    fn symbols(#[case] src: &str, #[case] name: &[u8]) {
        assert_eq!(Token::Sym(name.to_vec()), tokens(src)[0]);
    }

    #[test]
    fn ternary_colon() {
        assert_eq!(
            vec![
                ident("a"),
                Token::Question,
                int(1),
                Token::Colon,
                int(2),
                Token::Eof
            ],
            tokens("a ? 1 : 2")
        );
    }

    #[test]
    fn predicates_and_bangs() {
        assert_eq!(
            vec![ident("a"), Token::Dot, ident("select!"), Token::Eof],
            tokens("a.select!")
        );
        assert_eq!(
            vec![ident("val"), Token::NotEq, int(0), Token::Eof],
            tokens("val != 0")
        );
    }

    #[test]
    fn word_lists() {
        assert_eq!(
            Token::Words {
                symbols: false,
                words: vec![b"a".to_vec(), b"b".to_vec()]
            },
            tokens("%w[a  b]")[0]
        );
    }

    #[test]
    fn positions() {
        let spans = tokenize(b"a\n  bb").unwrap();
        assert_eq!((2, 3), (spans[2].line, spans[2].column));
        assert!(spans[2].space_before);
    }

    #[rstest]
    #[case::string("\"abc")]
    #[case::interpolation("\"#{1")]
    #[case::regex("x = /abc")]
    #[case::character("a = `ls`")]
    #[case::comment("=begin\nnever closed\n")]
    fn unterminated(#[case] src: &str) {
        assert!(tokenize(src.as_bytes()).is_err());
    }
}
