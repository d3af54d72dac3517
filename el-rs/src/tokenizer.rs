//! EL tokenizer.
//!
//! Turns source text into [`Token`]s that borrow from the source. The cursor
//! can be saved and restored with [`Tokenizer::snapshot`] and
//! [`Tokenizer::restore`], which is how the parser backtracks and how callers
//! embedding EL in a host grammar hand the cursor back and forth.
//!
//! | Input                 | Token                                           |
//! |-----------------------|-------------------------------------------------|
//! | `'text'` / `"text"`   | `STRING` (escapes are kept; the parser removes them) |
//! | `12`, `1.5`, `2e3`    | `NUMBER`                                        |
//! | `true` / `false`      | `BOOLEAN`                                       |
//! | `null`                | `NULL`                                          |
//! | `[A-Za-z_][A-Za-z0-9_]*` | `NAME`                                       |
//! | `// ...`              | comment to end of line, skipped                 |

use std::fmt;
use std::ops::BitOr;

use tracing::trace;

use crate::error::{ElError, Result};
use crate::location::FileLocation;

// ── TokenType ─────────────────────────────────────────────────────────────────

/// Bit set of token kinds; single kinds are one bit, classes are unions.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenType(u64);

impl TokenType {
    pub const NAME: TokenType = TokenType(1 << 0);
    pub const STRING: TokenType = TokenType(1 << 1);
    pub const NUMBER: TokenType = TokenType(1 << 2);
    pub const BOOLEAN: TokenType = TokenType(1 << 3);
    pub const NULL: TokenType = TokenType(1 << 4);
    pub const O_BRACKET: TokenType = TokenType(1 << 5);
    pub const C_BRACKET: TokenType = TokenType(1 << 6);
    pub const O_BRACE: TokenType = TokenType(1 << 7);
    pub const C_BRACE: TokenType = TokenType(1 << 8);
    pub const O_PAREN: TokenType = TokenType(1 << 9);
    pub const C_PAREN: TokenType = TokenType(1 << 10);
    pub const ADDITION: TokenType = TokenType(1 << 11);
    pub const SUBTRACTION: TokenType = TokenType(1 << 12);
    pub const MULTIPLICATION: TokenType = TokenType(1 << 13);
    pub const DIVISION: TokenType = TokenType(1 << 14);
    pub const MODULUS: TokenType = TokenType(1 << 15);
    pub const COLON: TokenType = TokenType(1 << 16);
    pub const COMMA: TokenType = TokenType(1 << 17);
    pub const RANGE: TokenType = TokenType(1 << 18);
    pub const LOGICAL_NEGATION: TokenType = TokenType(1 << 19);
    pub const LOGICAL_AND: TokenType = TokenType(1 << 20);
    pub const LOGICAL_OR: TokenType = TokenType(1 << 21);
    pub const LESS: TokenType = TokenType(1 << 22);
    pub const LESS_OR_EQUAL: TokenType = TokenType(1 << 23);
    pub const EQUAL: TokenType = TokenType(1 << 24);
    pub const NOT_EQUAL: TokenType = TokenType(1 << 25);
    pub const GREATER_OR_EQUAL: TokenType = TokenType(1 << 26);
    pub const GREATER: TokenType = TokenType(1 << 27);
    pub const CASE: TokenType = TokenType(1 << 28);
    pub const BITWISE_NEGATION: TokenType = TokenType(1 << 29);
    pub const BITWISE_AND: TokenType = TokenType(1 << 30);
    pub const BITWISE_XOR: TokenType = TokenType(1 << 31);
    pub const BITWISE_OR: TokenType = TokenType(1 << 32);
    pub const BITWISE_SHIFT_LEFT: TokenType = TokenType(1 << 33);
    pub const BITWISE_SHIFT_RIGHT: TokenType = TokenType(1 << 34);
    pub const DOUBLE_O_BRACE: TokenType = TokenType(1 << 35);
    pub const DOUBLE_C_BRACE: TokenType = TokenType(1 << 36);
    /// Only meaningful to the legacy model-definition grammar.
    pub const ASSIGN: TokenType = TokenType(1 << 37);
    pub const EOF: TokenType = TokenType(1 << 38);

    pub const LITERAL: TokenType = TokenType(
        Self::STRING.0 | Self::NUMBER.0 | Self::BOOLEAN.0 | Self::NULL.0,
    );
    pub const UNARY_OPERATOR: TokenType = TokenType(
        Self::ADDITION.0 | Self::SUBTRACTION.0 | Self::LOGICAL_NEGATION.0 | Self::BITWISE_NEGATION.0,
    );
    pub const SIMPLE_TERM: TokenType = TokenType(
        Self::NAME.0
            | Self::LITERAL.0
            | Self::O_PAREN.0
            | Self::UNARY_OPERATOR.0
            | Self::O_BRACKET.0
            | Self::O_BRACE.0,
    );
    pub const COMPOUND_TERM: TokenType = TokenType(
        Self::ADDITION.0
            | Self::SUBTRACTION.0
            | Self::MULTIPLICATION.0
            | Self::DIVISION.0
            | Self::MODULUS.0
            | Self::LOGICAL_AND.0
            | Self::LOGICAL_OR.0
            | Self::LESS.0
            | Self::LESS_OR_EQUAL.0
            | Self::EQUAL.0
            | Self::NOT_EQUAL.0
            | Self::GREATER_OR_EQUAL.0
            | Self::GREATER.0
            | Self::CASE.0
            | Self::BITWISE_AND.0
            | Self::BITWISE_XOR.0
            | Self::BITWISE_OR.0
            | Self::BITWISE_SHIFT_LEFT.0
            | Self::BITWISE_SHIFT_RIGHT.0
            | Self::RANGE.0,
    );

    const NAMES: [(TokenType, &'static str); 39] = [
        (Self::NAME, "variable"),
        (Self::STRING, "string"),
        (Self::NUMBER, "number"),
        (Self::BOOLEAN, "boolean"),
        (Self::NULL, "'null'"),
        (Self::O_BRACKET, "'['"),
        (Self::C_BRACKET, "']'"),
        (Self::O_BRACE, "'{'"),
        (Self::C_BRACE, "'}'"),
        (Self::O_PAREN, "'('"),
        (Self::C_PAREN, "')'"),
        (Self::ADDITION, "'+'"),
        (Self::SUBTRACTION, "'-'"),
        (Self::MULTIPLICATION, "'*'"),
        (Self::DIVISION, "'/'"),
        (Self::MODULUS, "'%'"),
        (Self::COLON, "':'"),
        (Self::COMMA, "','"),
        (Self::RANGE, "'..'"),
        (Self::LOGICAL_NEGATION, "'!'"),
        (Self::LOGICAL_AND, "'&&'"),
        (Self::LOGICAL_OR, "'||'"),
        (Self::LESS, "'<'"),
        (Self::LESS_OR_EQUAL, "'<='"),
        (Self::EQUAL, "'=='"),
        (Self::NOT_EQUAL, "'!='"),
        (Self::GREATER_OR_EQUAL, "'>='"),
        (Self::GREATER, "'>'"),
        (Self::CASE, "'->'"),
        (Self::BITWISE_NEGATION, "'~'"),
        (Self::BITWISE_AND, "'&'"),
        (Self::BITWISE_XOR, "'^'"),
        (Self::BITWISE_OR, "'|'"),
        (Self::BITWISE_SHIFT_LEFT, "'<<'"),
        (Self::BITWISE_SHIFT_RIGHT, "'>>'"),
        (Self::DOUBLE_O_BRACE, "'{{'"),
        (Self::DOUBLE_C_BRACE, "'}}'"),
        (Self::ASSIGN, "'='"),
        (Self::EOF, "end of file"),
    ];

    /// True if the two sets share any kind.
    pub fn intersects(self, other: TokenType) -> bool {
        self.0 & other.0 != 0
    }

    /// Human-readable name, e.g. `"variable, string or ']'"` for a set.
    pub fn name(self) -> String {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(t, _)| self.intersects(*t))
            .map(|(_, name)| *name)
            .collect();
        match names.split_last() {
            None => "unknown token".to_string(),
            Some((last, [])) => last.to_string(),
            Some((last, rest)) => format!("{} or {last}", rest.join(", ")),
        }
    }
}

impl BitOr for TokenType {
    type Output = TokenType;

    fn bitor(self, rhs: TokenType) -> TokenType {
        TokenType(self.0 | rhs.0)
    }
}

impl fmt::Debug for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenType({})", self.name())
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

// ── Token ─────────────────────────────────────────────────────────────────────

/// A typed `[begin, end)` span of the source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'s> {
    pub token_type: TokenType,
    source: &'s str,
    pub begin: usize,
    pub end: usize,
    /// Byte offset of the token in the source (for strings: after the quote).
    pub offset: usize,
    pub location: FileLocation,
}

impl<'s> Token<'s> {
    pub fn has_type(&self, mask: TokenType) -> bool {
        self.token_type.intersects(mask)
    }

    pub fn data(&self) -> &'s str {
        &self.source[self.begin..self.end]
    }

    /// Name plus text for diagnostics, e.g. `variable 'asdf'`.
    fn describe(&self) -> String {
        if self.has_type(TokenType::NAME | TokenType::STRING | TokenType::NUMBER | TokenType::BOOLEAN) {
            format!("{} '{}'", self.token_type, self.data())
        } else {
            self.token_type.name()
        }
    }
}

// ── Tokenizer ─────────────────────────────────────────────────────────────────

/// Saved cursor position of a [`Tokenizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenizerState {
    pos: usize,
    line: usize,
    column: usize,
}

pub struct Tokenizer<'s> {
    src: &'s str,
    pos: usize,
    line: usize,
    column: usize,
}

impl<'s> Tokenizer<'s> {
    pub fn new(src: &'s str) -> Self {
        Self::with_location(src, 1, 1)
    }

    /// A tokenizer whose first character sits at `line`/`column` of some
    /// enclosing document.
    pub fn with_location(src: &'s str, line: usize, column: usize) -> Self {
        Tokenizer {
            src,
            pos: 0,
            line,
            column,
        }
    }

    pub fn snapshot(&self) -> TokenizerState {
        TokenizerState {
            pos: self.pos,
            line: self.line,
            column: self.column,
        }
    }

    pub fn restore(&mut self, state: TokenizerState) {
        self.pos = state.pos;
        self.line = state.line;
        self.column = state.column;
    }

    pub fn location(&self) -> FileLocation {
        FileLocation::new(self.line, self.column)
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    // ── Cursor ────────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos + 1).copied()
    }

    fn current_char(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current_char()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, ch: u8) -> bool {
        if self.peek() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.advance();
        }
    }

    fn skip_line(&mut self) {
        while !matches!(self.peek(), None | Some(b'\n' | b'\r')) {
            self.advance();
        }
    }

    // ── Token readers ─────────────────────────────────────────────────────────

    fn token(&self, token_type: TokenType, begin: usize, end: usize, location: FileLocation) -> Token<'s> {
        Token {
            token_type,
            source: self.src,
            begin,
            end,
            offset: begin,
            location,
        }
    }

    fn unexpected(&self, ch: char, location: FileLocation) -> ElError {
        ElError::parse(location, format!("Unexpected character: '{ch}'"))
    }

    fn read_string(&mut self, quote: u8, location: FileLocation) -> Result<Token<'s>> {
        let begin = self.pos;
        loop {
            match self.peek() {
                None => return Err(ElError::parse(location, "Unterminated string")),
                Some(b'\\') => {
                    self.advance();
                    self.advance();
                }
                Some(c) if c == quote => {
                    let end = self.pos;
                    self.advance();
                    return Ok(self.token(TokenType::STRING, begin, end, location));
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }

    /// Digits with an optional fraction and exponent. A `.` directly after the
    /// integer part only starts a fraction if a digit follows, so `1..3` reads
    /// as a number followed by a range.
    fn read_number(&mut self, location: FileLocation) -> Result<Token<'s>> {
        let begin = self.pos;
        let start = self.snapshot();
        self.skip_digits();
        if self.peek() == Some(b'.') && self.peek2().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            self.skip_digits();
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let before_exponent = self.snapshot();
            self.advance();
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.advance();
            }
            if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.skip_digits();
            } else {
                self.restore(before_exponent);
            }
        }
        let end = self.pos;

        let trailing_dot = self.peek() == Some(b'.') && self.peek2() != Some(b'.');
        let glued = self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_');
        if trailing_dot || glued {
            self.restore(start);
            let ch = self.current_char().unwrap_or('0');
            return Err(self.unexpected(ch, location));
        }
        Ok(self.token(TokenType::NUMBER, begin, end, location))
    }

    fn skip_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn read_word(&mut self, location: FileLocation) -> Token<'s> {
        let begin = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_') {
            self.advance();
        }
        let end = self.pos;
        let token_type = match &self.src[begin..end] {
            "true" | "false" => TokenType::BOOLEAN,
            "null" => TokenType::NULL,
            _ => TokenType::NAME,
        };
        self.token(token_type, begin, end, location)
    }

    // ── Public token stream ───────────────────────────────────────────────────

    pub fn next_token(&mut self) -> Result<Token<'s>> {
        let token = self.emit_token()?;
        trace!(token = %token.token_type, text = token.data(), line = token.location.line, column = token.location.column, "token");
        Ok(token)
    }

    fn emit_token(&mut self) -> Result<Token<'s>> {
        loop {
            self.skip_ws();
            let location = self.location();
            let begin = self.pos;
            let Some(ch) = self.peek() else {
                return Ok(self.token(TokenType::EOF, begin, begin, location));
            };

            match ch {
                b'/' if self.peek2() == Some(b'/') => {
                    self.skip_line();
                    continue;
                }
                b'\'' | b'"' => {
                    self.advance();
                    return self.read_string(ch, location);
                }
                b'0'..=b'9' => return self.read_number(location),
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => return Ok(self.read_word(location)),
                _ => {}
            }

            self.advance();
            let token_type = match ch {
                b'[' => TokenType::O_BRACKET,
                b']' => TokenType::C_BRACKET,
                b'{' if self.eat(b'{') => TokenType::DOUBLE_O_BRACE,
                b'{' => TokenType::O_BRACE,
                b'}' if self.eat(b'}') => TokenType::DOUBLE_C_BRACE,
                b'}' => TokenType::C_BRACE,
                b'(' => TokenType::O_PAREN,
                b')' => TokenType::C_PAREN,
                b'+' => TokenType::ADDITION,
                b'-' if self.eat(b'>') => TokenType::CASE,
                b'-' => TokenType::SUBTRACTION,
                b'*' => TokenType::MULTIPLICATION,
                b'/' => TokenType::DIVISION,
                b'%' => TokenType::MODULUS,
                b'~' => TokenType::BITWISE_NEGATION,
                b'^' => TokenType::BITWISE_XOR,
                b':' => TokenType::COLON,
                b',' => TokenType::COMMA,
                b'&' if self.eat(b'&') => TokenType::LOGICAL_AND,
                b'&' => TokenType::BITWISE_AND,
                b'|' if self.eat(b'|') => TokenType::LOGICAL_OR,
                b'|' => TokenType::BITWISE_OR,
                b'!' if self.eat(b'=') => TokenType::NOT_EQUAL,
                b'!' => TokenType::LOGICAL_NEGATION,
                b'<' if self.eat(b'=') => TokenType::LESS_OR_EQUAL,
                b'<' if self.eat(b'<') => TokenType::BITWISE_SHIFT_LEFT,
                b'<' => TokenType::LESS,
                b'>' if self.eat(b'=') => TokenType::GREATER_OR_EQUAL,
                b'>' if self.eat(b'>') => TokenType::BITWISE_SHIFT_RIGHT,
                b'>' => TokenType::GREATER,
                b'=' if self.eat(b'=') => TokenType::EQUAL,
                b'=' => TokenType::ASSIGN,
                b'.' if self.eat(b'.') => TokenType::RANGE,
                _ => {
                    let state = TokenizerState {
                        pos: begin,
                        line: location.line,
                        column: location.column,
                    };
                    self.restore(state);
                    let ch = self.current_char().unwrap_or(ch as char);
                    return Err(self.unexpected(ch, location));
                }
            };
            return Ok(self.token(token_type, begin, self.pos, location));
        }
    }

    /// The next token without consuming it.
    pub fn peek_token(&mut self) -> Result<Token<'s>> {
        let state = self.snapshot();
        let token = self.emit_token();
        self.restore(state);
        token
    }

    /// The token after the next one, without consuming either.
    pub fn peek_second_token(&mut self) -> Result<Token<'s>> {
        let state = self.snapshot();
        let token = self.emit_token().and_then(|_| self.emit_token());
        self.restore(state);
        token
    }

    /// Consume the next token, failing unless it is one of `expected`.
    pub fn expect_token(&mut self, expected: TokenType) -> Result<Token<'s>> {
        let token = self.next_token()?;
        check(token, expected)
    }

    /// Peek at the next token, failing unless it is one of `expected`.
    pub fn peek_expected(&mut self, expected: TokenType) -> Result<Token<'s>> {
        let token = self.peek_token()?;
        check(token, expected)
    }

    /// Consume a single `expected` character after whitespace and comments,
    /// even where it would begin a longer token (`}` of `}}`).
    pub fn expect_char(&mut self, expected: u8) -> Result<()> {
        loop {
            self.skip_ws();
            if self.peek() == Some(b'/') && self.peek2() == Some(b'/') {
                self.skip_line();
            } else {
                break;
            }
        }
        if self.eat(expected) {
            return Ok(());
        }
        let token = self.peek_token()?;
        Err(ElError::parse(
            token.location,
            format!("Expected '{}', but got {}", expected as char, token.describe()),
        ))
    }

    /// Append plain text up to the next `${` to `out`, consuming the `${`.
    /// `\$` stands for a literal `$`. Returns false if the input ended first.
    pub fn read_until_interpolation(&mut self, out: &mut String) -> bool {
        while let Some(ch) = self.current_char() {
            if ch == '\\' && self.peek2() == Some(b'$') {
                self.advance();
                self.advance();
                out.push('$');
            } else if ch == '$' && self.peek2() == Some(b'{') {
                self.advance();
                self.advance();
                return true;
            } else {
                self.advance();
                out.push(ch);
            }
        }
        false
    }
}

fn check(token: Token<'_>, expected: TokenType) -> Result<Token<'_>> {
    if token.has_type(expected) {
        Ok(token)
    } else {
        Err(ElError::parse(
            token.location,
            format!("Expected {}, but got {}", expected.name(), token.describe()),
        ))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
