//! Recursive-descent parser producing [`ExpressionNode`] trees.
//!
//! Binary operators are read in a single left-to-right loop; precedence is
//! restored by [`ExpressionNode::binary`] as each node is built.
//!
//! ```text
//! expression  := term
//! term        := simple-or-switch { binary-op simple-or-switch }
//! simple-or-switch := switch | simple { "[" index-list "]" }
//! simple      := unary-op simple-or-switch | "(" expression ")" | name | literal
//! literal     := string | number | boolean | null | array | map
//! array       := "[" [ expression [ ".." expression ] { "," ... } ] "]"
//! map         := "{" [ (string | name) ":" expression { "," ... } ] "}"
//! switch      := "{{" [ expression { "," expression } ] "}}"
//! index       := expression | expression ".." | ".." expression | expression ".." expression
//! ```

use indexmap::IndexMap;
use tracing::{debug, instrument};

use crate::error::{ElError, Result};
use crate::expression::{BinaryOperation, ExpressionNode, UnaryOperation};
use crate::tokenizer::{Token, TokenType, Tokenizer};
use crate::value::Value;

/// Whether input may continue after the expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// The expression must span the whole input.
    #[default]
    Strict,
    /// Stop after the first complete expression; the caller's grammar
    /// continues from there.
    Lenient,
}

/// Parse `text` as one complete expression.
#[instrument(level = "debug", skip(text), fields(len = text.len()))]
pub fn parse_strict(text: &str) -> Result<ExpressionNode> {
    parse(&mut Tokenizer::new(text), ParseMode::Strict)
}

/// Parse the leading expression of `text`, which starts at `line`/`column`
/// of an enclosing document.
#[instrument(level = "debug", skip(text), fields(len = text.len()))]
pub fn parse_lenient(text: &str, line: usize, column: usize) -> Result<ExpressionNode> {
    parse(&mut Tokenizer::with_location(text, line, column), ParseMode::Lenient)
}

/// Parse from an existing tokenizer, leaving it after the expression.
pub fn parse(tokenizer: &mut Tokenizer<'_>, mode: ParseMode) -> Result<ExpressionNode> {
    let result = Parser::new(tokenizer, mode).parse();
    match &result {
        Ok(node) => debug!(?mode, expression = %node, "parsed expression"),
        Err(e) => debug!(?mode, error = %e, "parse failed"),
    }
    result
}

// ── Parser ────────────────────────────────────────────────────────────────────

pub struct Parser<'t, 's> {
    tokenizer: &'t mut Tokenizer<'s>,
    mode: ParseMode,
}

impl<'t, 's> Parser<'t, 's> {
    pub fn new(tokenizer: &'t mut Tokenizer<'s>, mode: ParseMode) -> Self {
        Parser { tokenizer, mode }
    }

    pub fn parse(&mut self) -> Result<ExpressionNode> {
        let expression = self.parse_expression()?;
        if self.mode == ParseMode::Strict {
            self.tokenizer.peek_expected(TokenType::EOF)?;
        }
        Ok(expression)
    }

    fn parse_expression(&mut self) -> Result<ExpressionNode> {
        self.tokenizer
            .peek_expected(TokenType::SIMPLE_TERM | TokenType::DOUBLE_O_BRACE)?;
        let lhs = self.parse_simple_term_or_switch()?;
        self.parse_compound_term(lhs)
    }

    fn parse_simple_term_or_switch(&mut self) -> Result<ExpressionNode> {
        let token = self
            .tokenizer
            .peek_expected(TokenType::SIMPLE_TERM | TokenType::DOUBLE_O_BRACE)?;
        if token.has_type(TokenType::DOUBLE_O_BRACE) {
            return self.parse_switch();
        }
        let mut term = self.parse_simple_term()?;
        while self.tokenizer.peek_token()?.has_type(TokenType::O_BRACKET) {
            term = self.parse_subscript(term)?;
        }
        Ok(term)
    }

    fn parse_simple_term(&mut self) -> Result<ExpressionNode> {
        let token = self.tokenizer.peek_expected(TokenType::SIMPLE_TERM)?;
        if token.has_type(TokenType::UNARY_OPERATOR) {
            self.parse_unary()
        } else if token.has_type(TokenType::O_PAREN) {
            self.parse_group()
        } else if token.has_type(TokenType::NAME) {
            self.tokenizer.next_token()?;
            Ok(ExpressionNode::variable(token.data(), Some(token.location)))
        } else {
            self.parse_literal()
        }
    }

    fn parse_unary(&mut self) -> Result<ExpressionNode> {
        let token = self.tokenizer.expect_token(TokenType::UNARY_OPERATOR)?;
        let op = match token.token_type {
            TokenType::ADDITION => UnaryOperation::Plus,
            TokenType::SUBTRACTION => UnaryOperation::Minus,
            TokenType::LOGICAL_NEGATION => UnaryOperation::LogicalNegation,
            TokenType::BITWISE_NEGATION => UnaryOperation::BitwiseNegation,
            other => {
                return Err(ElError::parse(
                    token.location,
                    format!("Unhandled unary operator: {other}"),
                ))
            }
        };
        let operand = self.parse_simple_term_or_switch()?;
        Ok(ExpressionNode::unary(op, operand, Some(token.location)))
    }

    fn parse_group(&mut self) -> Result<ExpressionNode> {
        let token = self.tokenizer.expect_token(TokenType::O_PAREN)?;
        let expression = self.parse_expression()?;
        self.tokenizer.expect_token(TokenType::C_PAREN)?;
        Ok(ExpressionNode::unary(UnaryOperation::Group, expression, Some(token.location)))
    }

    fn parse_literal(&mut self) -> Result<ExpressionNode> {
        let token = self
            .tokenizer
            .peek_expected(TokenType::LITERAL | TokenType::O_BRACKET | TokenType::O_BRACE)?;
        let location = Some(token.location);
        let value = match token.token_type {
            TokenType::O_BRACKET => return self.parse_array(),
            TokenType::O_BRACE => return self.parse_map(),
            TokenType::STRING => Value::from(unescape(token.data())),
            TokenType::NUMBER => Value::from(parse_number(&token)?),
            TokenType::BOOLEAN => Value::from(token.data() == "true"),
            _ => Value::null(),
        };
        self.tokenizer.next_token()?;
        Ok(ExpressionNode::literal(value, location))
    }

    fn parse_array(&mut self) -> Result<ExpressionNode> {
        let token = self.tokenizer.expect_token(TokenType::O_BRACKET)?;
        let elements = self.parse_list(TokenType::C_BRACKET, Self::parse_expression_or_bounded_range)?;
        Ok(ExpressionNode::array(elements, Some(token.location)))
    }

    fn parse_subscript(&mut self, lhs: ExpressionNode) -> Result<ExpressionNode> {
        let token = self.tokenizer.expect_token(TokenType::O_BRACKET)?;
        let location = Some(token.location);
        let mut elements = self.parse_list(TokenType::C_BRACKET, Self::parse_expression_or_any_range)?;
        let rhs = match elements.len() {
            1 => elements.remove(0),
            _ => ExpressionNode::array(elements, location),
        };
        Ok(ExpressionNode::subscript(lhs, rhs, location))
    }

    fn parse_switch(&mut self) -> Result<ExpressionNode> {
        let token = self.tokenizer.expect_token(TokenType::DOUBLE_O_BRACE)?;
        self.tokenizer
            .peek_expected(TokenType::SIMPLE_TERM | TokenType::DOUBLE_O_BRACE | TokenType::DOUBLE_C_BRACE)?;
        let cases = self.parse_list(TokenType::DOUBLE_C_BRACE, Self::parse_expression)?;
        Ok(ExpressionNode::switch(cases, Some(token.location)))
    }

    /// Comma-separated items up to and including `close`; may be empty.
    fn parse_list(
        &mut self,
        close: TokenType,
        mut item: impl FnMut(&mut Self) -> Result<ExpressionNode>,
    ) -> Result<Vec<ExpressionNode>> {
        let mut items = Vec::new();
        if self.tokenizer.peek_token()?.has_type(close) {
            self.tokenizer.next_token()?;
            return Ok(items);
        }
        loop {
            items.push(item(self)?);
            if !self
                .tokenizer
                .expect_token(TokenType::COMMA | close)?
                .has_type(TokenType::COMMA)
            {
                return Ok(items);
            }
        }
    }

    fn parse_map(&mut self) -> Result<ExpressionNode> {
        let token = self.tokenizer.expect_token(TokenType::O_BRACE)?;
        let mut elements = IndexMap::new();
        if self.tokenizer.peek_token()?.has_type(TokenType::C_BRACE) {
            self.tokenizer.next_token()?;
        } else {
            loop {
                let key = self.tokenizer.expect_token(TokenType::STRING | TokenType::NAME)?;
                let key = match key.token_type {
                    TokenType::STRING => unescape(key.data()),
                    _ => key.data().to_string(),
                };
                self.tokenizer.expect_token(TokenType::COLON)?;
                let value = self.parse_expression()?;
                elements.entry(key).or_insert(value);
                if !self
                    .tokenizer
                    .expect_token(TokenType::COMMA | TokenType::C_BRACE)?
                    .has_type(TokenType::COMMA)
                {
                    break;
                }
            }
        }
        Ok(ExpressionNode::map(elements, Some(token.location)))
    }

    fn parse_expression_or_bounded_range(&mut self) -> Result<ExpressionNode> {
        let expression = self.parse_expression()?;
        if self.tokenizer.peek_token()?.has_type(TokenType::RANGE) {
            let token = self.tokenizer.next_token()?;
            let last = self.parse_expression()?;
            return Ok(ExpressionNode::binary(
                BinaryOperation::BoundedRange,
                expression,
                last,
                Some(token.location),
            ));
        }
        Ok(expression)
    }

    fn parse_expression_or_any_range(&mut self) -> Result<ExpressionNode> {
        if self.tokenizer.peek_token()?.has_type(TokenType::RANGE) {
            let token = self.tokenizer.next_token()?;
            let last = self.parse_expression()?;
            return Ok(ExpressionNode::unary(
                UnaryOperation::RightBoundedRange,
                last,
                Some(token.location),
            ));
        }

        let expression = self.parse_expression()?;
        if !self.tokenizer.peek_token()?.has_type(TokenType::RANGE) {
            return Ok(expression);
        }
        let token = self.tokenizer.next_token()?;
        if self.tokenizer.peek_token()?.has_type(TokenType::SIMPLE_TERM) {
            let last = self.parse_expression()?;
            Ok(ExpressionNode::binary(
                BinaryOperation::BoundedRange,
                expression,
                last,
                Some(token.location),
            ))
        } else {
            Ok(ExpressionNode::unary(
                UnaryOperation::LeftBoundedRange,
                expression,
                Some(token.location),
            ))
        }
    }

    fn parse_compound_term(&mut self, mut lhs: ExpressionNode) -> Result<ExpressionNode> {
        loop {
            let token = self.tokenizer.peek_token()?;
            if !token.has_type(TokenType::COMPOUND_TERM) {
                return Ok(lhs);
            }
            // `a..` directly before `]` or `,` is an open range, not a binary operator
            if token.has_type(TokenType::RANGE)
                && !self
                    .tokenizer
                    .peek_second_token()?
                    .has_type(TokenType::SIMPLE_TERM | TokenType::DOUBLE_O_BRACE)
            {
                return Ok(lhs);
            }
            self.tokenizer.next_token()?;
            let op = binary_operation(token.token_type).ok_or_else(|| {
                ElError::parse(
                    token.location,
                    format!("Unhandled binary operator: {}", token.token_type),
                )
            })?;
            let rhs = self.parse_simple_term_or_switch()?;
            lhs = ExpressionNode::binary(op, lhs, rhs, Some(token.location));
        }
    }
}

fn binary_operation(token_type: TokenType) -> Option<BinaryOperation> {
    use BinaryOperation::*;
    let op = match token_type {
        TokenType::ADDITION => Addition,
        TokenType::SUBTRACTION => Subtraction,
        TokenType::MULTIPLICATION => Multiplication,
        TokenType::DIVISION => Division,
        TokenType::MODULUS => Modulus,
        TokenType::LOGICAL_AND => LogicalAnd,
        TokenType::LOGICAL_OR => LogicalOr,
        TokenType::BITWISE_AND => BitwiseAnd,
        TokenType::BITWISE_XOR => BitwiseXOr,
        TokenType::BITWISE_OR => BitwiseOr,
        TokenType::BITWISE_SHIFT_LEFT => BitwiseShiftLeft,
        TokenType::BITWISE_SHIFT_RIGHT => BitwiseShiftRight,
        TokenType::LESS => Less,
        TokenType::LESS_OR_EQUAL => LessOrEqual,
        TokenType::GREATER => Greater,
        TokenType::GREATER_OR_EQUAL => GreaterOrEqual,
        TokenType::EQUAL => Equal,
        TokenType::NOT_EQUAL => NotEqual,
        TokenType::RANGE => BoundedRange,
        TokenType::CASE => Case,
        _ => return None,
    };
    Some(op)
}

pub(crate) fn parse_number(token: &Token<'_>) -> Result<f64> {
    token
        .data()
        .parse()
        .map_err(|_| ElError::parse(token.location, format!("Invalid number '{}'", token.data())))
}

/// Remove the backslash from `\\`, `\"` and `\'`; other escapes are kept.
pub(crate) fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(&next @ ('\\' | '"' | '\'')) = chars.peek() {
                out.push(next);
                chars.next();
                continue;
            }
        }
        out.push(ch);
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
