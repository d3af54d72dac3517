//! Legacy model-definition syntax.
//!
//! Older entity definition files describe models with a comma-separated list
//! of entries instead of an expression:
//!
//! ```text
//! ":maps/b_shell0.bsp", ":maps/b_shell1.bsp" 1 2 spawnflags = 1
//! pathKey = "model" skinKey = "skin" frameKey = "frame"
//! ```
//!
//! A static entry is a path, optional skin and frame numbers and an optional
//! `key = value` condition. A dynamic entry names the variables holding the
//! path, skin and frame. Both become `{ path, skin, frame }` maps; the list
//! becomes a switch tried from the last entry to the first, so conditional
//! entries written after a catch-all still take effect.

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{ElError, Result};
use crate::expression::{BinaryOperation, ExpressionNode};
use crate::parser::{parse, parse_number, unescape, ParseMode};
use crate::tokenizer::{TokenType, Tokenizer};
use crate::value::{MapType, Value};

/// Parse an expression, falling back to the legacy syntax.
///
/// Either form must be followed by `terminator`. The tokenizer is rewound
/// before the legacy attempt; if that fails too, the expression error is
/// returned, since it is the more useful one for current files.
pub fn parse_with_legacy_fallback(
    tokenizer: &mut Tokenizer<'_>,
    terminator: TokenType,
) -> Result<ExpressionNode> {
    let start = tokenizer.snapshot();
    let expression = parse(tokenizer, ParseMode::Lenient).and_then(|node| {
        tokenizer.peek_expected(terminator)?;
        Ok(node)
    });
    let error = match expression {
        Ok(node) => return Ok(node),
        Err(e) => e,
    };

    debug!(error = %error, "retrying as legacy model definition");
    tokenizer.restore(start);
    parse_legacy(tokenizer, terminator).map_err(|legacy| {
        debug!(error = %legacy, "legacy model definition failed");
        tokenizer.restore(start);
        error
    })
}

/// [`parse_with_legacy_fallback`] over a whole string.
pub fn parse_model_definition(text: &str) -> Result<ExpressionNode> {
    parse_with_legacy_fallback(&mut Tokenizer::new(text), TokenType::EOF)
}

/// Parse a legacy entry list up to (not including) `terminator`.
pub fn parse_legacy(tokenizer: &mut Tokenizer<'_>, terminator: TokenType) -> Result<ExpressionNode> {
    let location = Some(tokenizer.location());
    let mut entries = Vec::new();
    loop {
        let token = tokenizer.peek_expected(TokenType::STRING | TokenType::NAME)?;
        let entry = if token.has_type(TokenType::STRING) {
            parse_static_entry(tokenizer)?
        } else {
            parse_dynamic_entry(tokenizer)?
        };
        entries.push(entry);

        let token = tokenizer.peek_expected(TokenType::COMMA | terminator)?;
        if !token.has_type(TokenType::COMMA) {
            break;
        }
        tokenizer.next_token()?;
    }
    entries.reverse();
    Ok(ExpressionNode::switch(entries, location))
}

fn parse_static_entry(tokenizer: &mut Tokenizer<'_>) -> Result<ExpressionNode> {
    let path = tokenizer.expect_token(TokenType::STRING)?;
    let location = Some(path.location);
    let path = unescape(path.data());
    let path = path.strip_prefix(':').unwrap_or(&path);

    let mut indices = [0.0; 2];
    for index in &mut indices {
        let token = tokenizer.peek_token()?;
        if !token.has_type(TokenType::NUMBER) {
            break;
        }
        tokenizer.next_token()?;
        *index = parse_number(&token)?;
    }

    let mut map = MapType::new();
    map.insert("path".into(), Value::from(path));
    map.insert("skin".into(), Value::from(indices[0]));
    map.insert("frame".into(), Value::from(indices[1]));
    let model = ExpressionNode::literal(Value::from(map), location);

    let is_condition = tokenizer.peek_token()?.has_type(TokenType::NAME)
        && tokenizer.peek_second_token()?.has_type(TokenType::ASSIGN);
    if !is_condition {
        return Ok(model);
    }

    let key = tokenizer.expect_token(TokenType::NAME)?;
    let assign = tokenizer.expect_token(TokenType::ASSIGN)?;
    let value = tokenizer.expect_token(TokenType::STRING | TokenType::NUMBER)?;
    let value = if value.has_type(TokenType::STRING) {
        Value::from(unescape(value.data()))
    } else {
        Value::from(parse_number(&value)?)
    };
    let condition = ExpressionNode::binary(
        BinaryOperation::Equal,
        ExpressionNode::variable(key.data(), Some(key.location)),
        ExpressionNode::literal(value, Some(assign.location)),
        Some(assign.location),
    );
    Ok(ExpressionNode::binary(BinaryOperation::Case, condition, model, location))
}

fn parse_dynamic_entry(tokenizer: &mut Tokenizer<'_>) -> Result<ExpressionNode> {
    let location = tokenizer.location();
    let mut keys: [Option<ExpressionNode>; 3] = Default::default();
    while tokenizer.peek_token()?.has_type(TokenType::NAME) {
        let name = tokenizer.expect_token(TokenType::NAME)?;
        let slot = match name.data() {
            "pathKey" => 0,
            "skinKey" => 1,
            "frameKey" => 2,
            other => {
                return Err(ElError::parse(
                    name.location,
                    format!("Unknown model definition key '{other}'"),
                ))
            }
        };
        tokenizer.expect_token(TokenType::ASSIGN)?;
        let variable = tokenizer.expect_token(TokenType::STRING)?;
        keys[slot] = Some(ExpressionNode::variable(unescape(variable.data()), Some(variable.location)));
    }

    let [path, skin, frame] = keys;
    let path = path.ok_or_else(|| ElError::parse(location, "Missing pathKey in model definition"))?;
    let mut elements = IndexMap::new();
    elements.insert("path".to_string(), path);
    elements.extend(skin.map(|skin| ("skin".to_string(), skin)));
    elements.extend(frame.map(|frame| ("frame".to_string(), frame)));
    Ok(ExpressionNode::map(elements, Some(location)))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
