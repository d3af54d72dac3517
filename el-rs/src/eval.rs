//! Evaluation of expression trees.
//!
//! Operator semantics live in free functions shared with the optimizer:
//! [`evaluate_unary`], [`evaluate_binary`] and [`evaluate_subscript`]. The
//! binary entry point pulls its operands through a callback so that `&&`,
//! `||` and `->` can skip the right-hand side.
//!
//! An `Undefined` operand makes arithmetic, bitwise, range and logical
//! operators yield `Undefined`; comparisons instead order it below
//! everything else.

use std::cmp::Ordering;

use tracing::trace;

use crate::context::EvaluationContext;
use crate::error::{ElError, Result};
use crate::expression::{BinaryOperation, Expression, ExpressionNode, UnaryOperation};
use crate::value::{ArrayType, MapType, RangeType, Value, ValueKind, ValueType};

impl ExpressionNode {
    /// Evaluate against `context`; the first error aborts the whole tree.
    pub fn evaluate(&self, context: &mut EvaluationContext<'_>) -> Result<Value> {
        Evaluator { lenient: false }.evaluate(self, context)
    }

    /// Evaluate against `context`, replacing every sub-expression that fails
    /// with `Undefined`.
    pub fn try_evaluate(&self, context: &mut EvaluationContext<'_>) -> Value {
        Evaluator { lenient: true }
            .evaluate(self, context)
            .unwrap_or_else(|_| Value::undefined())
    }
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

struct Evaluator {
    lenient: bool,
}

impl Evaluator {
    fn evaluate(&self, node: &ExpressionNode, context: &mut EvaluationContext<'_>) -> Result<Value> {
        trace!(kind = kind_name(node.expression()), location = ?node.location(), "evaluate");
        let result = self
            .evaluate_node(node, context)
            .map_err(|e| e.in_expression(&node.as_string(), node.location()));
        match result {
            Ok(value) => {
                context.trace(&value, node.location());
                Ok(value)
            }
            Err(e) if self.lenient && e.is_evaluation_error() => Ok(Value::undefined()),
            Err(e) => Err(e),
        }
    }

    fn evaluate_node(&self, node: &ExpressionNode, context: &mut EvaluationContext<'_>) -> Result<Value> {
        match node.expression() {
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Variable(name) => Ok(context.variable_value(name)),
            Expression::Array(elements) => {
                let mut array = ArrayType::with_capacity(elements.len());
                for element in elements {
                    let value = self.evaluate(element, context)?;
                    if value.has_type(&[ValueType::Range]) {
                        let spliced = value.convert_to(ValueType::Array)?;
                        array.extend(spliced.array_value()?.iter().cloned());
                    } else {
                        array.push(value);
                    }
                }
                Ok(Value::from(array))
            }
            Expression::Map(elements) => {
                let mut map = MapType::with_capacity(elements.len());
                for (key, element) in elements {
                    map.insert(key.clone(), self.evaluate(element, context)?);
                }
                Ok(Value::from(map))
            }
            Expression::Unary(op, operand) => {
                let operand = self.evaluate(operand, context)?;
                evaluate_unary(*op, &operand)
            }
            Expression::Binary(op, lhs, rhs) => evaluate_binary(*op, |side| match side {
                Operand::Left => self.evaluate(lhs, context),
                Operand::Right => self.evaluate(rhs, context),
            }),
            Expression::Subscript(lhs, rhs) => {
                let lhs = self.evaluate(lhs, context)?;
                let rhs = self.evaluate(rhs, context)?;
                evaluate_subscript(context, &lhs, &rhs)
            }
            Expression::Switch(cases) => {
                for case in cases {
                    let value = self.evaluate(case, context)?;
                    if !value.is_undefined() {
                        return Ok(value);
                    }
                }
                Ok(Value::undefined())
            }
        }
    }
}

fn kind_name(expression: &Expression) -> &'static str {
    match expression {
        Expression::Literal(_) => "literal",
        Expression::Variable(_) => "variable",
        Expression::Array(_) => "array",
        Expression::Map(_) => "map",
        Expression::Unary(..) => "unary",
        Expression::Binary(..) => "binary",
        Expression::Subscript(..) => "subscript",
        Expression::Switch(_) => "switch",
    }
}

fn invalid_operands(lhs: &Value, rhs: &Value) -> ElError {
    ElError::evaluation(format!(
        "Invalid operand types {} and {}",
        lhs.type_name(),
        rhs.type_name()
    ))
}

// ── Unary operators ───────────────────────────────────────────────────────────

pub(crate) fn evaluate_unary(op: UnaryOperation, operand: &Value) -> Result<Value> {
    if operand.is_undefined() {
        return Ok(Value::undefined());
    }
    let invalid = || ElError::evaluation(format!("Invalid type {}", operand.type_name()));

    match op {
        UnaryOperation::Plus => signed_number(operand).map(Value::from).ok_or_else(invalid),
        UnaryOperation::Minus => signed_number(operand).map(|n| Value::from(-n)).ok_or_else(invalid),
        UnaryOperation::LogicalNegation => match operand.kind() {
            ValueKind::Boolean(b) => Ok(Value::from(!b)),
            _ => Err(invalid()),
        },
        UnaryOperation::BitwiseNegation => match operand.kind() {
            ValueKind::Number(_) | ValueKind::String(_) => operand
                .try_convert_to(ValueType::Number)
                .and_then(|n| n.integer_value().ok())
                .map(|i| Value::from(!i as f64))
                .ok_or_else(invalid),
            _ => Err(invalid()),
        },
        UnaryOperation::Group => Ok(operand.clone()),
        UnaryOperation::LeftBoundedRange => Ok(Value::from(RangeType::LeftBounded {
            first: operand.convert_to(ValueType::Number)?.integer_value()?,
        })),
        UnaryOperation::RightBoundedRange => Ok(Value::from(RangeType::RightBounded {
            last: operand.convert_to(ValueType::Number)?.integer_value()?,
        })),
    }
}

/// Booleans, numbers and numeric strings as a number.
fn signed_number(value: &Value) -> Option<f64> {
    match value.kind() {
        ValueKind::Boolean(_) | ValueKind::Number(_) | ValueKind::String(_) => value
            .try_convert_to(ValueType::Number)
            .and_then(|n| n.number_value().ok()),
        _ => None,
    }
}

// ── Binary operators ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operand {
    Left,
    Right,
}

/// Apply `op`, fetching each operand on demand. The right operand is not
/// fetched when a logical operator or a case short-circuits.
pub(crate) fn evaluate_binary(
    op: BinaryOperation,
    mut operand: impl FnMut(Operand) -> Result<Value>,
) -> Result<Value> {
    use BinaryOperation::*;
    match op {
        LogicalAnd => return evaluate_logical(operand, false),
        LogicalOr => return evaluate_logical(operand, true),
        Case => return evaluate_case(operand),
        _ => {}
    }

    let lhs = operand(Operand::Left)?;
    let rhs = operand(Operand::Right)?;
    match op {
        Addition => evaluate_addition(&lhs, &rhs),
        Subtraction => evaluate_algebraic(&lhs, &rhs, |l, r| l - r),
        Multiplication => evaluate_algebraic(&lhs, &rhs, |l, r| l * r),
        Division => evaluate_algebraic(&lhs, &rhs, |l, r| l / r),
        Modulus => evaluate_algebraic(&lhs, &rhs, |l, r| l % r),
        BitwiseAnd => evaluate_bitwise(&lhs, &rhs, |l, r| l & r),
        BitwiseXOr => evaluate_bitwise(&lhs, &rhs, |l, r| l ^ r),
        BitwiseOr => evaluate_bitwise(&lhs, &rhs, |l, r| l | r),
        BitwiseShiftLeft => evaluate_bitwise(&lhs, &rhs, |l, r| {
            u32::try_from(r).ok().and_then(|r| l.checked_shl(r)).unwrap_or(0)
        }),
        BitwiseShiftRight => evaluate_bitwise(&lhs, &rhs, |l, r| {
            u32::try_from(r)
                .ok()
                .and_then(|r| l.checked_shr(r))
                .unwrap_or(if l < 0 { -1 } else { 0 })
        }),
        Less => compare(&lhs, &rhs, Ordering::is_lt),
        LessOrEqual => compare(&lhs, &rhs, Ordering::is_le),
        Greater => compare(&lhs, &rhs, Ordering::is_gt),
        GreaterOrEqual => compare(&lhs, &rhs, Ordering::is_ge),
        Equal => compare(&lhs, &rhs, Ordering::is_eq),
        NotEqual => compare(&lhs, &rhs, Ordering::is_ne),
        BoundedRange => evaluate_bounded_range(&lhs, &rhs),
        LogicalAnd | LogicalOr | Case => Err(invalid_operands(&lhs, &rhs)),
    }
}

/// Both operands as numbers, if the pair takes part in arithmetic: two
/// booleans or numbers, or one of them paired with a numeric string.
fn numeric_operands(lhs: &Value, rhs: &Value) -> Option<(f64, f64)> {
    const NUMERIC: &[ValueType] = &[ValueType::Boolean, ValueType::Number];
    const STRING: &[ValueType] = &[ValueType::String];
    let applies = (lhs.has_type(NUMERIC) && (rhs.has_type(NUMERIC) || rhs.has_type(STRING)))
        || (lhs.has_type(STRING) && rhs.has_type(NUMERIC));
    if !applies {
        return None;
    }
    let number = |v: &Value| v.try_convert_to(ValueType::Number)?.number_value().ok();
    Some((number(lhs)?, number(rhs)?))
}

fn evaluate_algebraic(lhs: &Value, rhs: &Value, f: impl Fn(f64, f64) -> f64) -> Result<Value> {
    if lhs.is_undefined() || rhs.is_undefined() {
        return Ok(Value::undefined());
    }
    numeric_operands(lhs, rhs)
        .map(|(l, r)| Value::from(f(l, r)))
        .ok_or_else(|| invalid_operands(lhs, rhs))
}

fn evaluate_addition(lhs: &Value, rhs: &Value) -> Result<Value> {
    if lhs.is_undefined() || rhs.is_undefined() {
        return Ok(Value::undefined());
    }
    if let Some((l, r)) = numeric_operands(lhs, rhs) {
        return Ok(Value::from(l + r));
    }
    match (lhs.kind(), rhs.kind()) {
        (ValueKind::String(l), ValueKind::String(r)) => Ok(Value::from(format!("{l}{r}"))),
        (ValueKind::Array(l), ValueKind::Array(r)) => Ok(Value::from(l.iter().chain(r).cloned().collect::<ArrayType>())),
        (ValueKind::Map(l), ValueKind::Map(r)) => {
            let mut union = l.clone();
            union.extend(r.iter().map(|(k, v)| (k.clone(), v.clone())));
            Ok(Value::from(union))
        }
        _ => Err(invalid_operands(lhs, rhs)),
    }
}

fn evaluate_bitwise(lhs: &Value, rhs: &Value, f: impl Fn(i64, i64) -> i64) -> Result<Value> {
    if lhs.is_undefined() || rhs.is_undefined() {
        return Ok(Value::undefined());
    }
    let integer = |v: &Value| v.try_convert_to(ValueType::Number)?.integer_value().ok();
    match (integer(lhs), integer(rhs)) {
        (Some(l), Some(r)) => Ok(Value::from(f(l, r) as f64)),
        _ => Err(invalid_operands(lhs, rhs)),
    }
}

fn compare(lhs: &Value, rhs: &Value, test: fn(Ordering) -> bool) -> Result<Value> {
    Ok(Value::from(test(lhs.compare(rhs)?)))
}

fn evaluate_bounded_range(lhs: &Value, rhs: &Value) -> Result<Value> {
    if lhs.is_undefined() || rhs.is_undefined() {
        return Ok(Value::undefined());
    }
    Ok(Value::from(RangeType::Bounded {
        first: lhs.convert_to(ValueType::Number)?.integer_value()?,
        last: rhs.convert_to(ValueType::Number)?.integer_value()?,
    }))
}

/// `&&` (`stop_on == false`) and `||` (`stop_on == true`) over Boolean and
/// Null operands.
fn evaluate_logical(mut operand: impl FnMut(Operand) -> Result<Value>, stop_on: bool) -> Result<Value> {
    const LOGICAL: &[ValueType] = &[ValueType::Boolean, ValueType::Null];
    let lhs = operand(Operand::Left)?;
    if lhs.is_undefined() {
        return Ok(Value::undefined());
    }
    let rhs = if lhs.has_type(LOGICAL) {
        if lhs.convert_to(ValueType::Boolean)?.boolean_value()? == stop_on {
            return Ok(Value::from(stop_on));
        }
        let rhs = operand(Operand::Right)?;
        if rhs.has_type(LOGICAL) {
            return Ok(Value::from(rhs.convert_to(ValueType::Boolean)?.boolean_value()?));
        }
        rhs
    } else {
        operand(Operand::Right)?
    };
    if rhs.is_undefined() {
        return Ok(Value::undefined());
    }
    Err(invalid_operands(&lhs, &rhs))
}

fn evaluate_case(mut operand: impl FnMut(Operand) -> Result<Value>) -> Result<Value> {
    let condition = operand(Operand::Left)?;
    if !condition.is_undefined() && condition.convert_to(ValueType::Boolean)?.boolean_value()? {
        operand(Operand::Right)
    } else {
        Ok(Value::undefined())
    }
}

// ── Subscript ─────────────────────────────────────────────────────────────────

/// Map `index` into `0..size`, counting negative indices from the end.
/// Indices outside `-size..size` map to `size`.
pub(crate) fn compute_index(index: i64, size: usize) -> usize {
    let size = size as i64;
    if (-size..size).contains(&index) {
        ((size + index % size) % size) as usize
    } else {
        size as usize
    }
}

fn index_of(value: &Value, size: usize) -> Result<usize> {
    Ok(compute_index(value.convert_to(ValueType::Number)?.integer_value()?, size))
}

/// Flatten an index list (numbers, nested arrays, ranges) into positions.
fn compute_indices(index: &Value, size: usize, out: &mut Vec<usize>) -> Result<()> {
    match index.kind() {
        ValueKind::Array(items) => {
            for item in items {
                compute_indices(item, size, out)?;
            }
        }
        ValueKind::Range(range) => out.extend(range.iter(size).map(|i| compute_index(i, size))),
        _ => out.push(index_of(index, size)?),
    }
    Ok(())
}

fn out_of_bounds(context: &EvaluationContext<'_>, lhs: &Value, rhs: &Value) -> ElError {
    ElError::IndexOutOfBounds {
        location: context.location(lhs),
        value: lhs.describe(),
        index: rhs.describe(),
    }
}

fn index_error(lhs: &Value, rhs: &Value) -> ElError {
    ElError::Index {
        location: None,
        value: lhs.describe(),
        value_type: lhs.value_type(),
        index: rhs.describe(),
        index_type: rhs.value_type(),
    }
}

/// `lhs[rhs]`.
///
/// Any index past the end of an array is an error, as is a single index past
/// the end of a string. Positions of an index list or range that fall outside
/// a string are skipped. Maps yield `Undefined` for a missing key and a
/// sub-map for a list of keys.
pub(crate) fn evaluate_subscript(context: &EvaluationContext<'_>, lhs: &Value, rhs: &Value) -> Result<Value> {
    let result = match (lhs.kind(), rhs.kind()) {
        (ValueKind::String(s), ValueKind::Boolean(_) | ValueKind::Number(_)) => {
            let chars: Vec<char> = s.chars().collect();
            let index = index_of(rhs, chars.len())?;
            match chars.get(index) {
                Some(ch) => Ok(Value::from(ch.to_string())),
                None => Err(out_of_bounds(context, lhs, rhs)),
            }
        }
        (ValueKind::String(s), ValueKind::Array(_) | ValueKind::Range(_)) => {
            let chars: Vec<char> = s.chars().collect();
            let mut indices = Vec::new();
            compute_indices(rhs, chars.len(), &mut indices)?;
            Ok(Value::from(indices.into_iter().filter_map(|i| chars.get(i)).collect::<String>()))
        }
        (ValueKind::Array(items), ValueKind::Boolean(_) | ValueKind::Number(_)) => {
            let index = index_of(rhs, items.len())?;
            items.get(index).cloned().ok_or_else(|| out_of_bounds(context, lhs, rhs))
        }
        (ValueKind::Array(items), ValueKind::Array(_) | ValueKind::Range(_)) => {
            let mut indices = Vec::new();
            compute_indices(rhs, items.len(), &mut indices)?;
            let mut result = ArrayType::with_capacity(indices.len());
            for i in indices {
                match items.get(i) {
                    Some(item) => result.push(item.clone()),
                    None => return Err(out_of_bounds(context, lhs, rhs)),
                }
            }
            Ok(Value::from(result))
        }
        (ValueKind::Map(map), ValueKind::String(key)) => Ok(map.get(key).cloned().unwrap_or_default()),
        (ValueKind::Map(map), ValueKind::Array(keys)) => {
            let mut result = MapType::new();
            for key in keys {
                let ValueKind::String(name) = key.kind() else {
                    return Err(ElError::Conversion {
                        location: context.location(key),
                        value: key.describe(),
                        from: key.value_type(),
                        to: ValueType::String,
                    });
                };
                if let Some(value) = map.get(name) {
                    result.insert(name.clone(), value.clone());
                }
            }
            Ok(Value::from(result))
        }
        _ => Err(index_error(lhs, rhs)),
    };
    result.map_err(|e| e.or_location(context.location(lhs)))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::FileLocation;
    use crate::var::VariableStore;

    fn num(n: f64) -> Value {
        Value::from(n)
    }

    fn binary(op: BinaryOperation, lhs: Value, rhs: Value) -> Result<Value> {
        evaluate_binary(op, |side| match side {
            Operand::Left => Ok(lhs.clone()),
            Operand::Right => Ok(rhs.clone()),
        })
    }

    #[test]
    fn compute_index_wraps_negative_indices() {
        assert_eq!(compute_index(0, 4), 0);
        assert_eq!(compute_index(3, 4), 3);
        assert_eq!(compute_index(-1, 4), 3);
        assert_eq!(compute_index(-4, 4), 0);
        assert_eq!(compute_index(4, 4), 4);
        assert_eq!(compute_index(-5, 4), 4);
        assert_eq!(compute_index(0, 0), 0);
    }

    #[test]
    fn arithmetic_coercion() {
        use BinaryOperation::*;
        assert_eq!(binary(Addition, Value::from(true), num(2.0)).unwrap(), num(3.0));
        assert_eq!(binary(Addition, num(1.0), Value::from("2")).unwrap(), num(3.0));
        assert_eq!(binary(Addition, Value::from("a"), Value::from("1")).unwrap(), Value::from("a1"));
        assert!(binary(Addition, num(1.0), Value::from("a")).is_err());
        assert!(binary(Addition, num(1.0), Value::null()).is_err());
        assert!(binary(Subtraction, Value::from("3"), Value::from("1")).is_err());
        assert_eq!(binary(Division, num(1.0), num(0.0)).unwrap(), num(f64::INFINITY));
        assert_eq!(binary(Modulus, num(3.0), num(-2.0)).unwrap(), num(1.0));
        assert!(binary(Multiplication, num(1.0), Value::undefined()).unwrap().is_undefined());
    }

    #[test]
    fn bitwise_coercion() {
        use BinaryOperation::*;
        assert_eq!(binary(BitwiseAnd, num(6.0), num(3.0)).unwrap(), num(2.0));
        assert_eq!(binary(BitwiseOr, Value::null(), Value::from("4")).unwrap(), num(4.0));
        assert_eq!(binary(BitwiseXOr, Value::from(true), num(3.0)).unwrap(), num(2.0));
        assert_eq!(binary(BitwiseShiftLeft, num(1.0), num(3.0)).unwrap(), num(8.0));
        assert_eq!(binary(BitwiseShiftRight, num(-8.0), num(1.0)).unwrap(), num(-4.0));
        assert_eq!(binary(BitwiseShiftLeft, num(1.0), num(64.0)).unwrap(), num(0.0));
        assert!(binary(BitwiseAnd, num(1.0), Value::from(ArrayType::new())).is_err());
    }

    #[test]
    fn logical_short_circuit() {
        let mut calls = 0;
        let result = evaluate_binary(BinaryOperation::LogicalAnd, |side| {
            calls += 1;
            match side {
                Operand::Left => Ok(Value::from(false)),
                Operand::Right => Err(ElError::evaluation("not reached")),
            }
        });
        assert_eq!(result.unwrap(), Value::from(false));
        assert_eq!(calls, 1);
        assert_eq!(binary(BinaryOperation::LogicalOr, Value::null(), Value::from(true)).unwrap(), Value::from(true));
        assert!(binary(BinaryOperation::LogicalOr, num(1.0), Value::from(true)).is_err());
        assert!(binary(BinaryOperation::LogicalAnd, Value::from(true), Value::undefined()).unwrap().is_undefined());
    }

    #[test]
    fn unary_operators() {
        assert_eq!(evaluate_unary(UnaryOperation::Minus, &Value::from("2")).unwrap(), num(-2.0));
        assert_eq!(evaluate_unary(UnaryOperation::Plus, &Value::from(true)).unwrap(), num(1.0));
        assert!(evaluate_unary(UnaryOperation::Minus, &Value::null()).is_err());
        assert!(evaluate_unary(UnaryOperation::LogicalNegation, &num(0.0)).is_err());
        assert_eq!(evaluate_unary(UnaryOperation::BitwiseNegation, &num(23423.8)).unwrap(), num(-23424.0));
        assert!(evaluate_unary(UnaryOperation::BitwiseNegation, &Value::from(true)).is_err());
        assert!(evaluate_unary(UnaryOperation::Minus, &Value::undefined()).unwrap().is_undefined());
    }

    #[test]
    fn string_subscript_skips_missing_positions_in_lists() {
        let ctx = EvaluationContext::default();
        let s = Value::from("asdf");
        let list = Value::from(vec![num(1.0), num(2.0), num(7.0)]);
        assert_eq!(evaluate_subscript(&ctx, &s, &list).unwrap(), Value::from("sd"));
    }

    #[test]
    fn array_subscript_list_past_end_is_out_of_bounds() {
        let ctx = EvaluationContext::default();
        let array = Value::from(vec![num(0.0), num(1.0), num(2.0), num(3.0)]);
        let list = Value::from(vec![num(1.0), num(7.0)]);
        let e = evaluate_subscript(&ctx, &array, &list).unwrap_err();
        assert!(matches!(e, ElError::IndexOutOfBounds { .. }), "{e}");

        let bounded = Value::from(RangeType::Bounded { first: 0, last: 5 });
        assert!(matches!(evaluate_subscript(&ctx, &array, &bounded), Err(ElError::IndexOutOfBounds { .. })));
        let right = Value::from(RangeType::RightBounded { last: 5 });
        assert!(matches!(evaluate_subscript(&ctx, &array, &right), Err(ElError::IndexOutOfBounds { .. })));

        let inside = Value::from(vec![num(3.0), num(-4.0)]);
        assert_eq!(evaluate_subscript(&ctx, &array, &inside).unwrap(), Value::from(vec![num(3.0), num(0.0)]));
    }

    #[test]
    fn subscript_error_uses_traced_location() {
        let mut ctx = EvaluationContext::new(VariableStore::new());
        let array = Value::from(vec![num(1.0)]);
        ctx.trace(&array, Some(FileLocation::new(12, 3)));
        let e = evaluate_subscript(&ctx, &array, &num(5.0)).unwrap_err();
        assert_eq!(e.to_string(), "At line 12, column 3: 5 is out of bounds for '[ 1 ]'");
    }

    #[test]
    fn subscript_key_list_requires_strings() {
        let ctx = EvaluationContext::default();
        let mut map = MapType::new();
        map.insert("a".into(), num(1.0));
        let map = Value::from(map);
        let keys = Value::from(vec![Value::from("a"), Value::from("b")]);
        let sub = evaluate_subscript(&ctx, &map, &keys).unwrap();
        assert_eq!(sub.keys().unwrap(), vec!["a"]);
        let bad = Value::from(vec![num(1.0)]);
        assert!(matches!(evaluate_subscript(&ctx, &map, &bad), Err(ElError::Conversion { .. })));
        assert!(matches!(evaluate_subscript(&ctx, &num(1.0), &num(0.0)), Err(ElError::Index { .. })));
    }
}
