//! Constant folding.
//!
//! [`ExpressionNode::optimize`] replaces every sub-tree whose leaves are all
//! literals with a single literal. Folding runs against an empty context, so
//! variables are never read; a sub-tree whose evaluation fails is kept as is
//! and reports its error when evaluated for real.

use tracing::debug;

use crate::context::EvaluationContext;
use crate::eval::{evaluate_binary, evaluate_subscript, evaluate_unary, Operand};
use crate::expression::{Expression, ExpressionNode};
use crate::value::{Value, ValueType};

impl ExpressionNode {
    pub fn optimize(&self) -> ExpressionNode {
        let mut context = EvaluationContext::default();
        let optimized = optimize_node(self, &mut context);
        debug!(folded = optimized.is_literal(), "optimized expression");
        optimized
    }
}

fn optimize_node(node: &ExpressionNode, context: &mut EvaluationContext<'_>) -> ExpressionNode {
    let location = node.location();
    let literal = |value: Value| ExpressionNode::literal(value, location);

    match node.expression() {
        Expression::Literal(_) | Expression::Variable(_) => node.clone(),

        Expression::Array(elements) => {
            let mut spliced = Vec::with_capacity(elements.len());
            for element in elements {
                splice_element(optimize_node(element, context), &mut spliced);
            }
            let elements = spliced;
            let optimized = ExpressionNode::array(elements, location);
            fold_if_literal(optimized, context, |e| match e {
                Expression::Array(elements) => elements.iter().all(ExpressionNode::is_literal),
                _ => false,
            })
        }

        Expression::Map(elements) => {
            let elements = elements
                .iter()
                .map(|(key, e)| (key.clone(), optimize_node(e, context)))
                .collect();
            let optimized = ExpressionNode::map(elements, location);
            fold_if_literal(optimized, context, |e| match e {
                Expression::Map(elements) => elements.values().all(ExpressionNode::is_literal),
                _ => false,
            })
        }

        Expression::Unary(op, operand) => {
            let operand = optimize_node(operand, context);
            if let Some(Ok(value)) = literal_value(&operand).map(|v| evaluate_unary(*op, &v)) {
                return literal(value);
            }
            ExpressionNode::unary(*op, operand, location)
        }

        Expression::Binary(op, lhs, rhs) => {
            let mut left = None;
            let mut right = None;
            let value = evaluate_binary(*op, |side| {
                let (source, slot) = match side {
                    Operand::Left => (lhs, &mut left),
                    Operand::Right => (rhs, &mut right),
                };
                let optimized: &ExpressionNode = slot.insert(optimize_node(source, context));
                optimized.evaluate(context)
            });
            let folds = |slot: &Option<ExpressionNode>| slot.as_ref().map_or(true, ExpressionNode::is_literal);
            if let (Ok(value), true, true) = (&value, folds(&left), folds(&right)) {
                return literal(value.clone());
            }
            let left = left.unwrap_or_else(|| optimize_node(lhs, context));
            let right = right.unwrap_or_else(|| optimize_node(rhs, context));
            ExpressionNode::new(Expression::Binary(*op, left, right), location)
        }

        Expression::Subscript(lhs, rhs) => {
            let lhs = optimize_node(lhs, context);
            let rhs = optimize_node(rhs, context);
            if let (Some(l), Some(r)) = (literal_value(&lhs), literal_value(&rhs)) {
                if let Ok(value) = evaluate_subscript(context, &l, &r) {
                    return literal(value);
                }
            }
            ExpressionNode::subscript(lhs, rhs, location)
        }

        Expression::Switch(cases) => {
            let mut optimized = Vec::with_capacity(cases.len());
            for case in cases {
                let case = optimize_node(case, context);
                match literal_value(&case) {
                    // a case that can never match
                    Some(value) if optimized.is_empty() && value.is_undefined() => {}
                    Some(value) if optimized.is_empty() => return literal(value),
                    _ => optimized.push(case),
                }
            }
            if optimized.is_empty() {
                return literal(Value::undefined());
            }
            ExpressionNode::switch(optimized, location)
        }
    }
}

/// Push an optimized array element, expanding a folded bounded range into
/// one literal per number so that the printed array reads back the same.
fn splice_element(element: ExpressionNode, out: &mut Vec<ExpressionNode>) {
    let range = match literal_value(&element) {
        Some(value) if value.has_type(&[ValueType::Range]) => value.convert_to(ValueType::Array).ok(),
        _ => None,
    };
    match range.as_ref().map(Value::array_value) {
        Some(Ok(numbers)) => {
            let location = element.location();
            out.extend(numbers.iter().map(|n| ExpressionNode::literal(n.clone(), location)));
        }
        _ => out.push(element),
    }
}

fn literal_value(node: &ExpressionNode) -> Option<Value> {
    match node.expression() {
        Expression::Literal(value) => Some(value.clone()),
        _ => None,
    }
}

fn fold_if_literal(
    node: ExpressionNode,
    context: &mut EvaluationContext<'_>,
    all_literal: impl Fn(&Expression) -> bool,
) -> ExpressionNode {
    if all_literal(node.expression()) {
        if let Ok(value) = node.evaluate(context) {
            return ExpressionNode::literal(value, node.location());
        }
    }
    node
}

// ── Tests ─────────────────────────────────────────────────────────────────────
