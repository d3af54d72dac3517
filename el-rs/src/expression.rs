//! Expression tree.
//!
//! The parser builds binary expressions strictly left to right; every
//! [`ExpressionNode::binary`] call then rotates the new node until each
//! operator binds no tighter than its operands. After construction, a node's
//! precedence is at most the precedence of its children, so a depth-first
//! evaluation applies operators in the right order.
//!
//! | Precedence | Operators              |
//! |-----------:|------------------------|
//! | 13         | every non-binary node  |
//! | 12         | `*` `/` `%`            |
//! | 11         | `+` `-`                |
//! | 10         | `<<` `>>`              |
//! | 9          | `<` `<=` `>` `>=`      |
//! | 8          | `==` `!=`              |
//! | 7 / 6 / 5  | `&` / `^` / `\|`       |
//! | 4 / 3      | `&&` / `\|\|`          |
//! | 2          | `..`                   |
//! | 1          | `->`                   |

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::location::FileLocation;
use crate::value::Value;

// ── Operators ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperation {
    Plus,
    Minus,
    LogicalNegation,
    BitwiseNegation,
    /// Parentheses; kept in the tree so errors point at the group.
    Group,
    /// `a..` inside a subscript.
    LeftBoundedRange,
    /// `..b` inside a subscript.
    RightBoundedRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperation {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    Modulus,
    LogicalAnd,
    LogicalOr,
    BitwiseAnd,
    BitwiseXOr,
    BitwiseOr,
    BitwiseShiftLeft,
    BitwiseShiftRight,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Equal,
    NotEqual,
    BoundedRange,
    Case,
}

const NON_BINARY_PRECEDENCE: u8 = 13;

impl BinaryOperation {
    pub fn precedence(self) -> u8 {
        use BinaryOperation::*;
        match self {
            Multiplication | Division | Modulus => 12,
            Addition | Subtraction => 11,
            BitwiseShiftLeft | BitwiseShiftRight => 10,
            Less | LessOrEqual | Greater | GreaterOrEqual => 9,
            Equal | NotEqual => 8,
            BitwiseAnd => 7,
            BitwiseXOr => 6,
            BitwiseOr => 5,
            LogicalAnd => 4,
            LogicalOr => 3,
            BoundedRange => 2,
            Case => 1,
        }
    }

    pub fn symbol(self) -> &'static str {
        use BinaryOperation::*;
        match self {
            Addition => "+",
            Subtraction => "-",
            Multiplication => "*",
            Division => "/",
            Modulus => "%",
            LogicalAnd => "&&",
            LogicalOr => "||",
            BitwiseAnd => "&",
            BitwiseXOr => "^",
            BitwiseOr => "|",
            BitwiseShiftLeft => "<<",
            BitwiseShiftRight => ">>",
            Less => "<",
            LessOrEqual => "<=",
            Greater => ">",
            GreaterOrEqual => ">=",
            Equal => "==",
            NotEqual => "!=",
            BoundedRange => "..",
            Case => "->",
        }
    }
}

// ── Expression ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    Variable(String),
    Array(Vec<ExpressionNode>),
    Map(IndexMap<String, ExpressionNode>),
    Unary(UnaryOperation, ExpressionNode),
    Binary(BinaryOperation, ExpressionNode, ExpressionNode),
    Subscript(ExpressionNode, ExpressionNode),
    Switch(Vec<ExpressionNode>),
}

/// An immutable, cheaply clonable tree node with an optional source location.
///
/// Equality compares structure only; locations are ignored.
#[derive(Debug, Clone)]
pub struct ExpressionNode {
    expression: Rc<Expression>,
    location: Option<FileLocation>,
}

impl ExpressionNode {
    pub fn new(expression: Expression, location: Option<FileLocation>) -> Self {
        ExpressionNode {
            expression: Rc::new(expression),
            location,
        }
    }

    pub fn literal(value: Value, location: Option<FileLocation>) -> Self {
        Self::new(Expression::Literal(value), location)
    }

    pub fn variable(name: impl Into<String>, location: Option<FileLocation>) -> Self {
        Self::new(Expression::Variable(name.into()), location)
    }

    pub fn array(elements: Vec<ExpressionNode>, location: Option<FileLocation>) -> Self {
        Self::new(Expression::Array(elements), location)
    }

    pub fn map(elements: IndexMap<String, ExpressionNode>, location: Option<FileLocation>) -> Self {
        Self::new(Expression::Map(elements), location)
    }

    pub fn unary(op: UnaryOperation, operand: ExpressionNode, location: Option<FileLocation>) -> Self {
        Self::new(Expression::Unary(op, operand), location)
    }

    /// Build `lhs op rhs` and restore the precedence order of the subtree.
    pub fn binary(
        op: BinaryOperation,
        lhs: ExpressionNode,
        rhs: ExpressionNode,
        location: Option<FileLocation>,
    ) -> Self {
        let parent = op.precedence();
        let lp = lhs.precedence();
        let rp = rhs.precedence();
        if parent <= lp.min(rp) {
            return Self::new(Expression::Binary(op, lhs, rhs), location);
        }

        if lp < rp {
            // rotate the left child up and push this operator into its right side
            let left = Rc::clone(&lhs.expression);
            if let Expression::Binary(left_op, left_lhs, left_rhs) = &*left {
                let pushed = Self::binary(op, left_rhs.clone(), rhs, location);
                return Self::new(Expression::Binary(*left_op, left_lhs.clone(), pushed), lhs.location);
            }
        } else {
            let right = Rc::clone(&rhs.expression);
            if let Expression::Binary(right_op, right_lhs, right_rhs) = &*right {
                let pushed = Self::binary(op, lhs, right_lhs.clone(), location);
                return Self::new(Expression::Binary(*right_op, pushed, right_rhs.clone()), rhs.location);
            }
        }
        Self::new(Expression::Binary(op, lhs, rhs), location)
    }

    pub fn subscript(lhs: ExpressionNode, rhs: ExpressionNode, location: Option<FileLocation>) -> Self {
        Self::new(Expression::Subscript(lhs, rhs), location)
    }

    pub fn switch(cases: Vec<ExpressionNode>, location: Option<FileLocation>) -> Self {
        Self::new(Expression::Switch(cases), location)
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn location(&self) -> Option<FileLocation> {
        self.location
    }

    pub fn is_literal(&self) -> bool {
        matches!(*self.expression, Expression::Literal(_))
    }

    pub fn precedence(&self) -> u8 {
        match &*self.expression {
            Expression::Binary(op, _, _) => op.precedence(),
            _ => NON_BINARY_PRECEDENCE,
        }
    }

    /// Source-like text that parses back to an equal tree.
    pub fn as_string(&self) -> String {
        self.to_string()
    }

    /// Visit this node and then its children, depth first, left to right.
    pub fn accept(&self, visitor: &mut impl FnMut(&ExpressionNode)) {
        visitor(self);
        match &*self.expression {
            Expression::Literal(_) | Expression::Variable(_) => {}
            Expression::Array(elements) | Expression::Switch(elements) => {
                for element in elements {
                    element.accept(visitor);
                }
            }
            Expression::Map(elements) => {
                for element in elements.values() {
                    element.accept(visitor);
                }
            }
            Expression::Unary(_, operand) => operand.accept(visitor),
            Expression::Binary(_, lhs, rhs) | Expression::Subscript(lhs, rhs) => {
                lhs.accept(visitor);
                rhs.accept(visitor);
            }
        }
    }
}

impl PartialEq for ExpressionNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.expression, &other.expression) || self.expression == other.expression
    }
}

impl fmt::Display for ExpressionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.expression, f)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(value) => write!(f, "{value}"),
            Expression::Variable(name) => f.write_str(name),
            Expression::Array(elements) => {
                f.write_str("[ ")?;
                write_list(f, elements.iter())?;
                f.write_str(" ]")
            }
            Expression::Map(elements) => {
                f.write_str("{ ")?;
                for (i, (key, element)) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {element}", Value::from(key.as_str()))?;
                }
                f.write_str(" }")
            }
            Expression::Unary(op, operand) => match op {
                UnaryOperation::Plus => write!(f, "+{operand}"),
                UnaryOperation::Minus => write!(f, "-{operand}"),
                UnaryOperation::LogicalNegation => write!(f, "!{operand}"),
                UnaryOperation::BitwiseNegation => write!(f, "~{operand}"),
                UnaryOperation::Group => write!(f, "( {operand} )"),
                UnaryOperation::LeftBoundedRange => write!(f, "{operand}.."),
                UnaryOperation::RightBoundedRange => write!(f, "..{operand}"),
            },
            Expression::Binary(BinaryOperation::BoundedRange, lhs, rhs) => write!(f, "{lhs}..{rhs}"),
            Expression::Binary(op, lhs, rhs) => write!(f, "{lhs} {} {rhs}", op.symbol()),
            Expression::Subscript(lhs, rhs) => write!(f, "{lhs}[{rhs}]"),
            Expression::Switch(cases) => {
                f.write_str("{{ ")?;
                write_list(f, cases.iter())?;
                f.write_str(" }}")
            }
        }
    }
}

fn write_list<'a>(f: &mut fmt::Formatter<'_>, items: impl Iterator<Item = &'a ExpressionNode>) -> fmt::Result {
    for (i, item) in items.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use BinaryOperation::*;

    fn lit(n: i32) -> ExpressionNode {
        ExpressionNode::literal(Value::from(n), None)
    }

    fn var(name: &str) -> ExpressionNode {
        ExpressionNode::variable(name, None)
    }

    fn bin(op: BinaryOperation, lhs: ExpressionNode, rhs: ExpressionNode) -> ExpressionNode {
        ExpressionNode::binary(op, lhs, rhs, None)
    }

    fn raw(op: BinaryOperation, lhs: ExpressionNode, rhs: ExpressionNode) -> ExpressionNode {
        ExpressionNode::new(Expression::Binary(op, lhs, rhs), None)
    }

    #[test]
    fn higher_precedence_on_the_right_is_pushed_down() {
        // parsed flat as (1 + 2) * 3
        let node = bin(Multiplication, bin(Addition, lit(1), lit(2)), lit(3));
        assert_eq!(node, raw(Addition, lit(1), raw(Multiplication, lit(2), lit(3))));
    }

    #[test]
    fn lower_precedence_on_the_right_stays() {
        let node = bin(Addition, bin(Multiplication, lit(1), lit(2)), lit(3));
        assert_eq!(node, raw(Addition, raw(Multiplication, lit(1), lit(2)), lit(3)));
    }

    #[test]
    fn equal_precedence_is_left_associative() {
        let node = bin(Subtraction, bin(Subtraction, lit(1), lit(2)), lit(3));
        assert_eq!(node, raw(Subtraction, raw(Subtraction, lit(1), lit(2)), lit(3)));
    }

    #[test]
    fn rebalance_descends_several_levels() {
        // flat: ((a -> 1) + 2) * 3  ==>  a -> (1 + (2 * 3))
        let flat = bin(Multiplication, bin(Addition, bin(Case, var("a"), lit(1)), lit(2)), lit(3));
        let expected = raw(Case, var("a"), raw(Addition, lit(1), raw(Multiplication, lit(2), lit(3))));
        assert_eq!(flat, expected);
    }

    #[test]
    fn precedence_of_nodes() {
        assert_eq!(lit(1).precedence(), 13);
        assert_eq!(raw(Case, lit(1), lit(2)).precedence(), 1);
        assert_eq!(raw(BitwiseShiftLeft, lit(1), lit(2)).precedence(), 10);
    }

    #[test]
    fn equality_ignores_location() {
        let a = ExpressionNode::literal(Value::from(1), Some(FileLocation::new(1, 1)));
        let b = ExpressionNode::literal(Value::from(1), Some(FileLocation::new(4, 2)));
        assert_eq!(a, b);
        assert_ne!(a, lit(2));
    }

    #[test]
    fn display() {
        let mut map = IndexMap::new();
        map.insert("x".to_string(), lit(1));
        assert_eq!(ExpressionNode::map(map, None).to_string(), r#"{ "x": 1 }"#);
        assert_eq!(ExpressionNode::array(vec![lit(1), var("a")], None).to_string(), "[ 1, a ]");
        assert_eq!(bin(BoundedRange, lit(1), lit(3)).to_string(), "1..3");
        assert_eq!(bin(Case, var("x"), lit(1)).to_string(), "x -> 1");
        assert_eq!(ExpressionNode::unary(UnaryOperation::Group, lit(1), None).to_string(), "( 1 )");
        assert_eq!(ExpressionNode::unary(UnaryOperation::RightBoundedRange, lit(2), None).to_string(), "..2");
        assert_eq!(ExpressionNode::subscript(var("x"), lit(0), None).to_string(), "x[0]");
        assert_eq!(ExpressionNode::switch(vec![var("a")], None).to_string(), "{{ a }}");
    }

    #[test]
    fn accept_is_preorder() {
        let node = bin(Addition, var("x"), ExpressionNode::subscript(var("y"), lit(1), None));
        let mut seen = Vec::new();
        node.accept(&mut |n| seen.push(n.as_string()));
        assert_eq!(seen, vec!["x + y[1]", "x", "y[1]", "y", "1"]);
    }
}
