//! Error taxonomy shared by the tokenizer, parser and evaluator.
//!
//! | Variant            | Raised by                                             |
//! |--------------------|-------------------------------------------------------|
//! | `Parse`            | tokenizer and parser; always carries a location       |
//! | `Conversion`       | [`Value::convert_to`](crate::Value::convert_to)       |
//! | `Dereference`      | typed accessors such as `array_value()`               |
//! | `Evaluation`       | operators applied to unsupported operand kinds        |
//! | `Index`            | subscripts with an index of the wrong shape          |
//! | `IndexOutOfBounds` | single-index subscripts past the end of the value     |
//! | `AlreadyDeclared` / `Undeclared` | [`VariableStore`](crate::VariableStore) misuse |
//!
//! `Evaluation`, `Index` and `IndexOutOfBounds` form the evaluation family; see
//! [`ElError::is_evaluation_error`].

use thiserror::Error;

use crate::location::FileLocation;
use crate::value::ValueType;

pub type Result<T> = std::result::Result<T, ElError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ElError {
    #[error("At {location}: {message}")]
    Parse {
        location: FileLocation,
        message: String,
    },

    #[error("{}Cannot convert value '{value}' of type '{from}' to type '{to}'", at(.location))]
    Conversion {
        location: Option<FileLocation>,
        value: String,
        from: ValueType,
        to: ValueType,
    },

    #[error("{}Cannot dereference value '{value}' of type '{actual}' as type '{requested}'", at(.location))]
    Dereference {
        location: Option<FileLocation>,
        value: String,
        actual: ValueType,
        requested: ValueType,
    },

    #[error("{}{}{message}", at(.location), subject(.expression))]
    Evaluation {
        location: Option<FileLocation>,
        expression: Option<String>,
        message: String,
    },

    #[error("{}Cannot index value '{value}' of type '{value_type}' with '{index}' of type '{index_type}'", at(.location))]
    Index {
        location: Option<FileLocation>,
        value: String,
        value_type: ValueType,
        index: String,
        index_type: ValueType,
    },

    #[error("{}{index} is out of bounds for '{value}'", at(.location))]
    IndexOutOfBounds {
        location: Option<FileLocation>,
        value: String,
        index: String,
    },

    #[error("Variable '{0}' is already declared")]
    AlreadyDeclared(String),

    #[error("Cannot assign to undeclared variable '{0}'")]
    Undeclared(String),
}

fn at(location: &Option<FileLocation>) -> String {
    match location {
        Some(location) => format!("At {location}: "),
        None => String::new(),
    }
}

fn subject(expression: &Option<String>) -> String {
    match expression {
        Some(expression) => format!("Cannot evaluate expression '{expression}': "),
        None => String::new(),
    }
}

impl ElError {
    pub fn parse(location: FileLocation, message: impl Into<String>) -> Self {
        ElError::Parse {
            location,
            message: message.into(),
        }
    }

    /// An operator failure not yet attributed to an expression; the evaluator
    /// attaches the expression text and location on the way out.
    pub fn evaluation(message: impl Into<String>) -> Self {
        ElError::Evaluation {
            location: None,
            expression: None,
            message: message.into(),
        }
    }

    pub fn location(&self) -> Option<FileLocation> {
        match self {
            ElError::Parse { location, .. } => Some(*location),
            ElError::Conversion { location, .. }
            | ElError::Dereference { location, .. }
            | ElError::Evaluation { location, .. }
            | ElError::Index { location, .. }
            | ElError::IndexOutOfBounds { location, .. } => *location,
            ElError::AlreadyDeclared(_) | ElError::Undeclared(_) => None,
        }
    }

    /// True for `Evaluation` and its refinements `Index` and `IndexOutOfBounds`.
    pub fn is_evaluation_error(&self) -> bool {
        matches!(
            self,
            ElError::Evaluation { .. } | ElError::Index { .. } | ElError::IndexOutOfBounds { .. }
        )
    }

    /// Fill in a missing location, keeping any location already recorded.
    pub fn or_location(mut self, fallback: Option<FileLocation>) -> Self {
        match &mut self {
            ElError::Conversion { location, .. }
            | ElError::Dereference { location, .. }
            | ElError::Evaluation { location, .. }
            | ElError::Index { location, .. }
            | ElError::IndexOutOfBounds { location, .. } => {
                if location.is_none() {
                    *location = fallback;
                }
            }
            ElError::Parse { .. } | ElError::AlreadyDeclared(_) | ElError::Undeclared(_) => {}
        }
        self
    }

    /// Attribute this error to the expression `expression` found at `location`.
    ///
    /// Conversion and dereference failures become evaluation errors that quote
    /// the underlying message. Errors already attributed to an inner expression
    /// are passed through so that the innermost failing expression is reported.
    pub fn in_expression(self, expression: &str, location: Option<FileLocation>) -> Self {
        match self {
            ElError::Evaluation {
                location: inner,
                expression: None,
                message,
            } => ElError::Evaluation {
                location: inner.or(location),
                expression: Some(expression.to_string()),
                message,
            },
            e @ (ElError::Conversion { .. } | ElError::Dereference { .. }) => ElError::Evaluation {
                location: e.location().or(location),
                expression: Some(expression.to_string()),
                message: e.clone().without_location().to_string(),
            },
            e => e.or_location(location),
        }
    }

    fn without_location(mut self) -> Self {
        match &mut self {
            ElError::Conversion { location, .. }
            | ElError::Dereference { location, .. }
            | ElError::Evaluation { location, .. }
            | ElError::Index { location, .. }
            | ElError::IndexOutOfBounds { location, .. } => *location = None,
            ElError::Parse { .. } | ElError::AlreadyDeclared(_) | ElError::Undeclared(_) => {}
        }
        self
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
