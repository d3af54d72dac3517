//! Embedded expression language.
//!
//! Entity definition files and compilation profiles describe models, skins
//! and paths with small dynamically typed expressions:
//!
//! ```text
//! {{ spawnflags & 1 -> "maps/b_shell1.bsp", "maps/b_shell0.bsp" }}
//! ${WORK_DIR_PATH}/${MAP_BASE_NAME}.bsp
//! ```
//!
//! | Stage        | Entry point                                              |
//! |--------------|----------------------------------------------------------|
//! | tokenize     | [`Tokenizer`]                                            |
//! | parse        | [`parse_strict`], [`parse_lenient`], [`parse_model_definition`] |
//! | fold         | [`ExpressionNode::optimize`]                             |
//! | evaluate     | [`ExpressionNode::evaluate`], [`ExpressionNode::try_evaluate`] |
//! | interpolate  | [`interpolate()`], [`interpolate_with`]                  |
//! | bind         | [`VariableStore`], [`Bindings`]                          |

pub mod config;
pub mod context;
pub mod error;
pub mod eval;
pub mod expression;
pub mod interpolate;
pub mod legacy;
pub mod location;
pub mod optimize;
pub mod parser;
pub mod tokenizer;
pub mod value;
pub mod var;

pub use config::{Bindings, ConfigError};
pub use context::{with_evaluation_context, EvaluationContext};
pub use error::{ElError, Result};
pub use expression::{BinaryOperation, Expression, ExpressionNode, UnaryOperation};
pub use interpolate::{interpolate, interpolate_with};
pub use legacy::{parse_model_definition, parse_with_legacy_fallback};
pub use location::FileLocation;
pub use parser::{parse, parse_lenient, parse_strict, ParseMode};
pub use tokenizer::{Token, TokenType, Tokenizer};
pub use value::{ArrayType, MapType, RangeType, Value, ValueKind, ValueType};
pub use var::VariableStore;
