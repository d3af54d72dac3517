//! Variable bindings visible to an evaluation.
//!
//! Names are declared once and may then be reassigned; looking up a name that
//! was never declared yields [`Value::undefined`] rather than an error.

use indexmap::IndexMap;

use crate::error::{ElError, Result};
use crate::value::{MapType, Value};

/// Name → value binding table backing an [`EvaluationContext`](crate::EvaluationContext).
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    vars: IndexMap<String, Value>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a new name. Fails if `name` is already declared.
    pub fn declare(&mut self, name: impl Into<String>, value: Value) -> Result<()> {
        let name = name.into();
        if self.vars.contains_key(&name) {
            return Err(ElError::AlreadyDeclared(name));
        }
        self.vars.insert(name, value);
        Ok(())
    }

    /// Rebind a declared name. Fails if `name` was never declared.
    pub fn assign(&mut self, name: &str, value: Value) -> Result<()> {
        match self.vars.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(ElError::Undeclared(name.to_string())),
        }
    }

    /// The bound value, or `Undefined` if `name` is not declared.
    pub fn lookup(&self, name: &str) -> Value {
        self.vars.get(name).cloned().unwrap_or_else(Value::undefined)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Declared names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.vars.iter()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl From<MapType> for VariableStore {
    fn from(vars: MapType) -> Self {
        VariableStore { vars }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
