//! Per-evaluation state: variable bindings plus a trace of where each
//! evaluated value came from.
//!
//! The trace lets errors raised far away from the source text (for example an
//! out-of-bounds subscript on an array that was bound to a variable) point at
//! the expression that produced the offending value.

use std::borrow::Cow;
use std::collections::HashMap;

use crate::error::Result;
use crate::location::FileLocation;
use crate::value::Value;
use crate::var::VariableStore;

#[derive(Debug, Default)]
pub struct EvaluationContext<'a> {
    store: Cow<'a, VariableStore>,
    /// Keyed by value identity; the stored clone keeps the identity alive.
    trace: HashMap<usize, (Value, FileLocation)>,
}

impl EvaluationContext<'static> {
    /// A context that owns its bindings.
    pub fn new(store: VariableStore) -> Self {
        EvaluationContext {
            store: Cow::Owned(store),
            trace: HashMap::new(),
        }
    }
}

impl<'a> EvaluationContext<'a> {
    /// A context reading `store` in place; the bindings are copied only if a
    /// variable is declared or assigned through this context.
    pub fn borrowed(store: &'a VariableStore) -> Self {
        EvaluationContext {
            store: Cow::Borrowed(store),
            trace: HashMap::new(),
        }
    }

    pub fn store(&self) -> &VariableStore {
        &self.store
    }

    pub fn variable_value(&self, name: &str) -> Value {
        self.store.lookup(name)
    }

    pub fn declare_variable(&mut self, name: impl Into<String>, value: Value) -> Result<()> {
        self.store.to_mut().declare(name, value)
    }

    pub fn assign_variable(&mut self, name: &str, value: Value) -> Result<()> {
        self.store.to_mut().assign(name, value)
    }

    /// Record that `value` was produced at `location`. The first record wins,
    /// so a value passed through a group or a variable keeps its origin.
    pub fn trace(&mut self, value: &Value, location: Option<FileLocation>) {
        if let Some(location) = location {
            self.trace
                .entry(value.identity())
                .or_insert_with(|| (value.clone(), location));
        }
    }

    /// Where `value` was produced, if it was produced during this evaluation.
    pub fn location(&self, value: &Value) -> Option<FileLocation> {
        self.trace.get(&value.identity()).map(|(_, location)| *location)
    }
}

/// Run `f` against a fresh context over read-only `store`.
///
/// Used for re-entrant evaluation, e.g. when a value fetched during one
/// evaluation is itself a template that must be interpolated.
pub fn with_evaluation_context<R>(
    store: &VariableStore,
    f: impl FnOnce(&mut EvaluationContext<'_>) -> R,
) -> R {
    let mut context = EvaluationContext::borrowed(store);
    f(&mut context)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
