//! Binding-file loader.
//!
//! A binding file declares the variables an expression is evaluated against,
//! one per line:
//!
//! | Line                 | Action                                           |
//! |----------------------|--------------------------------------------------|
//! | `name = <expression>` | evaluate the expression and declare `name`      |
//! | `// …` or `; …`      | comment, ignored                                 |
//! | blank                | ignored                                          |
//!
//! Expressions may refer to names declared on earlier lines. A line that
//! fails is reported and skipped; loading always continues.

use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::context::EvaluationContext;
use crate::parser::{parse, ParseMode};
use crate::tokenizer::{TokenType, Tokenizer};
use crate::var::VariableStore;

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading a binding file.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}: {message}")]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

/// Variables loaded from a binding file.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    vars: VariableStore,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse binding definitions from a string.
    ///
    /// Returns the bindings that loaded and the errors of every line that
    /// did not.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut context = EvaluationContext::new(VariableStore::new());
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with("//") || line.starts_with(';') {
                continue;
            }

            if let Err(message) = load_binding(raw, lineno, &mut context) {
                debug!(line = lineno, %message, "skipping binding");
                errors.push(ConfigError { line: lineno, message });
            }
        }

        let vars = context.store().clone();
        (Self { vars }, errors)
    }

    /// Read and parse a binding file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }

    pub fn store(&self) -> &VariableStore {
        &self.vars
    }

    pub fn into_store(self) -> VariableStore {
        self.vars
    }
}

// ── Line parsing ──────────────────────────────────────────────────────────────

/// Declare the binding on one `name = expression` line.
fn load_binding(line: &str, lineno: usize, context: &mut EvaluationContext<'_>) -> Result<(), String> {
    let mut tokenizer = Tokenizer::with_location(line, lineno, 1);
    let name = tokenizer.expect_token(TokenType::NAME).map_err(|e| e.to_string())?;
    tokenizer.expect_token(TokenType::ASSIGN).map_err(|e| e.to_string())?;

    let expression = parse(&mut tokenizer, ParseMode::Strict).map_err(|e| e.to_string())?;
    let value = expression.evaluate(context).map_err(|e| e.to_string())?;
    if value.is_undefined() {
        return Err(format!("'{}' evaluates to undefined", name.data()));
    }
    context.declare_variable(name.data(), value).map_err(|e| e.to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::io::Write;

    #[test]
    fn simple_bindings() {
        let (bindings, errors) = Bindings::load_str("spawnflags = 1\nmodel = \"progs/player.mdl\"\n");
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(bindings.store().lookup("spawnflags"), Value::from(1));
        assert_eq!(bindings.store().lookup("model"), Value::from("progs/player.mdl"));
    }

    #[test]
    fn comments_and_blank_lines_ignored() {
        let src = "// header\n; old style comment\n\n   \nx = 2\n";
        let (bindings, errors) = Bindings::load_str(src);
        assert!(errors.is_empty());
        assert_eq!(bindings.store().len(), 1);
    }

    #[test]
    fn later_lines_see_earlier_bindings() {
        let src = "base = 10\ndouble = base * 2\nnames = [ 'a', 'b' ] + [ 'c' ]\n";
        let (bindings, errors) = Bindings::load_str(src);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(bindings.store().lookup("double"), Value::from(20));
        assert_eq!(bindings.store().lookup("names").length(), 3);
    }

    #[test]
    fn errors_are_reported_and_skipped() {
        let src = "a = 1\nb = 1 +\nc = 'x' - 1\na = 2\n= 3\nd = missing\ne = a\n";
        let (bindings, errors) = Bindings::load_str(src);
        let lines: Vec<usize> = errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![2, 3, 4, 5, 6]);
        assert_eq!(bindings.store().lookup("a"), Value::from(1));
        assert_eq!(bindings.store().lookup("e"), Value::from(1));
        assert!(!bindings.store().contains("b"));
    }

    #[test]
    fn parse_errors_carry_file_position() {
        let (_, errors) = Bindings::load_str("x = 1\ny = [1, 2\n");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.starts_with("At line 2, column"), "{}", errors[0]);
        assert!(errors[0].to_string().starts_with("line 2: "));
    }

    #[test]
    fn config_error_is_a_std_error() {
        let error = ConfigError { line: 7, message: "'x' evaluates to undefined".into() };
        assert_eq!(error.to_string(), "line 7: 'x' evaluates to undefined");
        let boxed: Box<dyn std::error::Error> = Box::new(error);
        assert!(boxed.source().is_none());
    }

    #[test]
    fn load_file_roundtrip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "skill = 3").unwrap();
        writeln!(file, "hard = skill > 2").unwrap();
        let (bindings, errors) = Bindings::load_file(file.path()).unwrap();
        assert!(errors.is_empty());
        assert_eq!(bindings.into_store().lookup("hard"), Value::from(true));
    }

    #[test]
    fn load_file_missing_is_io_error() {
        assert!(Bindings::load_file(Path::new("/nonexistent/bindings.el")).is_err());
    }
}
