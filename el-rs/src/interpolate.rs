//! `${...}` template interpolation.
//!
//! Host strings such as working-directory and tool-parameter templates embed
//! expressions that are evaluated and spliced into the surrounding text:
//!
//! | Sequence   | Meaning                                                  |
//! |------------|----------------------------------------------------------|
//! | `${expr}`  | Evaluate `expr` and substitute its value as a string     |
//! | `\$`       | Literal `$`                                              |
//! | other text | Copied through unchanged                                 |
//!
//! The substituted value is converted to a string first, so numbers and
//! booleans print in their canonical form while strings appear unquoted.
//! Values that have no string form (arrays, maps, `undefined`) are an error.

use tracing::debug;

use crate::context::{with_evaluation_context, EvaluationContext};
use crate::error::Result;
use crate::parser::{parse, ParseMode};
use crate::tokenizer::Tokenizer;
use crate::value::ValueType;
use crate::var::VariableStore;

/// Expand every `${...}` span in `text` against `context`.
pub fn interpolate(text: &str, context: &mut EvaluationContext<'_>) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut tokenizer = Tokenizer::new(text);

    while tokenizer.read_until_interpolation(&mut out) {
        let start = tokenizer.location();
        let node = parse(&mut tokenizer, ParseMode::Lenient)?;
        tokenizer.expect_char(b'}')?;

        let value = node.evaluate(context)?;
        let text = value.convert_to(ValueType::String)?;
        let text = text.string_value()?;
        debug!(%start, expression = %node, value = text, "interpolated span");
        out.push_str(text);
    }
    Ok(out)
}

/// [`interpolate`] against read-only bindings.
pub fn interpolate_with(text: &str, store: &VariableStore) -> Result<String> {
    with_evaluation_context(store, |context| interpolate(text, context))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ElError;
    use crate::value::Value;

    fn store() -> VariableStore {
        let mut store = VariableStore::new();
        store.declare("MAP_BASE_NAME", Value::from("e1m1")).unwrap();
        store.declare("WORK_DIR_PATH", Value::from("/tmp/maps")).unwrap();
        store.declare("skill", Value::from(2)).unwrap();
        store.declare("flags", Value::from(vec![Value::from(1), Value::from(2)])).unwrap();
        store
    }

    #[test]
    fn plain_text_is_unchanged() {
        assert_eq!(interpolate_with("qbsp -wadpath x", &store()).unwrap(), "qbsp -wadpath x");
        assert_eq!(interpolate_with("", &store()).unwrap(), "");
    }

    #[test]
    fn substitutes_variables() {
        let result = interpolate_with("${WORK_DIR_PATH}/${MAP_BASE_NAME}.bsp", &store()).unwrap();
        assert_eq!(result, "/tmp/maps/e1m1.bsp");
    }

    #[test]
    fn substitutes_expressions() {
        assert_eq!(interpolate_with("+skill ${skill + 1}", &store()).unwrap(), "+skill 3");
        assert_eq!(interpolate_with("${skill > 1}", &store()).unwrap(), "true");
        assert_eq!(interpolate_with("${ flags[1] }x", &store()).unwrap(), "2x");
    }

    #[test]
    fn escaped_dollar_is_literal() {
        assert_eq!(interpolate_with(r"\${skill} ${skill}", &store()).unwrap(), "${skill} 2");
        assert_eq!(interpolate_with("$5 costs $", &store()).unwrap(), "$5 costs $");
    }

    #[test]
    fn unterminated_span_is_a_parse_error() {
        let error = interpolate_with("${skill", &store()).unwrap_err();
        assert!(matches!(error, ElError::Parse { .. }), "{error}");
    }

    #[test]
    fn closing_brace_followed_by_host_brace() {
        assert_eq!(interpolate_with("{${skill}}", &store()).unwrap(), "{2}");
        assert_eq!(interpolate_with("${skill}}", &store()).unwrap(), "2}");
        assert_eq!(interpolate_with("${ skill }}}", &store()).unwrap(), "2}}");
        assert_eq!(interpolate_with("{${MAP_BASE_NAME}}.map", &store()).unwrap(), "{e1m1}.map");
    }

    #[test]
    fn containers_do_not_interpolate() {
        let error = interpolate_with("${flags}", &store()).unwrap_err();
        assert!(matches!(error, ElError::Conversion { .. }), "{error}");
        assert!(interpolate_with("${missing}", &store()).is_err());
    }

    #[test]
    fn uses_caller_context() {
        let mut context = EvaluationContext::new(store());
        context.declare_variable("extra", Value::from("!")).unwrap();
        assert_eq!(interpolate("${MAP_BASE_NAME}${extra}", &mut context).unwrap(), "e1m1!");
    }
}
