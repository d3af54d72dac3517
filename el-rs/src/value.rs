//! Runtime values of the expression language.
//!
//! A [`Value`] is an immutable, reference-counted handle onto a [`ValueKind`].
//! Cloning a value is cheap; "modifying" operators always build a new value.
//!
//! | Kind        | Converts to                                              |
//! |-------------|----------------------------------------------------------|
//! | `Boolean`   | Boolean, String (`"true"`/`"false"`), Number (1/0)       |
//! | `String`    | Boolean, String, Number (leading numeric text)           |
//! | `Number`    | Boolean (non-zero), String, Number                       |
//! | `Array`     | Array                                                    |
//! | `Map`       | Map                                                      |
//! | `Range`     | Range; a bounded range also converts to Array            |
//! | `Null`      | Boolean, String, Number, Array, Map, Null (all empty)    |
//! | `Undefined` | Undefined                                                |

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::context::EvaluationContext;
use crate::error::{ElError, Result};

pub type ArrayType = Vec<Value>;
pub type MapType = IndexMap<String, Value>;

// ── ValueType ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Boolean,
    String,
    Number,
    Array,
    Map,
    Range,
    Null,
    Undefined,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Boolean => "Boolean",
            ValueType::String => "String",
            ValueType::Number => "Number",
            ValueType::Array => "Array",
            ValueType::Map => "Map",
            ValueType::Range => "Range",
            ValueType::Null => "Null",
            ValueType::Undefined => "Undefined",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── RangeType ─────────────────────────────────────────────────────────────────

/// An inclusive integer sequence.
///
/// Open-ended ranges only occur as subscripts; they are resolved against the
/// length of the subscripted value: `a..` runs from `a` to the last index and
/// `..b` runs from the last index to `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeType {
    LeftBounded { first: i64 },
    RightBounded { last: i64 },
    Bounded { first: i64, last: i64 },
}

impl RangeType {
    /// First and last element once resolved against `size` indexable elements.
    pub fn bounds(self, size: usize) -> (i64, i64) {
        let last_index = size as i64 - 1;
        match self {
            RangeType::LeftBounded { first } => (first, last_index),
            RangeType::RightBounded { last } => (last_index, last),
            RangeType::Bounded { first, last } => (first, last),
        }
    }

    /// Element count, saturating at `usize::MAX`.
    pub fn len(self, size: usize) -> usize {
        let (first, last) = self.bounds(size);
        usize::try_from(first.abs_diff(last)).unwrap_or(usize::MAX).saturating_add(1)
    }

    pub fn iter(self, size: usize) -> RangeIter {
        let (first, last) = self.bounds(size);
        RangeIter::new(first, last)
    }
}

/// Steps from `first` to `last` inclusive, ascending or descending.
#[derive(Debug, Clone)]
pub struct RangeIter {
    current: i64,
    last: i64,
    done: bool,
}

impl RangeIter {
    pub fn new(first: i64, last: i64) -> Self {
        RangeIter {
            current: first,
            last,
            done: false,
        }
    }
}

impl Iterator for RangeIter {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        if self.done {
            return None;
        }
        let value = self.current;
        match self.current.cmp(&self.last) {
            Ordering::Less => self.current += 1,
            Ordering::Greater => self.current -= 1,
            Ordering::Equal => self.done = true,
        }
        Some(value)
    }
}

// ── Value ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    Boolean(bool),
    String(String),
    Number(f64),
    Array(ArrayType),
    Map(MapType),
    Range(RangeType),
    Null,
    Undefined,
}

/// An EL runtime value.
#[derive(Clone)]
pub struct Value(Rc<ValueKind>);

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Value(Rc::new(kind))
    }

    pub fn null() -> Self {
        Value::new(ValueKind::Null)
    }

    pub fn undefined() -> Self {
        Value::new(ValueKind::Undefined)
    }

    pub fn kind(&self) -> &ValueKind {
        &self.0
    }

    /// Address of the shared payload; stable for as long as any clone lives.
    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub fn value_type(&self) -> ValueType {
        match self.kind() {
            ValueKind::Boolean(_) => ValueType::Boolean,
            ValueKind::String(_) => ValueType::String,
            ValueKind::Number(_) => ValueType::Number,
            ValueKind::Array(_) => ValueType::Array,
            ValueKind::Map(_) => ValueType::Map,
            ValueKind::Range(_) => ValueType::Range,
            ValueKind::Null => ValueType::Null,
            ValueKind::Undefined => ValueType::Undefined,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.value_type().name()
    }

    pub fn has_type(&self, types: &[ValueType]) -> bool {
        types.contains(&self.value_type())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self.kind(), ValueKind::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind(), ValueKind::Null)
    }

    // ── Typed accessors ───────────────────────────────────────────────────────
    //
    // `Null` dereferences to the empty value of every kind except Range.

    fn dereference_error(&self, requested: ValueType) -> ElError {
        ElError::Dereference {
            location: None,
            value: self.describe(),
            actual: self.value_type(),
            requested,
        }
    }

    pub fn boolean_value(&self) -> Result<bool> {
        match self.kind() {
            ValueKind::Boolean(b) => Ok(*b),
            ValueKind::Null => Ok(false),
            _ => Err(self.dereference_error(ValueType::Boolean)),
        }
    }

    pub fn string_value(&self) -> Result<&str> {
        match self.kind() {
            ValueKind::String(s) => Ok(s),
            ValueKind::Null => Ok(""),
            _ => Err(self.dereference_error(ValueType::String)),
        }
    }

    pub fn number_value(&self) -> Result<f64> {
        match self.kind() {
            ValueKind::Number(n) => Ok(*n),
            ValueKind::Null => Ok(0.0),
            _ => Err(self.dereference_error(ValueType::Number)),
        }
    }

    /// The number value truncated towards zero.
    pub fn integer_value(&self) -> Result<i64> {
        Ok(self.number_value()? as i64)
    }

    pub fn array_value(&self) -> Result<&[Value]> {
        match self.kind() {
            ValueKind::Array(a) => Ok(a),
            ValueKind::Null => Ok(&[]),
            _ => Err(self.dereference_error(ValueType::Array)),
        }
    }

    pub fn map_value(&self) -> Result<Cow<'_, MapType>> {
        match self.kind() {
            ValueKind::Map(m) => Ok(Cow::Borrowed(m)),
            ValueKind::Null => Ok(Cow::Owned(MapType::new())),
            _ => Err(self.dereference_error(ValueType::Map)),
        }
    }

    pub fn range_value(&self) -> Result<RangeType> {
        match self.kind() {
            ValueKind::Range(r) => Ok(*r),
            _ => Err(self.dereference_error(ValueType::Range)),
        }
    }

    /// Number of elements; scalars count as one, `Null` and `Undefined` as zero.
    pub fn length(&self) -> usize {
        match self.kind() {
            ValueKind::Boolean(_) | ValueKind::Number(_) => 1,
            ValueKind::String(s) => s.chars().count(),
            ValueKind::Array(a) => a.len(),
            ValueKind::Map(m) => m.len(),
            ValueKind::Range(r @ RangeType::Bounded { .. }) => r.len(0),
            ValueKind::Range(_) => 0,
            ValueKind::Null | ValueKind::Undefined => 0,
        }
    }

    /// Elements of an array converted to strings.
    pub fn as_string_list(&self) -> Result<Vec<String>> {
        self.array_value()?
            .iter()
            .map(|v| Ok(v.convert_to(ValueType::String)?.string_value()?.to_string()))
            .collect()
    }

    pub fn as_string_set(&self) -> Result<BTreeSet<String>> {
        Ok(self.as_string_list()?.into_iter().collect())
    }

    // ── Conversion ────────────────────────────────────────────────────────────

    pub fn convertible_to(&self, to: ValueType) -> bool {
        self.try_convert_to(to).is_some()
    }

    pub fn try_convert_to(&self, to: ValueType) -> Option<Value> {
        self.convert_to(to).ok()
    }

    pub fn convert_to(&self, to: ValueType) -> Result<Value> {
        if self.value_type() == to {
            return Ok(self.clone());
        }
        let converted = match (self.kind(), to) {
            (ValueKind::Boolean(b), ValueType::String) => Some(Value::from(if *b { "true" } else { "false" })),
            (ValueKind::Boolean(b), ValueType::Number) => Some(Value::from(if *b { 1.0 } else { 0.0 })),

            (ValueKind::String(s), ValueType::Boolean) => {
                Some(Value::from(!(s.is_empty() || s.eq_ignore_ascii_case("false"))))
            }
            (ValueKind::String(s), ValueType::Number) => parse_number(s).map(Value::from),

            (ValueKind::Number(n), ValueType::Boolean) => Some(Value::from(*n != 0.0)),
            (ValueKind::Number(_), ValueType::String) => Some(Value::from(self.describe())),

            (ValueKind::Range(RangeType::Bounded { first, last }), ValueType::Array) => {
                Some(Value::from(RangeIter::new(*first, *last).map(|i| Value::from(i as f64)).collect::<ArrayType>()))
            }

            (ValueKind::Null, ValueType::Boolean) => Some(Value::from(false)),
            (ValueKind::Null, ValueType::String) => Some(Value::from("")),
            (ValueKind::Null, ValueType::Number) => Some(Value::from(0.0)),
            (ValueKind::Null, ValueType::Array) => Some(Value::from(ArrayType::new())),
            (ValueKind::Null, ValueType::Map) => Some(Value::from(MapType::new())),

            _ => None,
        };
        converted.ok_or_else(|| ElError::Conversion {
            location: None,
            value: self.describe(),
            from: self.value_type(),
            to,
        })
    }

    // ── Textual form ──────────────────────────────────────────────────────────

    /// Single-line canonical form: strings are quoted, containers bracketed.
    pub fn describe(&self) -> String {
        self.as_string(false)
    }

    /// Canonical form; `multiline` puts each container element on its own
    /// tab-indented line.
    pub fn as_string(&self, multiline: bool) -> String {
        let mut out = String::new();
        self.append_to(&mut out, multiline, "");
        out
    }

    fn append_to(&self, out: &mut String, multiline: bool, indent: &str) {
        match self.kind() {
            ValueKind::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
            ValueKind::String(s) => push_quoted(out, s),
            ValueKind::Number(n) => out.push_str(&describe_number(*n)),
            ValueKind::Array(a) if a.is_empty() => out.push_str("[]"),
            ValueKind::Array(a) => {
                let child_indent = format!("{indent}\t");
                open(out, '[', multiline);
                for (i, item) in a.iter().enumerate() {
                    if multiline {
                        out.push_str(&child_indent);
                    }
                    item.append_to(out, multiline, &child_indent);
                    separate(out, i + 1 < a.len(), multiline);
                }
                close(out, ']', multiline, indent);
            }
            ValueKind::Map(m) if m.is_empty() => out.push_str("{}"),
            ValueKind::Map(m) => {
                let child_indent = format!("{indent}\t");
                open(out, '{', multiline);
                for (i, (key, item)) in m.iter().enumerate() {
                    if multiline {
                        out.push_str(&child_indent);
                    }
                    push_quoted(out, key);
                    out.push_str(": ");
                    item.append_to(out, multiline, &child_indent);
                    separate(out, i + 1 < m.len(), multiline);
                }
                close(out, '}', multiline, indent);
            }
            ValueKind::Range(r) => {
                let text = match r {
                    RangeType::LeftBounded { first } => format!("[{first}..]"),
                    RangeType::RightBounded { last } => format!("[..{last}]"),
                    RangeType::Bounded { first, last } => format!("[{first}..{last}]"),
                };
                out.push_str(&text);
            }
            ValueKind::Null => out.push_str("null"),
            ValueKind::Undefined => out.push_str("undefined"),
        }
    }

    // ── Ordering ──────────────────────────────────────────────────────────────

    /// Total comparison used by the relational operators.
    ///
    /// Scalars compare after coercion (Boolean wins over Number, Number over
    /// String); arrays and maps compare lexicographically; `Null` and
    /// `Undefined` sort below every other value. Any other pairing fails.
    pub fn compare(&self, rhs: &Value) -> Result<Ordering> {
        use ValueKind as K;
        match (self.kind(), rhs.kind()) {
            (K::Null, K::Null) | (K::Undefined, K::Undefined) => Ok(Ordering::Equal),
            (K::Null | K::Undefined, _) => Ok(Ordering::Less),
            (_, K::Null | K::Undefined) => Ok(Ordering::Greater),

            (K::Boolean(l), K::Boolean(_) | K::Number(_) | K::String(_)) => {
                Ok(l.cmp(&rhs.convert_to(ValueType::Boolean)?.boolean_value()?))
            }
            (K::Number(_) | K::String(_), K::Boolean(r)) => {
                Ok(self.convert_to(ValueType::Boolean)?.boolean_value()?.cmp(r))
            }
            (K::String(l), K::String(r)) => Ok(l.cmp(r)),
            (K::Number(_) | K::String(_), K::Number(_) | K::String(_)) => {
                let l = self.convert_to(ValueType::Number)?.number_value()?;
                let r = rhs.convert_to(ValueType::Number)?.number_value()?;
                Ok(l.partial_cmp(&r).unwrap_or(Ordering::Equal))
            }

            (K::Array(l), K::Array(r)) => compare_arrays(l, r),
            (K::Map(l), K::Map(r)) => compare_maps(l, r),
            (K::Range(RangeType::Bounded { .. }), K::Array(_) | K::Range(RangeType::Bounded { .. }))
            | (K::Array(_), K::Range(RangeType::Bounded { .. })) => {
                let l = self.convert_to(ValueType::Array)?;
                let r = rhs.convert_to(ValueType::Array)?;
                compare_arrays(l.array_value()?, r.array_value()?)
            }

            _ => Err(ElError::evaluation(format!(
                "Cannot compare values of types {} and {}",
                self.type_name(),
                rhs.type_name()
            ))),
        }
    }

    // ── Element access ────────────────────────────────────────────────────────

    pub fn contains(&self, index: usize) -> bool {
        matches!(self.kind(), ValueKind::String(_) | ValueKind::Array(_)) && index < self.length()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        matches!(self.kind(), ValueKind::Map(m) if m.contains_key(key))
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self.map_value()?.keys().cloned().collect())
    }

    /// Element `index` of a string or array; errors are located at the place
    /// `context` recorded for this value.
    pub fn at(&self, context: &EvaluationContext, index: usize) -> Result<Value> {
        self.at_or(index)
            .map_err(|e| e.or_location(context.location(self)))?
            .ok_or_else(|| ElError::IndexOutOfBounds {
                location: context.location(self),
                value: self.describe(),
                index: index.to_string(),
            })
    }

    pub fn at_or_default(&self, context: &EvaluationContext, index: usize, default: Value) -> Result<Value> {
        self.at_or(index)
            .map(|v| v.unwrap_or(default))
            .map_err(|e| e.or_location(context.location(self)))
    }

    fn at_or(&self, index: usize) -> Result<Option<Value>> {
        match self.kind() {
            ValueKind::String(s) => Ok(s.chars().nth(index).map(|c| Value::from(c.to_string()))),
            ValueKind::Array(a) => Ok(a.get(index).cloned()),
            _ => Err(ElError::Index {
                location: None,
                value: self.describe(),
                value_type: self.value_type(),
                index: index.to_string(),
                index_type: ValueType::Number,
            }),
        }
    }

    pub fn at_key(&self, context: &EvaluationContext, key: &str) -> Result<Value> {
        self.at_key_or(key)
            .map_err(|e| e.or_location(context.location(self)))?
            .ok_or_else(|| ElError::IndexOutOfBounds {
                location: context.location(self),
                value: self.describe(),
                index: Value::from(key).describe(),
            })
    }

    pub fn at_key_or_default(&self, context: &EvaluationContext, key: &str, default: Value) -> Result<Value> {
        self.at_key_or(key)
            .map(|v| v.unwrap_or(default))
            .map_err(|e| e.or_location(context.location(self)))
    }

    fn at_key_or(&self, key: &str) -> Result<Option<Value>> {
        match self.kind() {
            ValueKind::Map(m) => Ok(m.get(key).cloned()),
            _ => Err(ElError::Index {
                location: None,
                value: self.describe(),
                value_type: self.value_type(),
                index: Value::from(key).describe(),
                index_type: ValueType::String,
            }),
        }
    }
}

/// Double-quoted with `\\` and `"` escaped.
fn push_quoted(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        if ch == '\\' || ch == '"' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
}

fn open(out: &mut String, bracket: char, multiline: bool) {
    out.push(bracket);
    out.push(if multiline { '\n' } else { ' ' });
}

fn separate(out: &mut String, more: bool, multiline: bool) {
    if more {
        out.push(',');
        if !multiline {
            out.push(' ');
        }
    }
    if multiline {
        out.push('\n');
    }
}

fn close(out: &mut String, bracket: char, multiline: bool, indent: &str) {
    if multiline {
        out.push_str(indent);
    } else {
        out.push(' ');
    }
    out.push(bracket);
}

/// Whole numbers (within 1e-5) print without a fraction; everything else
/// prints the shortest text that reads back as the same `f64`.
fn describe_number(n: f64) -> String {
    if (n - n.round()).abs() < 0.00001 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

/// Parse the leading numeric text of `s`. Blank strings read as zero; strings
/// without a numeric prefix do not convert.
fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim_start();
    if s.is_empty() {
        return Some(0.0);
    }
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut digits = end - int_start;
    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    s[..end].parse().ok()
}

fn compare_arrays(lhs: &[Value], rhs: &[Value]) -> Result<Ordering> {
    for (l, r) in lhs.iter().zip(rhs) {
        let ordering = l.compare(r)?;
        if ordering != Ordering::Equal {
            return Ok(ordering);
        }
    }
    Ok(lhs.len().cmp(&rhs.len()))
}

/// Maps compare entry by entry in key order: first by key, then by value.
fn compare_maps(lhs: &MapType, rhs: &MapType) -> Result<Ordering> {
    let mut l: Vec<_> = lhs.iter().collect();
    let mut r: Vec<_> = rhs.iter().collect();
    l.sort_by(|a, b| a.0.cmp(b.0));
    r.sort_by(|a, b| a.0.cmp(b.0));
    for ((lk, lv), (rk, rv)) in l.iter().zip(&r) {
        let ordering = lk.cmp(rk);
        if ordering != Ordering::Equal {
            return Ok(ordering);
        }
        let ordering = lv.compare(rv)?;
        if ordering != Ordering::Equal {
            return Ok(ordering);
        }
    }
    Ok(l.len().cmp(&r.len()))
}

// ── Trait impls ───────────────────────────────────────────────────────────────

impl PartialEq for Value {
    /// Structural equality; a bounded range equals the array it materializes to.
    fn eq(&self, other: &Self) -> bool {
        if Rc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        match (self.kind(), other.kind()) {
            (ValueKind::Range(r @ RangeType::Bounded { first, last }), ValueKind::Array(a))
            | (ValueKind::Array(a), ValueKind::Range(r @ RangeType::Bounded { first, last })) => {
                a.len() == r.len(0)
                    && RangeIter::new(*first, *last)
                        .zip(a)
                        .all(|(i, v)| matches!(v.kind(), ValueKind::Number(n) if *n == i as f64))
            }
            (l, r) => l == r,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.kind(), f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::undefined()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::new(ValueKind::Boolean(b))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::new(ValueKind::Number(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::new(ValueKind::Number(n as f64))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::new(ValueKind::String(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::new(ValueKind::String(s))
    }
}

impl From<ArrayType> for Value {
    fn from(a: ArrayType) -> Self {
        Value::new(ValueKind::Array(a))
    }
}

impl From<MapType> for Value {
    fn from(m: MapType) -> Self {
        Value::new(ValueKind::Map(m))
    }
}

impl From<RangeType> for Value {
    fn from(r: RangeType) -> Self {
        Value::new(ValueKind::Range(r))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, Value)]) -> Value {
        Value::from(entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect::<MapType>())
    }

    #[test]
    fn type_names() {
        assert_eq!(Value::from(true).type_name(), "Boolean");
        assert_eq!(Value::from("x").type_name(), "String");
        assert_eq!(Value::from(1).type_name(), "Number");
        assert_eq!(Value::from(ArrayType::new()).type_name(), "Array");
        assert_eq!(Value::from(MapType::new()).type_name(), "Map");
        assert_eq!(Value::from(RangeType::Bounded { first: 1, last: 2 }).type_name(), "Range");
        assert_eq!(Value::null().type_name(), "Null");
        assert_eq!(Value::undefined().type_name(), "Undefined");
    }

    #[test]
    fn boolean_conversions() {
        let t = Value::from(true);
        assert_eq!(t.convert_to(ValueType::String).unwrap(), Value::from("true"));
        assert_eq!(t.convert_to(ValueType::Number).unwrap(), Value::from(1));
        assert_eq!(Value::from(false).convert_to(ValueType::Number).unwrap(), Value::from(0));
        assert!(matches!(t.convert_to(ValueType::Array), Err(ElError::Conversion { .. })));
        assert!(t.convert_to(ValueType::Map).is_err());
        assert!(t.convert_to(ValueType::Null).is_err());
    }

    #[test]
    fn string_to_boolean() {
        assert_eq!(Value::from("").convert_to(ValueType::Boolean).unwrap(), Value::from(false));
        assert_eq!(Value::from("false").convert_to(ValueType::Boolean).unwrap(), Value::from(false));
        assert_eq!(Value::from("FaLsE").convert_to(ValueType::Boolean).unwrap(), Value::from(false));
        assert_eq!(Value::from("asdf").convert_to(ValueType::Boolean).unwrap(), Value::from(true));
        assert_eq!(Value::from("0").convert_to(ValueType::Boolean).unwrap(), Value::from(true));
    }

    #[test]
    fn string_to_number() {
        let num = |s: &str| Value::from(s).convert_to(ValueType::Number);
        assert_eq!(num("1.0").unwrap(), Value::from(1.0));
        assert_eq!(num("  -2.5e1").unwrap(), Value::from(-25.0));
        assert_eq!(num("12abc").unwrap(), Value::from(12));
        assert_eq!(num("").unwrap(), Value::from(0));
        assert_eq!(num("   ").unwrap(), Value::from(0));
        assert!(num("asdf").is_err());
        assert!(num("true").is_err());
        assert!(num(".").is_err());
        assert_eq!(Value::from("2x").try_convert_to(ValueType::Number), Some(Value::from(2)));
        assert_eq!(Value::from("x").try_convert_to(ValueType::Number), None);
    }

    #[test]
    fn conversion_error_message() {
        let e = Value::from("a").convert_to(ValueType::Number).unwrap_err();
        assert_eq!(e.to_string(), "Cannot convert value '\"a\"' of type 'String' to type 'Number'");
    }

    #[test]
    fn number_conversions() {
        assert_eq!(Value::from(0).convert_to(ValueType::Boolean).unwrap(), Value::from(false));
        assert_eq!(Value::from(-1).convert_to(ValueType::Boolean).unwrap(), Value::from(true));
        assert_eq!(Value::from(1.5).convert_to(ValueType::String).unwrap(), Value::from("1.5"));
        assert!(Value::from(1).convert_to(ValueType::Array).is_err());
    }

    #[test]
    fn null_converts_to_empty_values() {
        let n = Value::null();
        assert_eq!(n.convert_to(ValueType::Boolean).unwrap(), Value::from(false));
        assert_eq!(n.convert_to(ValueType::String).unwrap(), Value::from(""));
        assert_eq!(n.convert_to(ValueType::Number).unwrap(), Value::from(0));
        assert_eq!(n.convert_to(ValueType::Array).unwrap(), Value::from(ArrayType::new()));
        assert_eq!(n.convert_to(ValueType::Map).unwrap(), Value::from(MapType::new()));
        assert_eq!(n.convert_to(ValueType::Null).unwrap(), Value::null());
        assert!(n.convert_to(ValueType::Undefined).is_err());
    }

    #[test]
    fn undefined_converts_only_to_itself() {
        let u = Value::undefined();
        assert!(u.convert_to(ValueType::Undefined).is_ok());
        assert!(u.convert_to(ValueType::Boolean).is_err());
        assert!(u.convert_to(ValueType::String).is_err());
    }

    #[test]
    fn containers_convert_only_to_themselves() {
        let a = Value::from(vec![Value::from(1)]);
        assert!(a.convertible_to(ValueType::Array));
        assert!(!a.convertible_to(ValueType::String));
        assert!(!map(&[]).convertible_to(ValueType::Boolean));
    }

    #[test]
    fn bounded_range_equals_its_array() {
        let r = Value::from(RangeType::Bounded { first: 3, last: 1 });
        let a = Value::from(vec![Value::from(3), Value::from(2), Value::from(1)]);
        assert_eq!(r, a);
        assert_eq!(r.convert_to(ValueType::Array).unwrap(), a);
        assert_ne!(Value::from(RangeType::Bounded { first: 1, last: 3 }), a);
    }

    #[test]
    fn describe_scalars() {
        assert_eq!(Value::from(true).describe(), "true");
        assert_eq!(Value::from(2).describe(), "2");
        assert_eq!(Value::from(-2.0).describe(), "-2");
        assert_eq!(Value::from(2.23).describe(), "2.23");
        assert_eq!(Value::from(1.0 / 3.0).describe(), "0.3333333333333333");
        assert_eq!(Value::from("a \"b\" \\c").describe(), r#""a \"b\" \\c""#);
        assert_eq!(Value::null().describe(), "null");
        assert_eq!(Value::undefined().describe(), "undefined");
    }

    #[test]
    fn describe_containers() {
        assert_eq!(Value::from(ArrayType::new()).describe(), "[]");
        assert_eq!(Value::from(vec![Value::from(1), Value::from("x")]).describe(), r#"[ 1, "x" ]"#);
        assert_eq!(map(&[]).describe(), "{}");
        assert_eq!(map(&[("k1", Value::from(1)), ("k2", Value::from(true))]).describe(), r#"{ "k1": 1, "k2": true }"#);
        assert_eq!(Value::from(RangeType::Bounded { first: 1, last: 3 }).describe(), "[1..3]");
        assert_eq!(Value::from(RangeType::LeftBounded { first: 1 }).describe(), "[1..]");
        assert_eq!(Value::from(RangeType::RightBounded { last: -1 }).describe(), "[..-1]");
    }

    #[test]
    fn describe_escapes_map_keys() {
        let v = map(&[(r#"say "hi""#, Value::from(1)), (r"C:\maps", Value::from(2))]);
        assert_eq!(v.describe(), r#"{ "say \"hi\"": 1, "C:\\maps": 2 }"#);
    }

    #[test]
    fn saturated_range_length() {
        let r = RangeType::Bounded { first: i64::MIN, last: i64::MAX };
        assert_eq!(r.len(0), usize::MAX);
        assert_eq!(Value::from(r).length(), usize::MAX);
        assert_ne!(Value::from(r), Value::from(vec![Value::from(1)]));
        assert_eq!(RangeType::Bounded { first: 2, last: -2 }.len(0), 5);
        assert_eq!(RangeType::LeftBounded { first: 1 }.len(4), 3);
    }

    #[test]
    fn multiline_as_string() {
        let v = map(&[("a", Value::from(vec![Value::from(1), Value::from(2)]))]);
        assert_eq!(v.as_string(true), "{\n\t\"a\": [\n\t\t1,\n\t\t2\n\t]\n}");
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::from("x").string_value().unwrap(), "x");
        assert_eq!(Value::null().string_value().unwrap(), "");
        assert_eq!(Value::from(2.7).integer_value().unwrap(), 2);
        assert!(Value::null().array_value().unwrap().is_empty());
        assert!(Value::null().map_value().unwrap().is_empty());
        let e = Value::from(1).array_value().unwrap_err();
        assert!(matches!(e, ElError::Dereference { actual: ValueType::Number, requested: ValueType::Array, .. }));
    }

    #[test]
    fn length() {
        assert_eq!(Value::from("asdf").length(), 4);
        assert_eq!(Value::from(1).length(), 1);
        assert_eq!(Value::from(RangeType::Bounded { first: -1, last: 2 }).length(), 4);
        assert_eq!(Value::null().length(), 0);
    }

    #[test]
    fn string_list() {
        let v = Value::from(vec![Value::from("b"), Value::from(1), Value::from(true), Value::from("b")]);
        assert_eq!(v.as_string_list().unwrap(), vec!["b", "1", "true", "b"]);
        assert_eq!(v.as_string_set().unwrap().len(), 3);
        assert!(Value::from(vec![Value::from(ArrayType::new())]).as_string_list().is_err());
    }

    #[test]
    fn compare_scalars() {
        let cmp = |l: Value, r: Value| l.compare(&r).unwrap();
        assert_eq!(cmp(Value::from(false), Value::from(true)), Ordering::Less);
        assert_eq!(cmp(Value::from(false), Value::from("")), Ordering::Equal);
        assert_eq!(cmp(Value::from(1), Value::from(false)), Ordering::Greater);
        assert_eq!(cmp(Value::from(0), Value::from("1")), Ordering::Less);
        assert_eq!(cmp(Value::from("aa"), Value::from("ab")), Ordering::Less);
        assert_eq!(cmp(Value::from("a"), Value::null()), Ordering::Greater);
        assert_eq!(cmp(Value::null(), Value::from(ArrayType::new())), Ordering::Less);
        assert_eq!(cmp(Value::null(), Value::null()), Ordering::Equal);
        assert!(Value::from(0).compare(&Value::from("a")).is_err());
        assert!(Value::from(0).compare(&Value::from(ArrayType::new())).is_err());
    }

    #[test]
    fn compare_containers() {
        let arr = |items: &[i32]| Value::from(items.iter().map(|i| Value::from(*i)).collect::<ArrayType>());
        assert_eq!(arr(&[1]).compare(&arr(&[1, 2])).unwrap(), Ordering::Less);
        assert_eq!(arr(&[2]).compare(&arr(&[1, 2])).unwrap(), Ordering::Greater);
        assert_eq!(arr(&[1, 2]).compare(&arr(&[1, 2])).unwrap(), Ordering::Equal);

        let k1 = map(&[("k1", Value::from(1))]);
        let k2 = map(&[("k2", Value::from(1))]);
        let both = map(&[("k2", Value::from(2)), ("k1", Value::from(1))]);
        assert_eq!(k1.compare(&k2).unwrap(), Ordering::Less);
        assert_eq!(k1.compare(&both).unwrap(), Ordering::Less);
        assert_eq!(both.compare(&k1).unwrap(), Ordering::Greater);
        assert!(k1.compare(&arr(&[])).is_err());
    }

    #[test]
    fn range_iteration() {
        let up: Vec<_> = RangeType::Bounded { first: 1, last: 3 }.iter(0).collect();
        let down: Vec<_> = RangeType::Bounded { first: 3, last: 1 }.iter(0).collect();
        let left: Vec<_> = RangeType::LeftBounded { first: 1 }.iter(4).collect();
        let right: Vec<_> = RangeType::RightBounded { last: 1 }.iter(4).collect();
        assert_eq!(up, vec![1, 2, 3]);
        assert_eq!(down, vec![3, 2, 1]);
        assert_eq!(left, vec![1, 2, 3]);
        assert_eq!(right, vec![3, 2, 1]);
        assert_eq!(RangeType::LeftBounded { first: -4 }.len(4), 8);
    }

    #[test]
    fn element_access() {
        let ctx = EvaluationContext::default();
        let s = Value::from("asdf");
        assert_eq!(s.at(&ctx, 1).unwrap(), Value::from("s"));
        assert!(matches!(s.at(&ctx, 4), Err(ElError::IndexOutOfBounds { .. })));
        assert_eq!(s.at_or_default(&ctx, 9, Value::null()).unwrap(), Value::null());
        assert!(matches!(Value::from(1).at(&ctx, 0), Err(ElError::Index { .. })));

        let m = map(&[("a", Value::from(1))]);
        assert_eq!(m.at_key(&ctx, "a").unwrap(), Value::from(1));
        assert!(matches!(m.at_key(&ctx, "b"), Err(ElError::IndexOutOfBounds { .. })));
        assert_eq!(m.at_key_or_default(&ctx, "b", Value::from(2)).unwrap(), Value::from(2));
        assert!(m.contains_key("a"));
        assert!(!m.contains_key("b"));
        assert!(s.contains(3));
        assert!(!s.contains(4));
        assert_eq!(m.keys().unwrap(), vec!["a"]);
    }
}
