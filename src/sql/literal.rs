//! Literal rendering for inline SQL
//!
//! Caller data reaches SQL text either as a bound parameter or through
//! [`format_literal`], which quotes it. The only unquoted fragment is a
//! [`Placeholder`], and the only way to obtain one is to bind a value through
//! [`ParameterSet::push`](super::condition::ParameterSet::push).

use std::fmt;

use crate::types::Value;

/// Numbered reference (`$N`) to a value already bound on the command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder {
    index: usize,
}

impl Placeholder {
    pub(crate) fn new(index: usize) -> Self {
        Self { index }
    }

    /// 1-based position of the bound value
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.index)
    }
}

/// Something that can be written into SQL text
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal<'a> {
    /// A value, quoted and escaped
    Value(&'a Value),
    /// A bound parameter reference, emitted verbatim
    Placeholder(Placeholder),
}

impl<'a> From<&'a Value> for Literal<'a> {
    fn from(value: &'a Value) -> Self {
        Literal::Value(value)
    }
}

impl From<Placeholder> for Literal<'_> {
    fn from(placeholder: Placeholder) -> Self {
        Literal::Placeholder(placeholder)
    }
}

/// Render a literal for inline SQL
///
/// Text is single-quoted with embedded quotes doubled, date-times render as
/// `'yyyy/MM/dd HH:mm:ss'` (24-hour), booleans as `1`/`0` and null as `NULL`.
/// Floats with no SQL spelling (NaN, infinities) render as `NULL`.
pub fn format_literal<'a>(literal: impl Into<Literal<'a>>) -> String {
    match literal.into() {
        Literal::Placeholder(placeholder) => placeholder.to_string(),
        Literal::Value(value) => match value {
            Value::Null => "NULL".to_string(),
            Value::Json(serde_json::Value::Null) => "NULL".to_string(),
            Value::Boolean(b) => if *b { "1" } else { "0" }.to_string(),
            Value::Byte(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) if f.is_finite() => f.to_string(),
            Value::Float(_) => "NULL".to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::DateTime(dt) => quote(&dt.format("%Y/%m/%d %H:%M:%S").to_string()),
            Value::Date(d) => quote(&d.format("%Y/%m/%d").to_string()),
            Value::Binary(bytes) => format!("X'{}'", value_hex(bytes)),
            Value::String(s) => quote(s),
            Value::Guid(g) => quote(&g.hyphenated().to_string()),
            Value::Json(serde_json::Value::String(s)) => quote(s),
            Value::Json(other) => quote(&other.to_string()),
        },
    }
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn value_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}
