//! Core type definitions for Record Store
//!
//! Includes the abstract value kinds, their column-type mapping, and the typed
//! value carried by every record field.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RecordStoreError, Result};

// ============================================================================
// Value Kinds (column type mapping)
// ============================================================================

/// Abstract kind of a stored value, independent of the backend column type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// True/false flag, stored as 1/0
    Boolean,
    /// Unsigned 8-bit integer
    Byte,
    /// Signed 16-bit integer
    Int16,
    /// Signed 32-bit integer
    Int32,
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 16-bit integer
    UInt16,
    /// Unsigned 32-bit integer
    UInt32,
    /// Unsigned 64-bit integer
    UInt64,
    /// Raw bytes
    Binary,
    /// Opaque value stored as bytes
    Object,
    /// Text
    String,
    /// UUID rendered as hyphenated text
    Guid,
    /// XML document text
    Xml,
    /// Calendar date without time
    Date,
    /// Time of day
    Time,
    /// Date and time
    DateTime,
    /// Date and time with offset
    DateTimeOffset,
    /// 32-bit floating point
    Single,
    /// 64-bit floating point
    Double,
    /// Exact decimal
    Decimal,
    /// Monetary amount
    Currency,
}

impl ValueKind {
    /// Convert the value kind to the SQLite column type string
    pub fn to_sql_type(&self) -> &'static str {
        match self {
            ValueKind::Boolean
            | ValueKind::Byte
            | ValueKind::Int16
            | ValueKind::Int32
            | ValueKind::Int64
            | ValueKind::UInt16
            | ValueKind::UInt32
            | ValueKind::UInt64 => "number",
            ValueKind::Binary | ValueKind::Object => "blob",
            ValueKind::String | ValueKind::Guid | ValueKind::Xml => "nvarchar(255)",
            ValueKind::Time | ValueKind::DateTime | ValueKind::DateTimeOffset => "datetime",
            ValueKind::Date => "date",
            ValueKind::Single | ValueKind::Double | ValueKind::Decimal | ValueKind::Currency => {
                "float"
            }
        }
    }

    /// Resolve a declared column type read back from the backend catalog
    ///
    /// Recognises the types this crate emits plus the common SQLite type
    /// names. Anything else is an [`RecordStoreError::UnmappedType`].
    pub fn from_sql_type(declared: &str) -> Result<Self> {
        let normalized: String = declared
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();

        let kind = match normalized.as_str() {
            "number" | "integer" | "int" | "bigint" | "smallint" | "tinyint" => ValueKind::Int64,
            "boolean" | "bool" => ValueKind::Boolean,
            "blob" => ValueKind::Binary,
            "text" | "clob" => ValueKind::String,
            "datetime" | "timestamp" => ValueKind::DateTime,
            "date" => ValueKind::Date,
            "time" => ValueKind::Time,
            "float" | "real" | "double" | "doubleprecision" => ValueKind::Double,
            "numeric" | "decimal" => ValueKind::Decimal,
            other if other.starts_with("nvarchar")
                || other.starts_with("varchar")
                || other.starts_with("nchar")
                || other.starts_with("char") =>
            {
                ValueKind::String
            }
            other if other.starts_with("decimal") || other.starts_with("numeric") => {
                ValueKind::Decimal
            }
            _ => return Err(RecordStoreError::UnmappedType(declared.to_string())),
        };

        Ok(kind)
    }
}

// ============================================================================
// Values
// ============================================================================

/// A typed field value
///
/// `Json` carries values with no dedicated kind; they are stored as text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Byte(u8),
    Integer(i64),
    Float(f64),
    Decimal(Decimal),
    String(String),
    Guid(Uuid),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Binary(Vec<u8>),
    Json(serde_json::Value),
}

impl Value {
    /// Infer the abstract kind of this value
    ///
    /// Returns `None` for `Null`, which carries no type information.
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(ValueKind::Boolean),
            Value::Byte(_) => Some(ValueKind::Byte),
            Value::Integer(_) => Some(ValueKind::Int64),
            Value::Float(_) => Some(ValueKind::Double),
            Value::Decimal(_) => Some(ValueKind::Decimal),
            Value::String(_) => Some(ValueKind::String),
            Value::Guid(_) => Some(ValueKind::Guid),
            Value::DateTime(_) => Some(ValueKind::DateTime),
            Value::Date(_) => Some(ValueKind::Date),
            Value::Binary(_) => Some(ValueKind::Binary),
            // Unsupported kinds fall back to text
            Value::Json(_) => Some(ValueKind::String),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for `Null` and for values whose text form is empty
    pub fn is_null_or_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Binary(b) => b.is_empty(),
            Value::Json(serde_json::Value::Null) => true,
            Value::Json(serde_json::Value::String(s)) => s.is_empty(),
            _ => false,
        }
    }

    /// The value as a column holds it: null and empty values are stored as `Null`
    pub fn stored(&self) -> Value {
        if self.is_null_or_empty() {
            Value::Null
        } else {
            self.clone()
        }
    }

    /// Read a stored value back as `kind`
    ///
    /// SQLite keeps flags as integers and dates, guids as text. Values that do
    /// not convert are returned unchanged.
    pub fn into_kind(self, kind: ValueKind) -> Value {
        match (kind, self) {
            (ValueKind::Boolean, Value::Integer(i @ (0 | 1))) => Value::Boolean(i == 1),
            (ValueKind::Byte, Value::Integer(i)) => {
                u8::try_from(i).map(Value::Byte).unwrap_or(Value::Integer(i))
            }
            (ValueKind::Guid, Value::String(s)) => match Uuid::parse_str(&s) {
                Ok(guid) => Value::Guid(guid),
                Err(_) => Value::String(s),
            },
            (ValueKind::DateTime | ValueKind::DateTimeOffset, Value::String(s)) => {
                match parse_datetime(&s) {
                    Some(dt) => Value::DateTime(dt),
                    None => Value::String(s),
                }
            }
            (ValueKind::Date, Value::String(s)) => match parse_date(&s) {
                Some(d) => Value::Date(d),
                None => Value::String(s),
            },
            (ValueKind::Decimal | ValueKind::Currency, Value::Integer(i)) => {
                Value::Decimal(Decimal::from(i))
            }
            (ValueKind::Decimal | ValueKind::Currency, Value::Float(f)) => {
                Decimal::from_f64(f).map(Value::Decimal).unwrap_or(Value::Float(f))
            }
            (ValueKind::Single | ValueKind::Double, Value::Integer(i)) => Value::Float(i as f64),
            (_, value) => value,
        }
    }

    /// Text form of the value, `None` for `Null`
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Json(serde_json::Value::String(s)) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Json(serde_json::Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Byte(b) => Some(i64::from(*b)),
            Value::Boolean(b) => Some(i64::from(*b)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Flag value; integers read back from storage count as true when non-zero
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::Byte(b) => Some(*b != 0),
            Value::Integer(i) => Some(*i != 0),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Convert from a JSON value
    ///
    /// Integers and strings map to their own variants; arrays and objects are
    /// kept as `Json`.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::String(s),
            other => Value::Json(other),
        }
    }

    /// Convert into a JSON value
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Byte(b) => serde_json::Value::from(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Json(v) => v.clone(),
            Value::Binary(bytes) => {
                serde_json::Value::Array(bytes.iter().map(|b| serde_json::Value::from(*b)).collect())
            }
            other => serde_json::Value::String(other.to_string()),
        }
    }
}

const DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
];

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text.trim(), format).ok())
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    ["%Y-%m-%d", "%Y/%m/%d"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text.trim(), format).ok())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Byte(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::String(s) => f.write_str(s),
            Value::Guid(g) => write!(f, "{}", g.hyphenated()),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Binary(bytes) => {
                for byte in bytes {
                    write!(f, "{:02X}", byte)?;
                }
                Ok(())
            }
            Value::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::Byte(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Guid(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
