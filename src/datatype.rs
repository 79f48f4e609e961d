// used for persistence
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
// used for the key-JSON store and structured columns
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

// used when ordering values in filters
use std::cmp::Ordering;
// used for property bags
use std::collections::BTreeMap;
// used to print out readable forms of a value
use std::fmt;

use crate::error::{OrmletError, Result};

// ------------- Column Types --------------
/// The declared type of a column. It decides how values are coerced, how they
/// are written to a backend and how they are read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Number,
    Boolean,
    Object,
}

impl ColumnType {
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Number => "number",
            ColumnType::Boolean => "boolean",
            ColumnType::Object => "object",
        }
    }
    /// SQLite affinity used for the column when a table is created.
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Number => "NUMERIC",
            ColumnType::Boolean => "INTEGER",
            ColumnType::Object => "TEXT",
        }
    }
    /// The value a column falls back to when neither the instance nor the
    /// declaration provides one.
    pub fn zero(&self) -> Value {
        match self {
            ColumnType::Text => Value::Text(String::new()),
            ColumnType::Number => Value::Number(0.0),
            ColumnType::Boolean => Value::Boolean(false),
            ColumnType::Object => Value::Object(Json::Object(Default::default())),
        }
    }
    /// Converts a value to this type. Only lossless conversions are accepted;
    /// anything else is a serialization error.
    pub fn coerce(&self, value: &Value) -> Result<Value> {
        let coerced = match (self, value) {
            (_, Value::Null) => Some(Value::Null),
            (ColumnType::Text, Value::Text(_))
            | (ColumnType::Number, Value::Number(_))
            | (ColumnType::Boolean, Value::Boolean(_))
            | (ColumnType::Object, Value::Object(_)) => Some(value.clone()),
            (ColumnType::Text, Value::Number(n)) => Some(Value::Text(format_number(*n))),
            (ColumnType::Text, Value::Boolean(b)) => Some(Value::Text(b.to_string())),
            (ColumnType::Number, Value::Text(s)) => s.trim().parse::<f64>().ok().map(Value::Number),
            (ColumnType::Number, Value::Boolean(b)) => Some(Value::Number(if *b { 1.0 } else { 0.0 })),
            (ColumnType::Boolean, Value::Number(n)) if *n == 0.0 || *n == 1.0 => Some(Value::Boolean(*n == 1.0)),
            (ColumnType::Boolean, Value::Text(s)) => match s.trim() {
                "true" | "1" => Some(Value::Boolean(true)),
                "false" | "0" => Some(Value::Boolean(false)),
                _ => None,
            },
            // every non-null value has a JSON form
            (ColumnType::Object, other) => Some(Value::Object(other.to_json())),
            _ => None,
        };
        coerced.ok_or_else(|| {
            OrmletError::Serialization(format!("cannot use {} as a {} value", value, self.name()))
        })
    }

    // -------- SQL pair --------
    // writing goes through coerce and the ToSql impl of Value
    /// Parses a column read back from SQLite.
    pub fn from_sql(&self, value: ValueRef<'_>) -> Result<Value> {
        let invalid = |what: &str| {
            OrmletError::Serialization(format!("cannot read {} as a {} value", what, self.name()))
        };
        match (self, value) {
            (_, ValueRef::Null) => Ok(Value::Null),
            (ColumnType::Text, ValueRef::Text(bytes)) => Ok(Value::Text(utf8(bytes)?.to_string())),
            (ColumnType::Text, ValueRef::Integer(i)) => Ok(Value::Text(i.to_string())),
            (ColumnType::Text, ValueRef::Real(f)) => Ok(Value::Text(format_number(f))),
            (ColumnType::Number, ValueRef::Integer(i)) => Ok(Value::Number(i as f64)),
            (ColumnType::Number, ValueRef::Real(f)) => Ok(Value::Number(f)),
            (ColumnType::Number, ValueRef::Text(bytes)) => {
                let text = utf8(bytes)?;
                text.trim().parse().map(Value::Number).map_err(|_| invalid(text))
            }
            (ColumnType::Boolean, ValueRef::Integer(i)) => Ok(Value::Boolean(i != 0)),
            (ColumnType::Boolean, ValueRef::Real(f)) => Ok(Value::Boolean(f != 0.0)),
            (ColumnType::Boolean, ValueRef::Text(bytes)) => {
                let text = utf8(bytes)?;
                ColumnType::Boolean.coerce(&Value::Text(text.to_string())).map_err(|_| invalid(text))
            }
            (ColumnType::Object, ValueRef::Text(bytes)) => Ok(Value::Object(serde_json::from_slice(bytes)?)),
            (ColumnType::Object, ValueRef::Blob(bytes)) => Ok(Value::Object(serde_json::from_slice(bytes)?)),
            (ColumnType::Object, ValueRef::Integer(i)) => Ok(Value::Object(Json::from(i))),
            (ColumnType::Object, ValueRef::Real(f)) => Ok(Value::Object(Value::Number(f).to_json())),
            (_, ValueRef::Blob(_)) => Err(invalid("a blob")),
        }
    }

    // -------- JSON pair --------
    /// Serializes a value for the key-JSON store.
    pub fn to_json(&self, value: &Value) -> Result<Json> {
        Ok(self.coerce(value)?.to_json())
    }
    /// Parses a member of an object read back from the key-JSON store. Object
    /// columns keep the JSON as is, `null` and plain numbers included, the
    /// same as when they are read back from SQLite.
    pub fn from_json(&self, value: &Json) -> Result<Value> {
        match self {
            ColumnType::Object => Ok(Value::Object(value.clone())),
            _ => self.coerce(&Value::from(value.clone())),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| OrmletError::Serialization(e.to_string()))
}

/// Integral numbers print without a fraction, so 5.0 reads as 5.
pub fn format_number(n: f64) -> String {
    if integral(n) {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn integral(n: f64) -> bool {
    // i64::MAX as f64 is 2^63, one past the largest i64
    n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64
}

// ------------- Values --------------
/// A bag of named values: one instance of a resource, or one stored row.
pub type Properties = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Text(String),
    Number(f64),
    Boolean(bool),
    Object(Json),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }
    pub fn as_object(&self) -> Option<&Json> {
        match self {
            Value::Object(json) => Some(json),
            _ => None,
        }
    }
    /// Orders two values of the same kind. Structured values and mixed kinds
    /// have no ordering.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
    /// The natural JSON form, without consulting any column type.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Text(s) => Json::String(s.clone()),
            Value::Number(n) if integral(*n) => Json::from(*n as i64),
            Value::Number(n) => serde_json::Number::from_f64(*n).map(Json::Number).unwrap_or(Json::Null),
            Value::Boolean(b) => Json::Bool(*b),
            Value::Object(json) => json.clone(),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::from(rusqlite::types::Null),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
            Value::Number(n) if integral(*n) => ToSqlOutput::from(*n as i64),
            Value::Number(n) => ToSqlOutput::from(*n),
            Value::Boolean(b) => ToSqlOutput::from(*b as i64),
            Value::Object(json) => ToSqlOutput::from(json.to_string()),
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Text(s) => write!(f, "{}", s),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Object(json) => write!(f, "{}", json),
        }
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Boolean(b),
            Json::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            Json::String(s) => Value::Text(s),
            structured => Value::Object(structured),
        }
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}
impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}
impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}
impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}
impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n as f64)
    }
}
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}
