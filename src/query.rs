//! Filter queries.
//!
//! A [`Query`] is an ordered list of `(field, operator, value)` filters that
//! all have to hold. It is backend agnostic: before use it is bound to a
//! [`ResourceDescriptor`], which checks every filter against the declared
//! columns and coerces its value to the column type. The SQLite driver turns
//! the bound form into a `WHERE` clause, the HTTP driver evaluates it in
//! memory with [`BoundQuery::matches`]. Both read a missing (null) stored
//! value as "does not match", the way SQL does.

use std::cmp::Ordering;
use std::fmt;

use bimap::BiMap;
use lazy_static::lazy_static;
use tracing::warn;

use crate::datatype::{ColumnType, Properties, Value, format_number};
use crate::descriptor::ResourceDescriptor;
use crate::error::{OrmletError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    NotEq,
    Like,
    Gt,
    Lt,
    Gte,
    Lte,
}

lazy_static! {
    static ref TOKENS: BiMap<&'static str, Operator> = {
        let mut tokens = BiMap::new();
        tokens.insert("=", Operator::Eq);
        tokens.insert("!=", Operator::NotEq);
        tokens.insert("like", Operator::Like);
        tokens.insert(">", Operator::Gt);
        tokens.insert("<", Operator::Lt);
        tokens.insert(">=", Operator::Gte);
        tokens.insert("<=", Operator::Lte);
        tokens
    };
}

impl Operator {
    /// Accepts the symbol (`>=`) or the clause method name (`gte`, `isNot`).
    pub fn from_token(token: &str) -> Option<Operator> {
        let token = token.trim().to_ascii_lowercase();
        if let Some(operator) = TOKENS.get_by_left(token.as_str()) {
            return Some(*operator);
        }
        match token.as_str() {
            "is" => Some(Operator::Eq),
            "is_not" | "isnot" => Some(Operator::NotEq),
            "is_like" | "islike" => Some(Operator::Like),
            "gt" => Some(Operator::Gt),
            "lt" => Some(Operator::Lt),
            "gte" => Some(Operator::Gte),
            "lte" => Some(Operator::Lte),
            _ => None,
        }
    }
    pub fn token(&self) -> &'static str {
        TOKENS.get_by_right(self).copied().unwrap_or_default()
    }
    /// Tests a stored value against the filter value.
    pub fn test(&self, stored: &Value, wanted: &Value) -> bool {
        if stored.is_null() || wanted.is_null() {
            return false;
        }
        match self {
            Operator::Eq => stored == wanted,
            Operator::NotEq => stored != wanted,
            Operator::Like => match (stored, wanted) {
                (Value::Text(haystack), Value::Text(needle)) => haystack.contains(needle.as_str()),
                _ => false,
            },
            Operator::Gt => stored.compare(wanted) == Some(Ordering::Greater),
            Operator::Lt => stored.compare(wanted) == Some(Ordering::Less),
            Operator::Gte => matches!(stored.compare(wanted), Some(Ordering::Greater | Ordering::Equal)),
            Operator::Lte => matches!(stored.compare(wanted), Some(Ordering::Less | Ordering::Equal)),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

// ------------- Filters -------------
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl Filter {
    pub fn new(field: &str, operator: Operator, value: impl Into<Value>) -> Self {
        Self { field: field.to_string(), operator, value: value.into() }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} ", self.field, self.operator)?;
        match &self.value {
            Value::Text(s) => write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            other => write!(f, "{}", other),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filters: Vec<Filter>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }
    /// Appends a filter given by operator token (`=`, `!=`, `like`, `>`, `<`,
    /// `>=`, `<=`). A token outside that set constrains nothing, so the filter
    /// is dropped instead of appended.
    pub fn push(&mut self, field: &str, token: &str, value: impl Into<Value>) -> &mut Self {
        match Operator::from_token(token) {
            Some(operator) => self.push_op(field, operator, value),
            None => {
                warn!(field, token, "dropping filter with unrecognized operator");
                self
            }
        }
    }
    pub fn push_op(&mut self, field: &str, operator: Operator, value: impl Into<Value>) -> &mut Self {
        self.filters.push(Filter::new(field, operator, value));
        self
    }
    /// Starts a filter on `field`; finish it with one of the [`Clause`] operators.
    pub fn where_(&mut self, field: &str) -> Clause<'_> {
        Clause { query: self, field: field.to_string() }
    }
    /// The filters in declaration order.
    pub fn serialize(&self) -> &[Filter] {
        &self.filters
    }
    pub fn len(&self) -> usize {
        self.filters.len()
    }
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Checks the filters against `descriptor` and coerces their values to
    /// the column types.
    pub fn bind(&self, descriptor: &ResourceDescriptor) -> Result<BoundQuery> {
        let filters = self
            .filters
            .iter()
            .map(|filter| {
                let column = descriptor.column(&filter.field).ok_or_else(|| {
                    OrmletError::Config(format!("unknown field '{}' on {}", filter.field, descriptor.name()))
                })?;
                if column.column_type == ColumnType::Object {
                    return Err(OrmletError::Config(format!(
                        "{}.{} is an object column and cannot be filtered",
                        descriptor.name(),
                        column.name
                    )));
                }
                if filter.operator == Operator::Like && column.column_type != ColumnType::Text {
                    return Err(OrmletError::Config(format!(
                        "'like' needs a text column, {}.{} is {}",
                        descriptor.name(),
                        column.name,
                        column.column_type
                    )));
                }
                if filter.value.is_null() {
                    return Err(OrmletError::Config(format!("filter on '{}' has no value", filter.field)));
                }
                let value = column.column_type.coerce(&filter.value).map_err(|e| {
                    OrmletError::Config(format!("filter on '{}': {}", filter.field, e))
                })?;
                Ok(BoundFilter {
                    column: column.name.clone(),
                    column_type: column.column_type,
                    operator: filter.operator,
                    value,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(BoundQuery { filters })
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                write!(f, " and ")?;
            }
            write!(f, "{}", filter)?;
        }
        Ok(())
    }
}

/// The operators available on a field, returned by [`Query::where_`].
pub struct Clause<'q> {
    query: &'q mut Query,
    field: String,
}

impl<'q> Clause<'q> {
    pub fn is(self, value: impl Into<Value>) -> &'q mut Query {
        self.query.push_op(&self.field, Operator::Eq, value)
    }
    pub fn is_not(self, value: impl Into<Value>) -> &'q mut Query {
        self.query.push_op(&self.field, Operator::NotEq, value)
    }
    pub fn is_like(self, value: impl Into<Value>) -> &'q mut Query {
        self.query.push_op(&self.field, Operator::Like, value)
    }
    pub fn gt(self, value: impl Into<Value>) -> &'q mut Query {
        self.query.push_op(&self.field, Operator::Gt, value)
    }
    pub fn lt(self, value: impl Into<Value>) -> &'q mut Query {
        self.query.push_op(&self.field, Operator::Lt, value)
    }
    pub fn gte(self, value: impl Into<Value>) -> &'q mut Query {
        self.query.push_op(&self.field, Operator::Gte, value)
    }
    pub fn lte(self, value: impl Into<Value>) -> &'q mut Query {
        self.query.push_op(&self.field, Operator::Lte, value)
    }
}

// ------------- Bound Queries -------------
#[derive(Debug, Clone, PartialEq)]
pub struct BoundFilter {
    pub column: String,
    pub column_type: ColumnType,
    pub operator: Operator,
    pub value: Value,
}

impl BoundFilter {
    pub fn matches(&self, properties: &Properties) -> bool {
        properties
            .get(&self.column)
            .is_some_and(|stored| self.operator.test(stored, &self.value))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundQuery {
    filters: Vec<BoundFilter>,
}

impl BoundQuery {
    pub fn filters(&self) -> &[BoundFilter] {
        &self.filters
    }
    pub fn matches(&self, properties: &Properties) -> bool {
        self.filters.iter().all(|filter| filter.matches(properties))
    }
}
