// Parser for the textual filter syntax, see filter.pest for the grammar.
use std::str::FromStr;

use pest::Parser;
use pest::error::LineColLocation;
use pest::iterators::Pair;
use pest_derive::Parser;

use crate::datatype::Value;
use crate::error::{OrmletError, Result};
use crate::query::{Operator, Query};

#[derive(Parser)]
#[grammar = "filter.pest"]
struct FilterParser;

fn parse_error(e: pest::error::Error<Rule>) -> OrmletError {
    let (line, col) = match e.line_col {
        LineColLocation::Pos((line, col)) => (line, col),
        LineColLocation::Span((line, col), _) => (line, col),
    };
    OrmletError::Parse { message: e.variant.message().to_string(), line: Some(line), col: Some(col) }
}

fn unexpected(pair: &Pair<Rule>) -> OrmletError {
    let (line, col) = pair.as_span().start_pos().line_col();
    OrmletError::Parse { message: format!("unexpected '{}'", pair.as_str()), line: Some(line), col: Some(col) }
}

fn unescape(raw: &str) -> String {
    let mut text = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => text.extend(chars.next()),
            c => text.push(c),
        }
    }
    text
}

fn literal(pair: Pair<Rule>) -> Result<Value> {
    match pair.as_rule() {
        Rule::string => Ok(Value::Text(unescape(
            pair.into_inner().next().map(|inner| inner.as_str()).unwrap_or_default(),
        ))),
        Rule::number => pair.as_str().parse::<f64>().map(Value::Number).map_err(|_| unexpected(&pair)),
        Rule::boolean => Ok(Value::Boolean(pair.as_str().eq_ignore_ascii_case("true"))),
        _ => Err(unexpected(&pair)),
    }
}

/// Parses `age > 5 and name = "John"` into a query. An empty text is an
/// empty query.
pub fn parse(text: &str) -> Result<Query> {
    let mut query = Query::new();
    let pairs = FilterParser::parse(Rule::query, text).map_err(parse_error)?;
    for filter in pairs.flat_map(|root| root.into_inner()).filter(|p| p.as_rule() == Rule::filter) {
        let mut parts = filter.into_inner();
        let (Some(field), Some(operator), Some(value)) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };
        let parsed = Operator::from_token(operator.as_str()).ok_or_else(|| unexpected(&operator))?;
        query.push_op(field.as_str(), parsed, literal(value)?);
    }
    Ok(query)
}

impl Query {
    pub fn parse(text: &str) -> Result<Query> {
        parse(text)
    }
}

impl FromStr for Query {
    type Err = OrmletError;
    fn from_str(text: &str) -> Result<Query> {
        parse(text)
    }
}
