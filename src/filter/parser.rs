//! Filter Parser
//!
//! Parses the JSON text form of a filter into a [`Filter`] tree. Only the
//! shape is checked here; see [`crate::filter::validate_filter`] for
//! semantic checks.

use serde_json::{Map, Value};

use crate::filter::ast::Filter;
use crate::filter::error::{FilterError, FilterResult};

/// Parse a filter from its JSON text form
pub fn parse_filter(input: &str) -> FilterResult<Filter> {
    let value: Value = serde_json::from_str(input.trim())
        .map_err(|e| FilterError::Syntax(format!("invalid JSON: {}", e)))?;
    parse_value(&value)
}

/// Parse a filter from an already decoded JSON value
pub fn parse_value(value: &Value) -> FilterResult<Filter> {
    match value {
        Value::String(s) => Ok(Filter::Eq(s.clone())),
        Value::Object(map) => parse_operator(map),
        other => Err(FilterError::Syntax(format!(
            "expected a string or an operator object, got {}",
            json_type(other)
        ))),
    }
}

fn parse_operator(map: &Map<String, Value>) -> FilterResult<Filter> {
    let mut entries = map.iter();
    let (op, operand) = match (entries.next(), entries.next()) {
        (Some(entry), None) => entry,
        (None, _) => return Err(FilterError::Syntax("empty filter object".to_string())),
        (Some(_), Some(_)) => {
            return Err(FilterError::Syntax(format!(
                "filter object must have exactly one operator, got {}",
                map.len()
            )))
        }
    };

    match op.as_str() {
        "$eq" => Ok(Filter::Eq(string_operand(op, operand)?)),
        "$ne" => Ok(Filter::Ne(string_operand(op, operand)?)),
        "$gt" => Ok(Filter::Gt(string_operand(op, operand)?)),
        "$gte" => Ok(Filter::Gte(string_operand(op, operand)?)),
        "$lt" => Ok(Filter::Lt(string_operand(op, operand)?)),
        "$lte" => Ok(Filter::Lte(string_operand(op, operand)?)),
        "$like" => Ok(Filter::Like(string_operand(op, operand)?)),
        "$nlike" => Ok(Filter::NotLike(string_operand(op, operand)?)),
        "$match" => Ok(Filter::Match(string_operand(op, operand)?)),
        "$in" => Ok(Filter::In(string_list_operand(op, operand)?)),
        "$nin" => Ok(Filter::Nin(string_list_operand(op, operand)?)),
        "$and" => Ok(Filter::And(filter_list_operand(op, operand)?)),
        "$or" => Ok(Filter::Or(filter_list_operand(op, operand)?)),
        "$not" => Ok(Filter::Not(Box::new(parse_value(operand)?))),
        unknown => Err(FilterError::Syntax(format!("unknown operator '{}'", unknown))),
    }
}

fn string_operand(op: &str, operand: &Value) -> FilterResult<String> {
    operand
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            FilterError::Syntax(format!(
                "{} expects a string, got {}",
                op,
                json_type(operand)
            ))
        })
}

fn string_list_operand(op: &str, operand: &Value) -> FilterResult<Vec<String>> {
    let items = operand.as_array().ok_or_else(|| {
        FilterError::Syntax(format!("{} expects an array, got {}", op, json_type(operand)))
    })?;
    items.iter().map(|item| string_operand(op, item)).collect()
}

fn filter_list_operand(op: &str, operand: &Value) -> FilterResult<Vec<Filter>> {
    let items = operand.as_array().ok_or_else(|| {
        FilterError::Syntax(format!("{} expects an array, got {}", op, json_type(operand)))
    })?;
    items.iter().map(parse_value).collect()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
