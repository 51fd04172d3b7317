//! Filter predicates for stores that evaluate queries themselves.
//!
//! Supports the subset of the MongoDB query language fixtures commonly use:
//! field equality (with dotted paths and array membership), the comparison
//! operators, `$in`/`$nin`, `$exists`, and the `$and`/`$or`/`$nor`
//! combinators.

use std::cmp::Ordering;

use docseed_core::{Document, Error, Mapping, Result};
use serde_json::Value;

/// Returns true when `document` satisfies `query`.
pub fn matches_query(document: &Document, query: &Document) -> Result<bool> {
    let query = query
        .as_object()
        .ok_or_else(|| Error::Store("query must be a mapping".to_string()))?;
    matches_mapping(document, query)
}

fn matches_mapping(document: &Document, query: &Mapping) -> Result<bool> {
    for (key, condition) in query {
        let matched = match key.as_str() {
            "$and" => all_match(document, condition)?,
            "$or" => any_match(document, condition)?,
            "$nor" => !any_match(document, condition)?,
            other if other.starts_with('$') => {
                return Err(Error::Store(format!(
                    "unsupported top-level query operator {other}"
                )));
            }
            path => matches_field(lookup(document, path), condition)?,
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn subqueries(condition: &Value) -> Result<&Vec<Value>> {
    condition
        .as_array()
        .ok_or_else(|| Error::Store("logical query operators expect a list".to_string()))
}

fn all_match(document: &Document, condition: &Value) -> Result<bool> {
    for query in subqueries(condition)? {
        if !matches_query(document, query)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn any_match(document: &Document, condition: &Value) -> Result<bool> {
    for query in subqueries(condition)? {
        if matches_query(document, query)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn matches_field(value: Option<&Value>, condition: &Value) -> Result<bool> {
    match condition {
        Value::Object(operators)
            if !operators.is_empty() && operators.keys().all(|key| key.starts_with('$')) =>
        {
            for (operator, operand) in operators {
                if !apply_operator(value, operator, operand)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        _ => Ok(equals(value, condition)),
    }
}

fn apply_operator(value: Option<&Value>, operator: &str, operand: &Value) -> Result<bool> {
    Ok(match operator {
        "$eq" => equals(value, operand),
        "$ne" => !equals(value, operand),
        "$gt" => compares(value, operand, &|ord| ord == Ordering::Greater),
        "$gte" => compares(value, operand, &|ord| ord != Ordering::Less),
        "$lt" => compares(value, operand, &|ord| ord == Ordering::Less),
        "$lte" => compares(value, operand, &|ord| ord != Ordering::Greater),
        "$in" => in_list(value, operand)?,
        "$nin" => !in_list(value, operand)?,
        "$exists" => value.is_some() == operand.as_bool().unwrap_or(true),
        other => {
            return Err(Error::Store(format!("unsupported query operator {other}")));
        }
    })
}

fn in_list(value: Option<&Value>, operand: &Value) -> Result<bool> {
    let candidates = operand
        .as_array()
        .ok_or_else(|| Error::Store("$in and $nin expect a list".to_string()))?;
    Ok(candidates.iter().any(|candidate| equals(value, candidate)))
}

/// Equality as a MongoDB filter sees it: a missing field equals `null`, and
/// an array field matches when any element does.
fn equals(value: Option<&Value>, expected: &Value) -> bool {
    match value {
        None => expected.is_null(),
        Some(value) if same(value, expected) => true,
        Some(Value::Array(items)) => items.iter().any(|item| same(item, expected)),
        Some(_) => false,
    }
}

fn same(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => left.as_f64() == right.as_f64(),
        _ => left == right,
    }
}

fn compares(value: Option<&Value>, operand: &Value, accept: &dyn Fn(Ordering) -> bool) -> bool {
    let Some(value) = value else {
        return false;
    };
    let ordering = match (value, operand) {
        (Value::Number(left), Value::Number(right)) => left
            .as_f64()
            .zip(right.as_f64())
            .and_then(|(left, right)| left.partial_cmp(&right)),
        (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
        (Value::Bool(left), Value::Bool(right)) => Some(left.cmp(right)),
        (Value::Array(items), _) => {
            return items
                .iter()
                .any(|item| compares(Some(item), operand, accept));
        }
        _ => None,
    };
    ordering.is_some_and(accept)
}

fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(document, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|idx| items.get(idx)),
        _ => None,
    })
}
