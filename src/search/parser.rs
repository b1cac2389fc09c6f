//! Free-text and structured search parsing.
//!
//! The free-text grammar is deliberately forgiving: anything that cannot be
//! read as `key value` degrades to a full-text condition instead of failing.

use serde_json::{Map, Number, Value};
use uuid::Uuid;

use super::error::SearchError;
use super::types::{SearchCondition, SearchOp};
use crate::types::AssociateStatus;

/// Parse a free-text query such as `nome João, matricula 1000` into conditions.
///
/// Tokens are separated by `,` or `;`. Each token is read as `key value`,
/// `key: value` or `key=value`; see the value rules in [`parse_value`].
pub fn parse_search_query(input: &str) -> Vec<SearchCondition> {
    input
        .split(|c| c == ',' || c == ';')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(parse_token)
        .collect()
}

fn parse_token(token: &str) -> SearchCondition {
    let Some((raw_key, raw_value)) = split_key_value(token) else {
        return SearchCondition::full_text(token);
    };

    let value = raw_value.trim();
    let key = normalize_key(raw_key);
    if value.is_empty() || !is_identifier(&key) {
        return SearchCondition::full_text(token);
    }

    match key.as_str() {
        "status" | "situacao" => match AssociateStatus::from_loose(value) {
            Some(status) => SearchCondition::Status { status },
            None => SearchCondition::full_text(token),
        },
        "id" => match Uuid::parse_str(value) {
            Ok(id) => SearchCondition::Id { id },
            Err(_) => SearchCondition::full_text(token),
        },
        _ => parse_value(key, value).unwrap_or_else(|| SearchCondition::full_text(token)),
    }
}

/// Split a token into its key and the remaining value text.
///
/// An explicit `:` or `=` separator wins when it appears before any
/// whitespace, so `horario 10:30` keeps the colon inside the value.
fn split_key_value(token: &str) -> Option<(&str, &str)> {
    let sep = token.find(|c| c == ':' || c == '=');
    let space = token.find(char::is_whitespace);

    match (sep, space) {
        (Some(s), Some(w)) if s < w => Some((&token[..s], &token[s + 1..])),
        (Some(s), None) => Some((&token[..s], &token[s + 1..])),
        (_, Some(w)) => {
            let rest = token[w..].trim_start();
            // `nome = João` / `nome : João`
            let rest = match rest.strip_prefix(':') {
                Some(r) => r,
                None if rest.starts_with('=') && !rest.starts_with("==") => &rest[1..],
                None => rest,
            };
            Some((&token[..w], rest))
        }
        (None, None) => None,
    }
}

/// Value rules, in order:
/// quoted text is an exact match; `>=`, `<=`, `>`, `<` need a number;
/// `!=` negates; `a|b|c` is a set; a bare number is an exact match on its
/// text; anything else is a case-insensitive substring.
fn parse_value(key: String, value: &str) -> Option<SearchCondition> {
    if let Some(inner) = unquote(value) {
        return Some(SearchCondition::field(key, SearchOp::Eq, Value::String(inner.to_string())));
    }

    for (prefix, op) in [
        (">=", SearchOp::Gte),
        ("<=", SearchOp::Lte),
        ("!=", SearchOp::Ne),
        (">", SearchOp::Gt),
        ("<", SearchOp::Lt),
    ] {
        if let Some(rest) = value.strip_prefix(prefix) {
            let rest = rest.trim();
            if rest.is_empty() {
                return None;
            }
            if op == SearchOp::Ne {
                let text = unquote(rest).unwrap_or(rest);
                return Some(SearchCondition::field(key, op, Value::String(text.to_string())));
            }
            return parse_number(rest).map(|n| SearchCondition::field(key, op, Value::Number(n)));
        }
    }

    if value.contains('|') {
        let options: Vec<Value> = value
            .split('|')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.to_string()))
            .collect();
        if options.is_empty() {
            return None;
        }
        return Some(SearchCondition::field(key, SearchOp::In, Value::Array(options)));
    }

    if parse_number(value).is_some() {
        return Some(SearchCondition::field(key, SearchOp::Eq, Value::String(value.to_string())));
    }

    Some(SearchCondition::field(key, SearchOp::Contains, Value::String(value.to_string())))
}

fn unquote(value: &str) -> Option<&str> {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        Some(&value[1..value.len() - 1])
    } else {
        None
    }
}

pub(crate) fn parse_number(text: &str) -> Option<Number> {
    if let Ok(i) = text.parse::<i64>() {
        return Some(Number::from(i));
    }
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() && text.chars().any(|c| c.is_ascii_digit()) => Number::from_f64(f),
        _ => None,
    }
}

/// Lower-case, fold Portuguese accents, and map `-` to `_`.
pub(crate) fn normalize_key(raw: &str) -> String {
    raw.trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'ñ' => 'n',
            '-' => '_',
            other => other,
        })
        .collect()
}

pub(crate) fn is_identifier(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 64
        && key.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Parse the structured alternative: `{"nome": {"$ilike": "jo%"}, "matricula": 1000}`.
pub fn parse_where_object(where_data: &Value) -> Result<Vec<SearchCondition>, SearchError> {
    match where_data {
        Value::Null => Ok(vec![]),
        Value::Object(obj) => parse_object(obj),
        _ => Err(SearchError::InvalidWhereClause("WHERE must be an object".to_string())),
    }
}

fn parse_object(obj: &Map<String, Value>) -> Result<Vec<SearchCondition>, SearchError> {
    let mut conditions = Vec::new();
    for (key, value) in obj {
        if key.starts_with('$') {
            conditions.extend(parse_logical_operator(key, value)?);
        } else {
            conditions.extend(parse_field_condition(key, value)?);
        }
    }
    Ok(conditions)
}

fn parse_logical_operator(op: &str, value: &Value) -> Result<Vec<SearchCondition>, SearchError> {
    if op != "$and" && op != "$or" {
        return Err(SearchError::UnsupportedOperator(op.to_string()));
    }
    let arr = value
        .as_array()
        .ok_or_else(|| SearchError::InvalidOperatorData(format!("{} requires array", op)))?;
    if arr.is_empty() {
        return Err(SearchError::InvalidOperatorData(format!(
            "{} requires at least one clause",
            op
        )));
    }

    let mut groups = Vec::with_capacity(arr.len());
    for clause in arr {
        match clause {
            Value::Object(obj) => groups.push(parse_object(obj)?),
            _ => {
                return Err(SearchError::InvalidOperatorData(format!(
                    "{} clauses must be objects",
                    op
                )))
            }
        }
    }

    if op == "$and" {
        Ok(groups.into_iter().flatten().collect())
    } else {
        Ok(vec![SearchCondition::AnyOf { groups }])
    }
}

fn parse_field_condition(field: &str, value: &Value) -> Result<Vec<SearchCondition>, SearchError> {
    if !is_identifier(field) {
        return Err(SearchError::InvalidField(field.to_string()));
    }

    match field {
        "status" => {
            let text = value
                .as_str()
                .or_else(|| value.get("$eq").and_then(Value::as_str))
                .ok_or_else(|| {
                    SearchError::InvalidOperatorData("status requires a string".to_string())
                })?;
            let status = AssociateStatus::from_loose(text)
                .ok_or_else(|| {
                    SearchError::InvalidOperatorData(format!("unknown status: {}", text))
                })?;
            return Ok(vec![SearchCondition::Status { status }]);
        }
        "id" => {
            let id = value
                .as_str()
                .and_then(|s| Uuid::parse_str(s).ok())
                .ok_or_else(|| {
                    SearchError::InvalidOperatorData("id requires a UUID string".to_string())
                })?;
            return Ok(vec![SearchCondition::Id { id }]);
        }
        _ => {}
    }

    match value {
        Value::Object(ops) => ops
            .iter()
            .map(|(op_key, op_val)| {
                let op = map_operator(op_key)?;
                Ok(SearchCondition::field(field, op, operand(op, op_val)?))
            })
            .collect(),
        // Implicit set membership: { field: [a, b] }
        Value::Array(_) => Ok(vec![SearchCondition::field(
            field,
            SearchOp::In,
            operand(SearchOp::In, value)?,
        )]),
        // Implicit equality: { field: value }
        _ => Ok(vec![SearchCondition::field(field, SearchOp::Eq, operand(SearchOp::Eq, value)?)]),
    }
}

fn map_operator(op_key: &str) -> Result<SearchOp, SearchError> {
    Ok(match op_key {
        "$eq" => SearchOp::Eq,
        "$ne" | "$neq" => SearchOp::Ne,
        "$gt" => SearchOp::Gt,
        "$gte" => SearchOp::Gte,
        "$lt" => SearchOp::Lt,
        "$lte" => SearchOp::Lte,
        "$like" => SearchOp::Like,
        "$ilike" => SearchOp::ILike,
        "$in" => SearchOp::In,
        "$contains" => SearchOp::Contains,
        other => return Err(SearchError::UnsupportedOperator(other.to_string())),
    })
}

/// Normalise an operand to what the SQL builder binds: text for comparisons
/// against `->>` output, numbers for numeric comparisons.
fn operand(op: SearchOp, value: &Value) -> Result<Value, SearchError> {
    match op {
        SearchOp::Gt | SearchOp::Gte | SearchOp::Lt | SearchOp::Lte => {
            let number = match value {
                Value::Number(n) => Some(n.clone()),
                Value::String(s) => parse_number(s.trim()),
                _ => None,
            };
            number
                .map(Value::Number)
                .ok_or_else(|| {
                    SearchError::InvalidOperatorData(format!("{:?} requires a number", op))
                })
        }
        SearchOp::In => {
            let values = value
                .as_array()
                .ok_or_else(|| SearchError::InvalidOperatorData("$in requires array".to_string()))?;
            values
                .iter()
                .map(|v| scalar_text(v).map(Value::String))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array)
                .ok_or_else(|| {
                    SearchError::InvalidOperatorData("$in values must be scalars".to_string())
                })
        }
        SearchOp::Like | SearchOp::ILike | SearchOp::Contains => value
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| SearchError::InvalidOperatorData(format!("{:?} requires a string", op))),
        SearchOp::Eq | SearchOp::Ne => {
            if value.is_null() {
                return Ok(Value::Null);
            }
            scalar_text(value)
                .map(Value::String)
                .ok_or_else(|| {
                    SearchError::InvalidOperatorData(format!("{:?} requires a scalar", op))
                })
        }
    }
}

/// Text form of a scalar as Postgres `->>` would render it.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
