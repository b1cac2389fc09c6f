use serde_json::Value;

use super::error::SearchError;
use super::parser::{is_identifier, normalize_key};
use super::types::{SearchOrderInfo, SortDirection, SortTarget};

/// Columns of the associates table that can be ordered on directly.
const SYSTEM_COLUMNS: &[&str] = &["id", "status", "created_at", "updated_at", "inactivated_at"];

pub struct SearchOrder;

impl SearchOrder {
    pub fn parse(order: &Value) -> Result<Vec<SearchOrderInfo>, SearchError> {
        match order {
            Value::Null => Ok(vec![]),
            Value::String(s) => Self::parse_order_string(s),
            Value::Array(arr) => {
                // Expect array of strings like ["created_at desc", "nome asc"]
                let mut out = Vec::new();
                for v in arr {
                    match v {
                        Value::String(s) => out.extend(Self::parse_order_string(s)?),
                        other => {
                            return Err(SearchError::InvalidOrder(format!(
                                "unexpected order entry: {}",
                                other
                            )))
                        }
                    }
                }
                Ok(out)
            }
            Value::Object(obj) => {
                // { "created_at": "desc", "nome": "asc" }
                let mut out = Vec::new();
                for (k, v) in obj {
                    let sort = Self::direction(v.as_str().unwrap_or("asc"))?;
                    out.push(SearchOrderInfo { target: Self::target(k)?, sort });
                }
                Ok(out)
            }
            _ => Err(SearchError::InvalidOrder(
                "order must be a string, array or object".to_string(),
            )),
        }
    }

    fn parse_order_string(s: &str) -> Result<Vec<SearchOrderInfo>, SearchError> {
        // split on commas, then each token into column and direction
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut it = trimmed.split_whitespace();
            if let Some(col) = it.next() {
                let sort = Self::direction(it.next().unwrap_or("asc"))?;
                out.push(SearchOrderInfo { target: Self::target(col)?, sort });
            }
        }
        Ok(out)
    }

    fn direction(dir: &str) -> Result<SortDirection, SearchError> {
        match dir.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(SearchError::InvalidOrder(format!("unknown sort direction: {}", other))),
        }
    }

    fn target(name: &str) -> Result<SortTarget, SearchError> {
        let key = normalize_key(name);
        if !is_identifier(&key) {
            return Err(SearchError::InvalidField(name.to_string()));
        }
        if SYSTEM_COLUMNS.contains(&key.as_str()) {
            Ok(SortTarget::Column(key))
        } else {
            Ok(SortTarget::DataKey(key))
        }
    }

    /// Renders ORDER BY; newest first when nothing was requested, and always
    /// ends on `id` so pagination is stable.
    pub fn generate(infos: &[SearchOrderInfo]) -> String {
        let mut parts: Vec<String> = infos
            .iter()
            .map(|i| match &i.target {
                SortTarget::Column(c) => format!("\"{}\" {}", c, i.sort.to_sql()),
                // Identifier-validated above, so inlining the literal is safe
                SortTarget::DataKey(k) => format!("\"data\" ->> '{}' {}", k, i.sort.to_sql()),
            })
            .collect();

        if parts.is_empty() {
            parts.push("\"created_at\" DESC".to_string());
        }
        if !infos.iter().any(|i| i.target == SortTarget::Column("id".to_string())) {
            parts.push("\"id\" ASC".to_string());
        }
        format!("ORDER BY {}", parts.join(", "))
    }
}
