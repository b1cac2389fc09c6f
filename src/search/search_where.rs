use serde_json::Value;

use super::error::SearchError;
use super::types::{SearchCondition, SearchOp, SearchOptions};

/// Matches the text Postgres renders for a JSON number, used to guard casts.
const NUMERIC_PATTERN: &str = "'^-?[0-9]+(\\.[0-9]+)?$'";

/// Renders search conditions as a parameterised WHERE clause over the
/// `associates` table. Keys and values are always bound, never inlined.
pub struct SearchWhere {
    param_values: Vec<Value>,
}

impl SearchWhere {
    fn new() -> Self {
        Self { param_values: vec![] }
    }

    pub fn generate(
        conditions: &[SearchCondition],
        options: &SearchOptions,
    ) -> Result<(String, Vec<Value>), SearchError> {
        let mut search_where = Self::new();
        let mut sql_conditions = vec![];

        let admin = search_where.param(Value::String(options.admin_id.to_string()));
        sql_conditions.push(format!("\"admin_id\" = {}::uuid", admin));
        if !options.include_deleted {
            sql_conditions.push("\"deleted_at\" IS NULL".to_string());
        }

        for condition in conditions {
            sql_conditions.push(search_where.build_sql_condition(condition)?);
        }

        Ok((sql_conditions.join(" AND "), search_where.param_values))
    }

    fn build_sql_condition(&mut self, condition: &SearchCondition) -> Result<String, SearchError> {
        match condition {
            SearchCondition::Field { key, op, value } => {
                self.build_field_condition(key, *op, value)
            }
            SearchCondition::Status { status } => {
                let p = self.param(Value::String(status.as_str().to_string()));
                Ok(format!("\"status\" = {}", p))
            }
            SearchCondition::Id { id } => {
                Ok(format!("\"id\" = {}::uuid", self.param(Value::String(id.to_string()))))
            }
            SearchCondition::FullText { text } => {
                let pattern = format!("%{}%", escape_like(text));
                Ok(format!("\"data\"::text ILIKE {}", self.param(Value::String(pattern))))
            }
            SearchCondition::AnyOf { groups } => {
                if groups.is_empty() {
                    return Ok("1=0".to_string());
                }
                let mut alternatives = Vec::with_capacity(groups.len());
                for group in groups {
                    let parts = group
                        .iter()
                        .map(|c| self.build_sql_condition(c))
                        .collect::<Result<Vec<_>, _>>()?;
                    let alternative = if parts.is_empty() {
                        "1=1".to_string()
                    } else {
                        format!("({})", parts.join(" AND "))
                    };
                    alternatives.push(alternative);
                }
                Ok(format!("({})", alternatives.join(" OR ")))
            }
        }
    }

    fn build_field_condition(
        &mut self,
        key: &str,
        op: SearchOp,
        value: &Value,
    ) -> Result<String, SearchError> {
        let column = format!("(\"data\" ->> {}::text)", self.param(Value::String(key.to_string())));

        match op {
            SearchOp::Eq => {
                if value.is_null() {
                    Ok(format!("{} IS NULL", column))
                } else {
                    Ok(format!("{} = {}", column, self.text_param(value)?))
                }
            }
            SearchOp::Ne => {
                if value.is_null() {
                    Ok(format!("{} IS NOT NULL", column))
                } else {
                    Ok(format!("{} IS DISTINCT FROM {}", column, self.text_param(value)?))
                }
            }
            SearchOp::Gt | SearchOp::Gte | SearchOp::Lt | SearchOp::Lte => {
                let number = match value {
                    Value::Number(n) => n.clone(),
                    _ => {
                        return Err(SearchError::InvalidOperatorData(format!(
                            "{:?} requires a number",
                            op
                        )))
                    }
                };
                let p = self.param(Value::Number(number));
                // Rows whose value is not numeric yield NULL and drop out instead of erroring
                Ok(format!(
                    "(CASE WHEN {col} ~ {pat} THEN {col}::numeric END) {cmp} {p}::numeric",
                    col = column,
                    pat = NUMERIC_PATTERN,
                    cmp = op.sql_comparator(),
                    p = p,
                ))
            }
            SearchOp::Contains => {
                let text = value
                    .as_str()
                    .ok_or_else(|| {
                        SearchError::InvalidOperatorData("$contains requires a string".to_string())
                    })?;
                let p = self.param(Value::String(format!("%{}%", escape_like(text))));
                Ok(format!("{} ILIKE {}", column, p))
            }
            SearchOp::Like | SearchOp::ILike => {
                let p = self.text_param(value)?;
                Ok(format!("{} {} {}", column, op.sql_comparator(), p))
            }
            SearchOp::In => {
                let values = value
                    .as_array()
                    .ok_or_else(|| {
                        SearchError::InvalidOperatorData("$in requires array".to_string())
                    })?;
                if values.is_empty() {
                    return Ok("1=0".to_string());
                }
                let params = values
                    .iter()
                    .map(|v| self.text_param(v))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("{} IN ({})", column, params.join(", ")))
            }
        }
    }

    fn text_param(&mut self, value: &Value) -> Result<String, SearchError> {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => {
                return Err(SearchError::InvalidOperatorData(
                    "expected a scalar value".to_string(),
                ))
            }
        };
        Ok(self.param(Value::String(text)))
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        format!("${}", self.param_values.len())
    }
}

/// Escape LIKE wildcards so user text matches literally (backslash is the
/// default escape character in Postgres).
pub fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::parser::parse_search_query;
    use crate::types::AssociateStatus;
    use serde_json::json;
    use uuid::Uuid;

    fn options() -> SearchOptions {
        SearchOptions::for_admin(Uuid::nil())
    }

    #[test]
    fn empty_conditions_scope_to_admin() {
        let (sql, params) = SearchWhere::generate(&[], &options()).unwrap();
        assert_eq!(sql, "\"admin_id\" = $1::uuid AND \"deleted_at\" IS NULL");
        assert_eq!(params, vec![json!(Uuid::nil().to_string())]);
    }

    #[test]
    fn include_deleted_drops_soft_delete_guard() {
        let opts = SearchOptions { admin_id: Uuid::nil(), include_deleted: true };
        let (sql, _) = SearchWhere::generate(&[], &opts).unwrap();
        assert!(!sql.contains("deleted_at"));
    }

    #[test]
    fn free_text_query_renders_bound_conditions() {
        let conditions = parse_search_query("nome João, matricula 1000");
        let (sql, params) = SearchWhere::generate(&conditions, &options()).unwrap();

        assert_eq!(
            sql,
            "\"admin_id\" = $1::uuid AND \"deleted_at\" IS NULL \
             AND (\"data\" ->> $2::text) ILIKE $3 \
             AND (\"data\" ->> $4::text) = $5"
        );
        assert_eq!(params[1], json!("nome"));
        assert_eq!(params[2], json!("%João%"));
        assert_eq!(params[3], json!("matricula"));
        assert_eq!(params[4], json!("1000"));
    }

    #[test]
    fn user_text_never_reaches_sql() {
        let conditions = parse_search_query("nome x' OR 1=1 --, robert'); DROP TABLE associates;--");
        let (sql, _) = SearchWhere::generate(&conditions, &options()).unwrap();
        assert!(!sql.contains("DROP"));
        assert!(!sql.contains("OR 1=1"));
    }

    #[test]
    fn numeric_comparison_is_guarded() {
        let conditions = parse_search_query("salario >= 2500");
        let (sql, params) = SearchWhere::generate(&conditions, &options()).unwrap();
        assert!(sql.contains("CASE WHEN (\"data\" ->> $2::text) ~ '^-?[0-9]+(\\.[0-9]+)?$'"));
        assert!(sql.ends_with(">= $3::numeric"));
        assert_eq!(params[2], json!(2500));
    }

    #[test]
    fn status_id_and_full_text() {
        let id = Uuid::new_v4();
        let conditions = vec![
            SearchCondition::Status { status: AssociateStatus::Inactive },
            SearchCondition::Id { id },
            SearchCondition::full_text("50%_off"),
        ];
        let (sql, params) = SearchWhere::generate(&conditions, &options()).unwrap();
        assert!(sql.contains("\"status\" = $2"));
        assert!(sql.contains("\"id\" = $3::uuid"));
        assert!(sql.contains("\"data\"::text ILIKE $4"));
        assert_eq!(params[1], json!("inactive"));
        assert_eq!(params[2], json!(id.to_string()));
        assert_eq!(params[3], json!("%50\\%\\_off%"));
    }

    #[test]
    fn empty_in_matches_nothing() {
        let conditions = vec![SearchCondition::field("setor", SearchOp::In, json!([]))];
        let (sql, _) = SearchWhere::generate(&conditions, &options()).unwrap();
        assert!(sql.ends_with("AND 1=0"));
    }

    #[test]
    fn any_of_groups_are_ored() {
        let conditions = vec![SearchCondition::AnyOf {
            groups: vec![
                vec![SearchCondition::field("cidade", SearchOp::Eq, json!("Recife"))],
                vec![SearchCondition::field("cidade", SearchOp::Eq, json!("Olinda"))],
            ],
        }];
        let (sql, params) = SearchWhere::generate(&conditions, &options()).unwrap();
        assert!(sql.contains("(((\"data\" ->> $2::text) = $3) OR ((\"data\" ->> $4::text) = $5))"));
        assert_eq!(params.len(), 5);
    }

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("a_b%c\\d"), "a\\_b\\%c\\\\d");
    }
}
