use serde_json::Value;

use super::error::SearchError;
use super::parser::{parse_search_query, parse_where_object};
use super::search_order::SearchOrder;
use super::search_where::SearchWhere;
use super::types::{SearchCondition, SearchOptions, SearchOrderInfo, SearchRequest, SqlResult};
use crate::types::AssociateStatus;

pub const ASSOCIATES_TABLE: &str = "associates";

/// Builder for associate searches: free text, structured where, status,
/// ordering and pagination, rendered to parameterised SQL.
pub struct Search {
    options: SearchOptions,
    conditions: Vec<SearchCondition>,
    order_data: Vec<SearchOrderInfo>,
    limit: i64,
    offset: i64,
}

impl Search {
    pub fn new(options: SearchOptions) -> Self {
        Self {
            options,
            conditions: vec![],
            order_data: vec![],
            limit: crate::config::CONFIG.search.default_limit,
            offset: 0,
        }
    }

    pub fn assign(&mut self, request: SearchRequest) -> Result<&mut Self, SearchError> {
        if let Some(q) = request.q.as_deref() {
            self.query(q);
        }
        if let Some(where_clause) = request.where_clause.as_ref() {
            self.where_object(where_clause)?;
        }
        if let Some(status) = request.status.as_deref() {
            self.status(status)?;
        }
        if let Some(order) = request.order.as_ref() {
            self.order(order)?;
        }
        if request.limit.is_some() || request.offset.is_some() {
            self.limit(request.limit.unwrap_or(self.limit), request.offset)?;
        }
        Ok(self)
    }

    pub fn query(&mut self, text: &str) -> &mut Self {
        let parsed = parse_search_query(text);
        if crate::config::CONFIG.search.debug_logging {
            tracing::debug!("Parsed search query {:?} into {:?}", text, parsed);
        }
        self.conditions.extend(parsed);
        self
    }

    pub fn where_object(&mut self, where_data: &Value) -> Result<&mut Self, SearchError> {
        self.conditions.extend(parse_where_object(where_data)?);
        Ok(self)
    }

    pub fn status(&mut self, status: &str) -> Result<&mut Self, SearchError> {
        // `all` (or empty) means no lifecycle filter
        if status.is_empty() || status.eq_ignore_ascii_case("all") {
            return Ok(self);
        }
        let status = AssociateStatus::from_loose(status)
            .ok_or_else(|| {
                SearchError::InvalidOperatorData(format!("unknown status: {}", status))
            })?;
        self.conditions.push(SearchCondition::Status { status });
        Ok(self)
    }

    pub fn condition(&mut self, condition: SearchCondition) -> &mut Self {
        self.conditions.push(condition);
        self
    }

    pub fn order(&mut self, order_spec: &Value) -> Result<&mut Self, SearchError> {
        self.order_data = SearchOrder::parse(order_spec)?;
        Ok(self)
    }

    pub fn limit(&mut self, limit: i64, offset: Option<i64>) -> Result<&mut Self, SearchError> {
        if limit < 0 {
            return Err(SearchError::InvalidLimit("Limit must be non-negative".to_string()));
        }
        if offset.is_some_and(|off| off < 0) {
            return Err(SearchError::InvalidOffset("Offset must be non-negative".to_string()));
        }

        // Apply max limit from config
        let max_limit = crate::config::CONFIG.search.max_limit.unwrap_or(i64::MAX);
        let applied_limit = if limit > max_limit {
            if crate::config::CONFIG.search.debug_logging {
                tracing::warn!("Limit {} exceeds max {}, capping to max", limit, max_limit);
            }
            max_limit
        } else {
            limit
        };

        self.limit = applied_limit;
        self.offset = offset.unwrap_or(0);
        Ok(self)
    }

    pub fn conditions(&self) -> &[SearchCondition] {
        &self.conditions
    }

    pub fn applied_limit(&self) -> i64 {
        self.limit
    }

    pub fn applied_offset(&self) -> i64 {
        self.offset
    }

    pub fn to_where_sql(&self) -> Result<SqlResult, SearchError> {
        let (query, params) = SearchWhere::generate(&self.conditions, &self.options)?;
        Ok(SqlResult { query, params })
    }

    pub fn to_sql(&self) -> Result<SqlResult, SearchError> {
        let where_result = self.to_where_sql()?;
        let query = [
            "SELECT *".to_string(),
            format!("FROM \"{}\"", ASSOCIATES_TABLE),
            format!("WHERE {}", where_result.query),
            SearchOrder::generate(&self.order_data),
            format!("LIMIT {} OFFSET {}", self.limit, self.offset),
        ]
        .join(" ");

        Ok(SqlResult { query, params: where_result.params })
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, SearchError> {
        let where_result = self.to_where_sql()?;
        let query = format!(
            "SELECT COUNT(*) as count FROM \"{}\" WHERE {}",
            ASSOCIATES_TABLE, where_result.query
        );
        Ok(SqlResult { query, params: where_result.params })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn search() -> Search {
        Search::new(SearchOptions::for_admin(Uuid::nil()))
    }

    #[test]
    fn full_request_renders_select() {
        let mut s = search();
        s.assign(SearchRequest {
            q: Some("nome João".to_string()),
            where_clause: Some(json!({ "cidade": "Recife" })),
            status: Some("ativo".to_string()),
            order: Some(json!("nome")),
            limit: Some(10),
            offset: Some(20),
        })
        .unwrap();

        let sql = s.to_sql().unwrap();
        assert!(sql
            .query
            .starts_with("SELECT * FROM \"associates\" WHERE \"admin_id\" = $1::uuid"));
        assert!(sql.query.contains("\"status\" = $"));
        assert!(sql.query.contains("ORDER BY \"data\" ->> 'nome' ASC, \"id\" ASC"));
        assert!(sql.query.ends_with("LIMIT 10 OFFSET 20"));
        // admin, nome key/value, cidade key/value, status
        assert_eq!(sql.params.len(), 6);
    }

    #[test]
    fn count_shares_where_and_params() {
        let mut s = search();
        s.query("matricula 1000");
        let select = s.to_sql().unwrap();
        let count = s.to_count_sql().unwrap();
        assert!(count.query.starts_with("SELECT COUNT(*) as count FROM \"associates\" WHERE"));
        assert!(!count.query.contains("LIMIT"));
        assert_eq!(select.params, count.params);
    }

    #[test]
    fn limit_validation_and_cap() {
        let mut s = search();
        assert!(s.limit(-1, None).is_err());
        assert!(s.limit(5, Some(-3)).is_err());

        let max = crate::config::CONFIG.search.max_limit.unwrap_or(i64::MAX);
        s.limit(i64::MAX, None).unwrap();
        assert_eq!(s.applied_limit(), max);
        assert_eq!(s.applied_offset(), 0);
    }

    #[test]
    fn status_all_adds_nothing() {
        let mut s = search();
        s.status("all").unwrap();
        assert!(s.conditions().is_empty());
        assert!(s.status("suspenso").is_err());
    }
}
