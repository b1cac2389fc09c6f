use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::types::AssociateStatus;

/// Comparison applied to a single key of the associate `data` document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchOp {
    #[serde(rename = "$eq")] Eq,
    #[serde(rename = "$ne")] Ne,
    #[serde(rename = "$gt")] Gt,
    #[serde(rename = "$gte")] Gte,
    #[serde(rename = "$lt")] Lt,
    #[serde(rename = "$lte")] Lte,
    /// Case-insensitive substring, wildcards in the value are escaped
    #[serde(rename = "$contains")] Contains,
    #[serde(rename = "$like")] Like,
    #[serde(rename = "$ilike")] ILike,
    #[serde(rename = "$in")] In,
}

impl SearchOp {
    pub fn sql_comparator(&self) -> &'static str {
        match self {
            SearchOp::Eq => "=",
            SearchOp::Ne => "IS DISTINCT FROM",
            SearchOp::Gt => ">",
            SearchOp::Gte => ">=",
            SearchOp::Lt => "<",
            SearchOp::Lte => "<=",
            SearchOp::Contains | SearchOp::ILike => "ILIKE",
            SearchOp::Like => "LIKE",
            SearchOp::In => "IN",
        }
    }
}

/// One typed condition produced from free text or a structured `where` object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchCondition {
    Field { key: String, op: SearchOp, value: Value },
    Status { status: AssociateStatus },
    Id { id: Uuid },
    FullText { text: String },
    /// Any one of the groups must match; conditions inside a group are ANDed
    AnyOf { groups: Vec<Vec<SearchCondition>> },
}

impl SearchCondition {
    pub fn field(key: impl Into<String>, op: SearchOp, value: Value) -> Self {
        SearchCondition::Field { key: key.into(), op, value }
    }

    pub fn full_text(text: impl Into<String>) -> Self {
        SearchCondition::FullText { text: text.into() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text query, e.g. `nome João, matricula 1000`
    pub q: Option<String>,
    #[serde(rename = "where")]
    pub where_clause: Option<Value>,
    pub status: Option<String>,
    pub order: Option<Value>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub admin_id: Uuid,
    pub include_deleted: bool,
}

impl SearchOptions {
    pub fn for_admin(admin_id: Uuid) -> Self {
        Self { admin_id, include_deleted: false }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SortTarget {
    Column(String),
    DataKey(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOrderInfo {
    pub target: SortTarget,
    pub sort: SortDirection,
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}
