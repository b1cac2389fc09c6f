// handlers/protected/associates/collection.rs - /api/associates

use axum::{
    extract::{rejection::JsonRejection, Query},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value;

use super::MetaQuery;
use crate::api::format::{associate_to_api_value, metadata_options_from_query};
use crate::middleware::{ApiResponse, ApiResult, ValidatedAdmin};
use crate::search::SearchRequest;
use crate::services::associate_service::{AssociateInput, SearchPage};
use crate::services::AssociateService;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Free text, e.g. `nome João, matricula 1000`
    pub q: Option<String>,
    /// `active`, `inactive` or `all`
    pub status: Option<String>,
    /// e.g. `nome asc, created_at desc`
    pub order: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub meta: Option<String>,
}

impl ListQuery {
    pub fn to_search_request(&self) -> SearchRequest {
        SearchRequest {
            q: self.q.clone(),
            where_clause: None,
            status: self.status.clone(),
            order: self.order.clone().map(Value::String),
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// GET /api/associates - list and search through query parameters
pub async fn associates_get(
    Extension(admin): Extension<ValidatedAdmin>,
    Query(query): Query<ListQuery>,
) -> ApiResult<SearchPage<Value>> {
    let options = metadata_options_from_query(query.meta.as_deref());
    let page = AssociateService::new()
        .await?
        .search(admin.id, query.to_search_request())
        .await?;
    Ok(ApiResponse::success(page.map(|a| associate_to_api_value(&a, &options))))
}

/**
 * POST /api/associates - create an associate
 *
 * Expected Input:
 * ```json
 * { "data": { "nome": "Ana Souza", "cpf": "529.982.247-25" }, "form_id": "...", "attachments": [] }
 * ```
 *
 * `matricula` is assigned when absent. With `form_id` the data is checked
 * against that form's fields.
 */
pub async fn associates_post(
    Extension(admin): Extension<ValidatedAdmin>,
    Query(query): Query<MetaQuery>,
    payload: Result<Json<AssociateInput>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(input) = payload?;
    let associate = AssociateService::new().await?.create(admin.id, input).await?;
    let options = metadata_options_from_query(query.meta.as_deref());
    Ok(ApiResponse::created(associate_to_api_value(&associate, &options)))
}
