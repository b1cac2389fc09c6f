// handlers/protected/associates/search.rs - POST /api/associates/search

use axum::{
    extract::{rejection::JsonRejection, Query},
    Extension, Json,
};
use serde_json::Value;

use super::MetaQuery;
use crate::api::format::{associate_to_api_value, metadata_options_from_query};
use crate::middleware::{ApiResponse, ApiResult, ValidatedAdmin};
use crate::search::SearchRequest;
use crate::services::associate_service::SearchPage;
use crate::services::AssociateService;

/**
 * POST /api/associates/search - structured search
 *
 * Expected Input (every key optional):
 * ```json
 * {
 *   "q": "cidade Recife",
 *   "where": { "salario": { "$gte": 3000 }, "$or": [{ "cargo": "Analista" }, { "cargo": "Gerente" }] },
 *   "status": "active",
 *   "order": "nome asc",
 *   "limit": 20,
 *   "offset": 0
 * }
 * ```
 */
pub async fn associates_search(
    Extension(admin): Extension<ValidatedAdmin>,
    Query(query): Query<MetaQuery>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> ApiResult<SearchPage<Value>> {
    let Json(request) = payload?;
    let options = metadata_options_from_query(query.meta.as_deref());
    let page = AssociateService::new().await?.search(admin.id, request).await?;
    Ok(ApiResponse::success(page.map(|a| associate_to_api_value(&a, &options))))
}
