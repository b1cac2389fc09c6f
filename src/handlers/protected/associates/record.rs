// handlers/protected/associates/record.rs - /api/associates/:id

use axum::{
    extract::{rejection::JsonRejection, Path, Query},
    Extension, Json,
};
use serde_json::Value;
use uuid::Uuid;

use super::MetaQuery;
use crate::api::format::{associate_to_api_value, metadata_options_from_query};
use crate::middleware::{ApiResponse, ApiResult, ValidatedAdmin};
use crate::services::associate_service::{AssociateInput, AssociatePatch};
use crate::services::AssociateService;

/// GET /api/associates/:id
pub async fn associate_get(
    Extension(admin): Extension<ValidatedAdmin>,
    Path(id): Path<Uuid>,
    Query(query): Query<MetaQuery>,
) -> ApiResult<Value> {
    let associate = AssociateService::new().await?.get(admin.id, id).await?;
    let options = metadata_options_from_query(query.meta.as_deref());
    Ok(ApiResponse::success(associate_to_api_value(&associate, &options)))
}

/// PUT /api/associates/:id - replace the data document
pub async fn associate_put(
    Extension(admin): Extension<ValidatedAdmin>,
    Path(id): Path<Uuid>,
    Query(query): Query<MetaQuery>,
    payload: Result<Json<AssociateInput>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(input) = payload?;
    let associate = AssociateService::new().await?.replace(admin.id, id, input).await?;
    let options = metadata_options_from_query(query.meta.as_deref());
    Ok(ApiResponse::success(associate_to_api_value(&associate, &options)))
}

/// PATCH /api/associates/:id - shallow merge; `null` removes a key
pub async fn associate_patch(
    Extension(admin): Extension<ValidatedAdmin>,
    Path(id): Path<Uuid>,
    Query(query): Query<MetaQuery>,
    payload: Result<Json<AssociatePatch>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(patch) = payload?;
    let associate = AssociateService::new().await?.patch(admin.id, id, patch).await?;
    let options = metadata_options_from_query(query.meta.as_deref());
    Ok(ApiResponse::success(associate_to_api_value(&associate, &options)))
}

/// DELETE /api/associates/:id - soft delete
pub async fn associate_delete(Extension(admin): Extension<ValidatedAdmin>, Path(id): Path<Uuid>) -> ApiResult<()> {
    AssociateService::new().await?.delete(admin.id, id).await?;
    Ok(ApiResponse::no_content())
}
