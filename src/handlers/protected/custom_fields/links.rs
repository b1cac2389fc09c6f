// handlers/protected/custom_fields/links.rs - POST /api/custom-fields/:id/links

use axum::{
    extract::{rejection::JsonRejection, Path},
    Extension, Json,
};
use uuid::Uuid;

use crate::middleware::{ApiResponse, ApiResult, ValidatedAdmin};
use crate::services::custom_field_service::FieldLinkRequest;
use crate::services::{CustomFieldService, IssuedLink};
use crate::AppState;

/**
 * POST /api/custom-fields/:id/links - one single-use link per associate
 *
 * Expected Input:
 * ```json
 * { "associate_ids": ["...", "..."], "ttl_hours": 72 }
 * ```
 *
 * Each link goes to the configured notifier; `notified` reports whether
 * delivery succeeded.
 */
pub async fn custom_field_links_post(
    Extension(admin): Extension<ValidatedAdmin>,
    Extension(state): Extension<AppState>,
    Path(field_id): Path<Uuid>,
    payload: Result<Json<FieldLinkRequest>, JsonRejection>,
) -> ApiResult<Vec<IssuedLink>> {
    let Json(request) = payload?;
    let links = CustomFieldService::new()
        .await?
        .issue_links(admin.id, field_id, request, state.notifier.clone())
        .await?;
    Ok(ApiResponse::created(links))
}
