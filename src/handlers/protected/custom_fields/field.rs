// handlers/protected/custom_fields/field.rs - /api/custom-fields[/:id]

use axum::{
    extract::{rejection::JsonRejection, Path},
    Extension, Json,
};
use uuid::Uuid;

use crate::database::models::CustomField;
use crate::forms::FormField;
use crate::middleware::{ApiResponse, ApiResult, ValidatedAdmin};
use crate::services::CustomFieldService;

/// POST /api/custom-fields - body is a single field definition
/// (`{ "key": "tamanho_camiseta", "label": "...", "kind": "select", "options": [...] }`)
pub async fn custom_fields_post(
    Extension(admin): Extension<ValidatedAdmin>,
    payload: Result<Json<FormField>, JsonRejection>,
) -> ApiResult<CustomField> {
    let Json(definition) = payload?;
    let field = CustomFieldService::new().await?.create(admin.id, definition).await?;
    Ok(ApiResponse::created(field))
}

/// GET /api/custom-fields
pub async fn custom_fields_get(Extension(admin): Extension<ValidatedAdmin>) -> ApiResult<Vec<CustomField>> {
    let fields = CustomFieldService::new().await?.list(admin.id).await?;
    Ok(ApiResponse::success(fields))
}

/// DELETE /api/custom-fields/:id
pub async fn custom_field_delete(Extension(admin): Extension<ValidatedAdmin>, Path(id): Path<Uuid>) -> ApiResult<()> {
    CustomFieldService::new().await?.delete(admin.id, id).await?;
    Ok(ApiResponse::no_content())
}
