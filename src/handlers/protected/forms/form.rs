// handlers/protected/forms/form.rs - /api/forms[/:id]

use axum::{
    extract::{rejection::JsonRejection, Path},
    Extension, Json,
};
use uuid::Uuid;

use crate::database::models::Form;
use crate::middleware::{ApiResponse, ApiResult, ValidatedAdmin};
use crate::services::form_service::FormInput;
use crate::services::FormService;

/// GET /api/forms
pub async fn forms_get(Extension(admin): Extension<ValidatedAdmin>) -> ApiResult<Vec<Form>> {
    let forms = FormService::new().await?.list(admin.id).await?;
    Ok(ApiResponse::success(forms))
}

/**
 * POST /api/forms - define a dynamic form
 *
 * Expected Input:
 * ```json
 * {
 *   "name": "Admissão",
 *   "fields": [
 *     { "key": "nome", "label": "Nome completo", "kind": "text", "required": true },
 *     { "key": "cpf", "label": "CPF", "kind": "cpf", "required": true },
 *     { "key": "turno", "label": "Turno", "kind": "select", "options": ["manhã", "tarde"] }
 *   ]
 * }
 * ```
 */
pub async fn forms_post(
    Extension(admin): Extension<ValidatedAdmin>,
    payload: Result<Json<FormInput>, JsonRejection>,
) -> ApiResult<Form> {
    let Json(input) = payload?;
    let form = FormService::new().await?.create(admin.id, input).await?;
    Ok(ApiResponse::created(form))
}

/// GET /api/forms/:id
pub async fn form_get(Extension(admin): Extension<ValidatedAdmin>, Path(id): Path<Uuid>) -> ApiResult<Form> {
    let form = FormService::new().await?.get(admin.id, id).await?;
    Ok(ApiResponse::success(form))
}

/// PUT /api/forms/:id
pub async fn form_put(
    Extension(admin): Extension<ValidatedAdmin>,
    Path(id): Path<Uuid>,
    payload: Result<Json<FormInput>, JsonRejection>,
) -> ApiResult<Form> {
    let Json(input) = payload?;
    let form = FormService::new().await?.update(admin.id, id, input).await?;
    Ok(ApiResponse::success(form))
}

/// DELETE /api/forms/:id
pub async fn form_delete(Extension(admin): Extension<ValidatedAdmin>, Path(id): Path<Uuid>) -> ApiResult<()> {
    FormService::new().await?.delete(admin.id, id).await?;
    Ok(ApiResponse::no_content())
}
