// handlers/protected/forms/links.rs - /api/forms/:id/links

use axum::{body::Bytes, extract::Path, Extension};
use uuid::Uuid;

use crate::handlers::utils::optional_json;
use crate::middleware::{ApiResponse, ApiResult, ValidatedAdmin};
use crate::services::form_service::LinkRequest;
use crate::services::{FormService, IssuedLink};

/// POST /api/forms/:id/links - body `{ "ttl_hours": 48 }` is optional.
/// The raw token appears in this response only.
pub async fn form_links_post(
    Extension(admin): Extension<ValidatedAdmin>,
    Path(form_id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<IssuedLink> {
    let request: LinkRequest = optional_json(&body)?;
    let link = FormService::new().await?.create_link(admin.id, form_id, request).await?;
    Ok(ApiResponse::created(link))
}

/// DELETE /api/forms/:id/links/:link_id - revoke
pub async fn form_link_delete(
    Extension(admin): Extension<ValidatedAdmin>,
    Path((form_id, link_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<()> {
    FormService::new().await?.revoke_link(admin.id, form_id, link_id).await?;
    Ok(ApiResponse::no_content())
}
