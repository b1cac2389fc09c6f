// handlers/protected/associates/lifecycle.rs - activate / deactivate

use axum::{body::Bytes, extract::Path, Extension};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::api::format::{associate_to_api_value, MetadataOptions};
use crate::handlers::utils::optional_json;
use crate::middleware::{ApiResponse, ApiResult, ValidatedAdmin};
use crate::services::AssociateService;
use crate::types::AssociateStatus;

#[derive(Debug, Default, Deserialize)]
pub struct DeactivateRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// POST /api/associates/:id/deactivate - body `{ "reason": "..." }` is optional.
/// 409 when the associate is already inactive.
pub async fn associate_deactivate(
    Extension(admin): Extension<ValidatedAdmin>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<Value> {
    let request: DeactivateRequest = optional_json(&body)?;
    let associate = AssociateService::new()
        .await?
        .set_status(admin.id, id, AssociateStatus::Inactive, request.reason)
        .await?;
    Ok(ApiResponse::success(associate_to_api_value(&associate, &MetadataOptions::all())))
}

/// POST /api/associates/:id/activate - 409 when already active
pub async fn associate_activate(Extension(admin): Extension<ValidatedAdmin>, Path(id): Path<Uuid>) -> ApiResult<Value> {
    let associate = AssociateService::new()
        .await?
        .set_status(admin.id, id, AssociateStatus::Active, None)
        .await?;
    Ok(ApiResponse::success(associate_to_api_value(&associate, &MetadataOptions::all())))
}
