// handlers/public/links/field_link.rs - /public/fields/:token

use axum::{
    extract::{rejection::JsonRejection, Path},
    Json,
};
use serde_json::{json, Value};

use super::require_token_shape;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::link_service::{PublicField, PublicFieldSubmission};
use crate::services::LinkService;

/// GET /public/fields/:token - field definition and whose record it updates
pub async fn field_link_get(Path(token): Path<String>) -> ApiResult<PublicField> {
    require_token_shape(&token)?;
    let field = LinkService::new().await?.public_field(&token).await?;
    Ok(ApiResponse::success(field))
}

/// POST /public/fields/:token - store the value; the link cannot be used again.
/// Only an acknowledgement goes back, the visitor never sees the record.
pub async fn field_link_post(
    Path(token): Path<String>,
    payload: Result<Json<PublicFieldSubmission>, JsonRejection>,
) -> ApiResult<Value> {
    require_token_shape(&token)?;
    let Json(submission) = payload?;
    LinkService::new().await?.submit_field(&token, submission).await?;
    Ok(ApiResponse::success(json!({ "received": true })))
}
