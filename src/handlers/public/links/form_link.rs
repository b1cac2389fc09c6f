// handlers/public/links/form_link.rs - /public/forms/:token

use axum::{
    extract::{rejection::JsonRejection, Path},
    Json,
};
use serde_json::Value;

use crate::api::format::{associate_to_api_value, MetadataOptions};
use super::require_token_shape;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::link_service::{PublicForm, PublicFormSubmission};
use crate::services::LinkService;

/// GET /public/forms/:token - form definition for an anonymous visitor
pub async fn form_link_get(Path(token): Path<String>) -> ApiResult<PublicForm> {
    require_token_shape(&token)?;
    let form = LinkService::new().await?.public_form(&token).await?;
    Ok(ApiResponse::success(form))
}

/// POST /public/forms/:token - submit answers, creating an active associate
pub async fn form_link_post(
    Path(token): Path<String>,
    payload: Result<Json<PublicFormSubmission>, JsonRejection>,
) -> ApiResult<Value> {
    require_token_shape(&token)?;
    let Json(submission) = payload?;
    let associate = LinkService::new().await?.submit_form(&token, submission).await?;
    Ok(ApiResponse::created(associate_to_api_value(&associate, &MetadataOptions::none())))
}
