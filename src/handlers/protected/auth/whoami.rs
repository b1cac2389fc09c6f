// handlers/protected/auth/whoami.rs - GET /api/auth/whoami handler

use axum::Extension;
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult, ValidatedAdmin};

/// GET /api/auth/whoami - the admin behind the current token
pub async fn whoami_get(Extension(admin): Extension<ValidatedAdmin>) -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "id": admin.id,
        "name": admin.name,
        "email": admin.email,
    })))
}
