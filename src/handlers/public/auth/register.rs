// handlers/public/auth/register.rs - POST /auth/register handler

use axum::{extract::rejection::JsonRejection, Json};
use serde::Deserialize;

use super::utils::{session_for, SessionResponse};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::AdminService;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/**
 * POST /auth/register - Create an admin account
 *
 * Expected Input:
 * ```json
 * { "name": "RH Central", "email": "rh@empresa.com.br", "password": "..." }
 * ```
 *
 * Responds 201 with the same session payload as login, 409 when the
 * email is already registered.
 */
pub async fn register_post(payload: Result<Json<RegisterRequest>, JsonRejection>) -> ApiResult<SessionResponse> {
    let Json(body) = payload?;
    let admin = AdminService::new()
        .await?
        .register(&body.name, &body.email, &body.password)
        .await?;
    Ok(ApiResponse::created(session_for(admin)?))
}
