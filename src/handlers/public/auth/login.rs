// handlers/public/auth/login.rs - POST /auth/login handler

use axum::{extract::rejection::JsonRejection, Json};
use serde::Deserialize;

use super::utils::{session_for, SessionResponse};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::AdminService;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/**
 * POST /auth/login - Authenticate an admin and receive a JWT
 *
 * Expected Output (Success):
 * ```json
 * {
 *   "success": true,
 *   "data": {
 *     "token": "eyJhbGciOiJIUzI1NiI...",
 *     "expires_in": 604800,
 *     "admin": { "id": "...", "name": "RH Central", "email": "rh@empresa.com.br" }
 *   }
 * }
 * ```
 */
pub async fn login_post(payload: Result<Json<LoginRequest>, JsonRejection>) -> ApiResult<SessionResponse> {
    let Json(body) = payload?;
    let admin = AdminService::new().await?.login(&body.email, &body.password).await?;
    tracing::info!("Admin {} logged in", admin.id);
    Ok(ApiResponse::success(session_for(admin)?))
}
