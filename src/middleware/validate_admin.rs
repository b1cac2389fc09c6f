use axum::{extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

use super::auth::AuthAdmin;
use crate::error::ApiError;
use crate::services::AdminService;

/// Admin loaded from the database for the current request
#[derive(Clone, Debug)]
pub struct ValidatedAdmin {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// Ensures the admin named by the JWT still exists and has not been deleted.
/// Must run after `jwt_auth_middleware`.
pub async fn validate_admin_middleware(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let auth_admin = request
        .extensions()
        .get::<AuthAdmin>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before admin validation"))?;

    let admin = AdminService::new()
        .await?
        .find(auth_admin.id)
        .await?
        .ok_or_else(|| {
            tracing::warn!("Admin validation failed: {} ({}) not found or deleted", auth_admin.email, auth_admin.id);
            ApiError::forbidden("Admin account is not active")
        })?;

    let validated = ValidatedAdmin {
        id: admin.id,
        name: admin.name,
        email: admin.email,
    };
    tracing::debug!("Admin validation successful: {} ({})", validated.email, validated.id);

    request.extensions_mut().insert(validated);
    Ok(next.run(request).await)
}
