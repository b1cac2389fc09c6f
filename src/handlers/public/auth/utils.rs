use serde::Serialize;

use crate::auth::{generate_jwt, Claims};
use crate::database::models::Admin;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    /// Seconds until the token expires
    pub expires_in: i64,
    pub admin: Admin,
}

pub fn session_for(admin: Admin) -> Result<SessionResponse, ApiError> {
    let claims = Claims::new(admin.id, admin.email.clone(), admin.name.clone());
    let token = generate_jwt(&claims)?;
    Ok(SessionResponse {
        token,
        expires_in: claims.exp - claims.iat,
        admin,
    })
}
