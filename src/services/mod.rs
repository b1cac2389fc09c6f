pub mod admin_service;
pub mod associate_service;
pub mod custom_field_service;
pub mod form_service;
pub mod link_service;
pub mod notifier;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::{JwtError, PasswordError};
use crate::database::DatabaseError;
use crate::forms::FormError;
use crate::search::SearchError;

pub use admin_service::AdminService;
pub use associate_service::AssociateService;
pub use custom_field_service::CustomFieldService;
pub use form_service::FormService;
pub use link_service::LinkService;
pub use notifier::{LinkKind, LinkNotice, LinkNotifier, LogNotifier, NotifyError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The resource existed but can no longer be used (expired or consumed links).
    #[error("Gone: {0}")]
    Gone(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Form(#[from] FormError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Jwt(#[from] JwtError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Database(DatabaseError::Sqlx(err))
    }
}

/// Map a unique-constraint violation to `Conflict`, anything else to a database error.
pub(crate) fn conflict_on_unique(err: sqlx::Error, message: &str) -> ServiceError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            ServiceError::Conflict(message.to_string())
        }
        _ => err.into(),
    }
}

/// A freshly issued link. The raw token is only ever returned here.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedLink {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub associate_id: Option<Uuid>,
    pub token: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notified: Option<bool>,
}

/// Requested TTL, falling back to `default_hours` and capped at the configured maximum.
pub(crate) fn link_expiry(requested: Option<i64>, default_hours: i64) -> Result<DateTime<Utc>, ServiceError> {
    let max = crate::config::config().links.max_ttl_hours;
    let hours = match requested {
        Some(h) if h <= 0 => {
            return Err(ServiceError::InvalidInput("ttl_hours must be positive".to_string()));
        }
        Some(h) => h.min(max),
        None => default_hours.min(max),
    };
    Ok(Utc::now() + Duration::hours(hours))
}

pub(crate) fn public_url(kind: LinkKind, token: &str) -> String {
    let base = &crate::config::config().links.public_base_url;
    format!("{}/{}/{}", base.trim_end_matches('/'), kind.path_segment(), token)
}
