use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use uuid::Uuid;

use crate::forms::FormField;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CustomField {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub definition: Json<FormField>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}
