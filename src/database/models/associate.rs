use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::AssociateStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Associate {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub form_id: Option<Uuid>,
    pub status: String,
    pub data: Value,
    pub attachments: Value,
    pub inactivated_at: Option<DateTime<Utc>>,
    pub inactivation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Associate {
    /// The column carries a CHECK constraint, so anything unexpected is treated as active.
    pub fn lifecycle(&self) -> AssociateStatus {
        AssociateStatus::from_loose(&self.status).unwrap_or(AssociateStatus::Active)
    }

    /// Best-effort human label used in public link pages.
    pub fn display_name(&self) -> String {
        ["nome", "nome_completo", "name"]
            .iter()
            .find_map(|k| self.data.get(*k).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", self.registration().unwrap_or_else(|| self.id.to_string())))
    }

    pub fn registration(&self) -> Option<String> {
        match self.data.get("matricula") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}
