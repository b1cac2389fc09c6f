use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::associate_service::{fetch_associate, AssociateInput, AssociateService};
use super::form_service::find_form;
use super::ServiceError;
use crate::auth::{hash_token, is_well_formed_token};
use crate::database::models::{Associate, CustomField, FieldLink, Form, FormLink};
use crate::database::DatabaseManager;
use crate::forms::{validate_value, FieldErrors, FormError, FormField};

/// What an anonymous visitor of a form link gets to see.
#[derive(Debug, Clone, Serialize)]
pub struct PublicForm {
    pub form_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub fields: Vec<FormField>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicField {
    pub field: FormField,
    pub associate: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublicFormSubmission {
    pub data: Value,
    #[serde(default)]
    pub attachments: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublicFieldSubmission {
    pub value: Value,
}

/// Resolves and consumes link tokens on behalf of unauthenticated visitors.
pub struct LinkService {
    pool: PgPool,
}

impl LinkService {
    pub async fn new() -> Result<Self, ServiceError> {
        Ok(Self::with_pool(DatabaseManager::pool().await?))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn resolve_form(&self, token: &str) -> Result<(FormLink, Form), ServiceError> {
        let token_hash = lookup_hash(token)?;
        let link = sqlx::query_as::<_, FormLink>("SELECT * FROM form_links WHERE token_hash = $1")
            .bind(&token_hash)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(link_not_found)?;

        check_form_link(&link, Utc::now())?;

        let form = find_form(&self.pool, link.admin_id, link.form_id).await?.ok_or_else(|| {
            tracing::warn!("Form link {} refused: form {} was deleted", link.id, link.form_id);
            ServiceError::Gone("This form is no longer available".to_string())
        })?;
        Ok((link, form))
    }

    pub async fn public_form(&self, token: &str) -> Result<PublicForm, ServiceError> {
        let (link, form) = self.resolve_form(token).await?;
        Ok(PublicForm {
            form_id: form.id,
            name: form.name,
            description: form.description,
            fields: form.fields.0,
            expires_at: link.expires_at,
        })
    }

    /// Creates an active associate owned by the admin who issued the link.
    pub async fn submit_form(&self, token: &str, submission: PublicFormSubmission) -> Result<Associate, ServiceError> {
        let (link, form) = self.resolve_form(token).await?;
        let associate = AssociateService::with_pool(self.pool.clone())
            .create(
                link.admin_id,
                AssociateInput {
                    data: submission.data,
                    attachments: submission.attachments,
                    form_id: Some(form.id),
                },
            )
            .await?;

        tracing::info!("Form link {} produced associate {}", link.id, associate.id);
        Ok(associate)
    }

    pub async fn public_field(&self, token: &str) -> Result<PublicField, ServiceError> {
        let token_hash = lookup_hash(token)?;
        let link = sqlx::query_as::<_, FieldLink>("SELECT * FROM field_links WHERE token_hash = $1")
            .bind(&token_hash)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(link_not_found)?;
        check_field_link(&link, Utc::now())?;

        let mut conn = self.pool.acquire().await?;
        let field = find_custom_field(&mut conn, &link).await?;
        let associate = fetch_associate(&mut conn, link.admin_id, link.associate_id, false)
            .await
            .map_err(gone_when_missing)?;

        Ok(PublicField {
            field: field.definition.0,
            associate: associate.display_name(),
            expires_at: link.expires_at,
        })
    }

    /// Writes the value onto the associate and burns the link, atomically.
    pub async fn submit_field(&self, token: &str, submission: PublicFieldSubmission) -> Result<Associate, ServiceError> {
        let token_hash = lookup_hash(token)?;
        let mut tx = self.pool.begin().await?;

        let link = sqlx::query_as::<_, FieldLink>("SELECT * FROM field_links WHERE token_hash = $1 FOR UPDATE")
            .bind(&token_hash)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(link_not_found)?;
        check_field_link(&link, Utc::now())?;

        let field = find_custom_field(&mut tx, &link).await?;
        fetch_associate(&mut tx, link.admin_id, link.associate_id, true)
            .await
            .map_err(gone_when_missing)?;

        let definition = field.definition.0;
        let value = field_value(&definition, &submission.value)?;

        let associate = sqlx::query_as::<_, Associate>(
            r#"
            UPDATE associates
            SET data = data || jsonb_build_object($3::text, $4::jsonb), updated_at = now()
            WHERE admin_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(link.admin_id)
        .bind(link.associate_id)
        .bind(&definition.key)
        .bind(value)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE field_links SET used_at = now() WHERE id = $1")
            .bind(link.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!("Field link {} consumed: '{}' set on associate {}", link.id, definition.key, associate.id);
        Ok(associate)
    }
}

fn link_not_found() -> ServiceError {
    ServiceError::NotFound("Link not found".to_string())
}

/// Malformed tokens cannot exist in storage, so they are a plain 404.
fn lookup_hash(token: &str) -> Result<String, ServiceError> {
    if is_well_formed_token(token) {
        Ok(hash_token(&token.to_ascii_lowercase()))
    } else {
        Err(link_not_found())
    }
}

fn gone_when_missing(err: ServiceError) -> ServiceError {
    match err {
        ServiceError::NotFound(_) => ServiceError::Gone("This record is no longer available".to_string()),
        other => other,
    }
}

pub(crate) fn check_form_link(link: &FormLink, now: DateTime<Utc>) -> Result<(), ServiceError> {
    if link.revoked_at.is_some() {
        tracing::warn!("Form link {} refused: revoked", link.id);
        return Err(ServiceError::Gone("This link has been revoked".to_string()));
    }
    if link.expires_at <= now {
        tracing::warn!("Form link {} refused: expired at {}", link.id, link.expires_at);
        return Err(ServiceError::Gone("This link has expired".to_string()));
    }
    Ok(())
}

pub(crate) fn check_field_link(link: &FieldLink, now: DateTime<Utc>) -> Result<(), ServiceError> {
    if let Some(used_at) = link.used_at {
        tracing::warn!("Field link {} refused: already used at {}", link.id, used_at);
        return Err(ServiceError::Gone("This link has already been used".to_string()));
    }
    if link.expires_at <= now {
        tracing::warn!("Field link {} refused: expired at {}", link.id, link.expires_at);
        return Err(ServiceError::Gone("This link has expired".to_string()));
    }
    Ok(())
}

async fn find_custom_field(conn: &mut sqlx::PgConnection, link: &FieldLink) -> Result<CustomField, ServiceError> {
    sqlx::query_as::<_, CustomField>(
        "SELECT * FROM custom_fields WHERE admin_id = $1 AND id = $2 AND deleted_at IS NULL",
    )
    .bind(link.admin_id)
    .bind(link.custom_field_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| ServiceError::Gone("This field is no longer collected".to_string()))
}

/// A field link exists to collect a value, so blank is always refused.
fn field_value(field: &FormField, value: &Value) -> Result<Json<Value>, ServiceError> {
    let blank = match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    };
    let result = if blank {
        Err("This field is required".to_string())
    } else {
        validate_value(field, value)
    };

    result.map(Json).map_err(|msg| {
        let mut errors = FieldErrors::new();
        errors.insert(field.key.clone(), msg);
        FormError::InvalidSubmission(errors).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::FieldKind;
    use chrono::Duration;
    use serde_json::json;

    fn form_link(expires_in: Duration, revoked: bool) -> FormLink {
        let now = Utc::now();
        FormLink {
            id: Uuid::new_v4(),
            admin_id: Uuid::new_v4(),
            form_id: Uuid::new_v4(),
            token_hash: String::new(),
            expires_at: now + expires_in,
            revoked_at: revoked.then_some(now),
            created_at: now,
        }
    }

    fn field_link(expires_in: Duration, used: bool) -> FieldLink {
        let now = Utc::now();
        FieldLink {
            id: Uuid::new_v4(),
            admin_id: Uuid::new_v4(),
            custom_field_id: Uuid::new_v4(),
            associate_id: Uuid::new_v4(),
            token_hash: String::new(),
            expires_at: now + expires_in,
            used_at: used.then_some(now),
            created_at: now,
        }
    }

    #[test]
    fn form_links_expire_and_revoke() {
        let now = Utc::now();
        assert!(check_form_link(&form_link(Duration::hours(1), false), now).is_ok());
        assert!(matches!(check_form_link(&form_link(Duration::hours(-1), false), now), Err(ServiceError::Gone(_))));
        assert!(matches!(check_form_link(&form_link(Duration::hours(1), true), now), Err(ServiceError::Gone(_))));
    }

    #[test]
    fn field_links_are_single_use() {
        let now = Utc::now();
        assert!(check_field_link(&field_link(Duration::hours(1), false), now).is_ok());
        assert!(matches!(check_field_link(&field_link(Duration::hours(1), true), now), Err(ServiceError::Gone(_))));
        assert!(matches!(check_field_link(&field_link(Duration::minutes(-5), false), now), Err(ServiceError::Gone(_))));
    }

    #[test]
    fn malformed_tokens_are_not_found() {
        assert!(matches!(lookup_hash("short"), Err(ServiceError::NotFound(_))));
        let token = crate::auth::generate_link_token();
        assert_eq!(lookup_hash(&token).unwrap(), hash_token(&token));
        assert_eq!(lookup_hash(&token.to_uppercase()).unwrap(), hash_token(&token));
    }

    #[test]
    fn field_values_are_validated_and_required() {
        let field = FormField {
            key: "cpf".to_string(),
            label: "CPF".to_string(),
            kind: FieldKind::Cpf,
            required: false,
            options: vec![],
            description: None,
        };
        assert_eq!(field_value(&field, &json!("529.982.247-25")).unwrap().0, json!("52998224725"));
        assert!(matches!(field_value(&field, &json!("")), Err(ServiceError::Form(_))));
        assert!(field_value(&field, &json!("111.111.111-11")).is_err());
    }
}
