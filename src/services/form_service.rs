use serde::Deserialize;
use sqlx::{types::Json, PgExecutor, PgPool};
use uuid::Uuid;

use super::{link_expiry, public_url, IssuedLink, LinkKind, ServiceError};
use crate::auth::{generate_link_token, hash_token};
use crate::database::{models::Form, DatabaseManager};
use crate::forms::{validate_definition, FormField};

#[derive(Debug, Clone, Deserialize)]
pub struct FormInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub fields: Vec<FormField>,
}

impl FormInput {
    fn validate(&self) -> Result<(), ServiceError> {
        if self.name.trim().is_empty() {
            return Err(ServiceError::InvalidInput("Form name is required".to_string()));
        }
        validate_definition(&self.fields)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkRequest {
    #[serde(default)]
    pub ttl_hours: Option<i64>,
}

pub struct FormService {
    pool: PgPool,
}

impl FormService {
    pub async fn new() -> Result<Self, ServiceError> {
        Ok(Self::with_pool(DatabaseManager::pool().await?))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, admin_id: Uuid, input: FormInput) -> Result<Form, ServiceError> {
        input.validate()?;
        let form = sqlx::query_as::<_, Form>(
            r#"
            INSERT INTO forms (id, admin_id, name, description, fields)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(admin_id)
        .bind(input.name.trim())
        .bind(input.description)
        .bind(Json(input.fields))
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("Created form {} ({}) for admin {}", form.id, form.name, admin_id);
        Ok(form)
    }

    pub async fn list(&self, admin_id: Uuid) -> Result<Vec<Form>, ServiceError> {
        let forms = sqlx::query_as::<_, Form>(
            "SELECT * FROM forms WHERE admin_id = $1 AND deleted_at IS NULL ORDER BY created_at DESC, id",
        )
        .bind(admin_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(forms)
    }

    pub async fn get(&self, admin_id: Uuid, id: Uuid) -> Result<Form, ServiceError> {
        find_form(&self.pool, admin_id, id).await?.ok_or_else(|| not_found(id))
    }

    pub async fn update(&self, admin_id: Uuid, id: Uuid, input: FormInput) -> Result<Form, ServiceError> {
        input.validate()?;
        sqlx::query_as::<_, Form>(
            r#"
            UPDATE forms SET name = $3, description = $4, fields = $5, updated_at = now()
            WHERE admin_id = $1 AND id = $2 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(admin_id)
        .bind(id)
        .bind(input.name.trim())
        .bind(input.description)
        .bind(Json(input.fields))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(id))
    }

    /// Soft delete; outstanding links stop resolving.
    pub async fn delete(&self, admin_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        let result = sqlx::query(
            "UPDATE forms SET deleted_at = now(), updated_at = now() WHERE admin_id = $1 AND id = $2 AND deleted_at IS NULL",
        )
        .bind(admin_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    pub async fn create_link(&self, admin_id: Uuid, form_id: Uuid, request: LinkRequest) -> Result<IssuedLink, ServiceError> {
        self.get(admin_id, form_id).await?;
        let expires_at = link_expiry(request.ttl_hours, crate::config::config().links.form_link_ttl_hours)?;

        let token = generate_link_token();
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO form_links (id, admin_id, form_id, token_hash, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(admin_id)
        .bind(form_id)
        .bind(hash_token(&token))
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        tracing::info!("Issued form link {} for form {} (expires {})", id, form_id, expires_at);
        Ok(IssuedLink {
            id,
            associate_id: None,
            url: public_url(LinkKind::Form, &token),
            token,
            expires_at,
            notified: None,
        })
    }

    pub async fn revoke_link(&self, admin_id: Uuid, form_id: Uuid, link_id: Uuid) -> Result<(), ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE form_links SET revoked_at = now()
            WHERE admin_id = $1 AND form_id = $2 AND id = $3 AND revoked_at IS NULL
            "#,
        )
        .bind(admin_id)
        .bind(form_id)
        .bind(link_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound(format!("Link {} not found", link_id)));
        }
        tracing::info!("Revoked form link {} for form {}", link_id, form_id);
        Ok(())
    }
}

fn not_found(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("Form {} not found", id))
}

pub(crate) async fn find_form<'e, E>(executor: E, admin_id: Uuid, id: Uuid) -> Result<Option<Form>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Form>("SELECT * FROM forms WHERE admin_id = $1 AND id = $2 AND deleted_at IS NULL")
        .bind(admin_id)
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Includes soft-deleted forms; records created from a form keep validating against it.
pub(crate) async fn find_form_including_deleted<'e, E>(
    executor: E,
    admin_id: Uuid,
    id: Uuid,
) -> Result<Option<Form>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Form>("SELECT * FROM forms WHERE admin_id = $1 AND id = $2")
        .bind(admin_id)
        .bind(id)
        .fetch_optional(executor)
        .await
}
