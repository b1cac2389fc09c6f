use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use serde::Deserialize;
use sqlx::{types::Json, PgPool, Row};
use uuid::Uuid;

use super::associate_service::REGISTRATION_KEY;
use super::{conflict_on_unique, link_expiry, public_url, IssuedLink, LinkKind, LinkNotice, LinkNotifier, ServiceError};
use crate::auth::{generate_link_token, hash_token};
use crate::database::{models::CustomField, DatabaseManager};
use crate::forms::{validate_field_definition, FieldErrors, FormError, FormField};

#[derive(Debug, Clone, Deserialize)]
pub struct FieldLinkRequest {
    pub associate_ids: Vec<Uuid>,
    #[serde(default)]
    pub ttl_hours: Option<i64>,
}

pub struct CustomFieldService {
    pool: PgPool,
}

impl CustomFieldService {
    pub async fn new() -> Result<Self, ServiceError> {
        Ok(Self::with_pool(DatabaseManager::pool().await?))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, admin_id: Uuid, definition: FormField) -> Result<CustomField, ServiceError> {
        let checked = validate_field_definition(&definition).and_then(|_| {
            if definition.key == REGISTRATION_KEY {
                Err("The registration number is assigned by the system".to_string())
            } else {
                Ok(())
            }
        });
        if let Err(msg) = checked {
            let mut errors = FieldErrors::new();
            errors.insert(definition.key.clone(), msg);
            return Err(FormError::InvalidDefinition(errors).into());
        }

        let key = definition.key.clone();
        let field = sqlx::query_as::<_, CustomField>(
            "INSERT INTO custom_fields (id, admin_id, definition) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(admin_id)
        .bind(Json(definition))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, &format!("A custom field with key '{}' already exists", key)))?;

        tracing::info!("Created custom field {} ({}) for admin {}", field.id, key, admin_id);
        Ok(field)
    }

    pub async fn list(&self, admin_id: Uuid) -> Result<Vec<CustomField>, ServiceError> {
        let fields = sqlx::query_as::<_, CustomField>(
            "SELECT * FROM custom_fields WHERE admin_id = $1 AND deleted_at IS NULL ORDER BY created_at, id",
        )
        .bind(admin_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(fields)
    }

    pub async fn get(&self, admin_id: Uuid, id: Uuid) -> Result<CustomField, ServiceError> {
        sqlx::query_as::<_, CustomField>(
            "SELECT * FROM custom_fields WHERE admin_id = $1 AND id = $2 AND deleted_at IS NULL",
        )
        .bind(admin_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(id))
    }

    /// Soft delete. Values already collected stay on the associates.
    pub async fn delete(&self, admin_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        let result = sqlx::query(
            "UPDATE custom_fields SET deleted_at = now(), updated_at = now() WHERE admin_id = $1 AND id = $2 AND deleted_at IS NULL",
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

    /// One single-use link per associate. All links are stored in one
    /// transaction; only after commit is each handed to `notifier`.
    /// A failed delivery is reported in the result, it does not undo the link.
    pub async fn issue_links(
        &self,
        admin_id: Uuid,
        field_id: Uuid,
        request: FieldLinkRequest,
        notifier: Arc<dyn LinkNotifier>,
    ) -> Result<Vec<IssuedLink>, ServiceError> {
        let field = self.get(admin_id, field_id).await?;
        let associate_ids = dedupe(request.associate_ids);
        check_batch_size(associate_ids.len(), crate::config::config().links.max_field_links_per_request)?;
        let expires_at = link_expiry(request.ttl_hours, crate::config::config().links.field_link_ttl_hours)?;

        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query(
            r#"
            SELECT id, data ->> 'email' AS email
            FROM associates
            WHERE admin_id = $1 AND id = ANY($2) AND deleted_at IS NULL
            "#,
        )
        .bind(admin_id)
        .bind(associate_ids.as_slice())
        .fetch_all(&mut *tx)
        .await?;

        let mut recipients = Vec::with_capacity(rows.len());
        for row in rows {
            recipients.push((row.try_get::<Uuid, _>("id")?, row.try_get::<Option<String>, _>("email")?));
        }
        if let Some(missing) = associate_ids.iter().find(|id| !recipients.iter().any(|(r, _)| r == *id)) {
            return Err(ServiceError::NotFound(format!("Associate {} not found", missing)));
        }
        // Answer in request order
        recipients.sort_by_key(|(id, _)| associate_ids.iter().position(|a| a == id));

        let mut pending = Vec::with_capacity(recipients.len());
        for (associate_id, email) in recipients {
            let token = generate_link_token();
            let id = Uuid::new_v4();
            sqlx::query(
                r#"
                INSERT INTO field_links (id, admin_id, custom_field_id, associate_id, token_hash, expires_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(id)
            .bind(admin_id)
            .bind(field_id)
            .bind(associate_id)
            .bind(hash_token(&token))
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;

            let url = public_url(LinkKind::Field, &token);
            let link = IssuedLink {
                id,
                associate_id: Some(associate_id),
                token,
                url,
                expires_at,
                notified: None,
            };
            pending.push((link, associate_id, email));
        }
        tx.commit().await?;

        let subject = format!("Please fill in: {}", field.definition.label);
        let issued = join_all(pending.into_iter().map(|(mut link, associate_id, email)| {
            let notifier = notifier.clone();
            let notice = LinkNotice {
                kind: LinkKind::Field,
                admin_id,
                associate_id: Some(associate_id),
                recipient: email,
                subject: subject.clone(),
                url: link.url.clone(),
                expires_at,
            };
            async move {
                let delivered = match notifier.notify(&notice).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!("Could not deliver field link {} to associate {}: {}", link.id, associate_id, e);
                        false
                    }
                };
                link.notified = Some(delivered);
                link
            }
        }))
        .await;

        tracing::info!("Issued {} field links for custom field {}", issued.len(), field_id);
        Ok(issued)
    }
}

fn not_found(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("Custom field {} not found", id))
}

fn check_batch_size(count: usize, max: usize) -> Result<(), ServiceError> {
    if count == 0 {
        return Err(ServiceError::InvalidInput("associate_ids cannot be empty".to_string()));
    }
    if count > max {
        return Err(ServiceError::InvalidInput(format!(
            "At most {} associates per request, got {}",
            max, count
        )));
    }
    Ok(())
}

/// Keeps first occurrence order.
fn dedupe(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}
