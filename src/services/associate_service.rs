use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::form_service::{find_form, find_form_including_deleted};
use super::ServiceError;
use crate::database::{models::Associate, DatabaseManager, QueryBuilder};
use crate::forms::validate::RESERVED_KEYS;
use crate::forms::{validate_attachments, validate_submission, FieldErrors, FormError};
use crate::search::{Search, SearchOptions, SearchRequest};
use crate::types::AssociateStatus;

/// First registration number handed out to an admin.
pub const FIRST_REGISTRATION: i64 = 1000;
pub const REGISTRATION_KEY: &str = "matricula";
/// Highest registration number; provided numbers must stay below it so the
/// next automatic one always fits.
pub const MAX_REGISTRATION: i64 = 999_999_999_999_999_999;

#[derive(Debug, Clone, Deserialize)]
pub struct AssociateInput {
    pub data: Value,
    #[serde(default)]
    pub attachments: Option<Value>,
    #[serde(default)]
    pub form_id: Option<Uuid>,
}

/// Shallow merge: present keys overwrite, `null` removes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssociatePatch {
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
    #[serde(default)]
    pub attachments: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct SearchPage<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> SearchPage<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> SearchPage<U> {
        SearchPage {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

pub struct AssociateService {
    pool: PgPool,
}

impl AssociateService {
    pub async fn new() -> Result<Self, ServiceError> {
        Ok(Self::with_pool(DatabaseManager::pool().await?))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, admin_id: Uuid, input: AssociateInput) -> Result<Associate, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let mut data = prepare_data(&mut tx, admin_id, FormCheck::live(input.form_id), &input.data).await?;
        let attachments = prepare_attachments(input.attachments.as_ref())?;

        lock_registrations(&mut tx, admin_id).await?;
        match registration_of(&data)? {
            Some(registration) => ensure_registration_free(&mut tx, admin_id, &registration, None).await?,
            None => {
                let next = next_registration(&mut tx, admin_id).await?;
                ensure_registration_free(&mut tx, admin_id, &next.to_string(), None).await?;
                data.insert(REGISTRATION_KEY.to_string(), Value::from(next));
            }
        }

        let associate = sqlx::query_as::<_, Associate>(
            r#"
            INSERT INTO associates (id, admin_id, form_id, status, data, attachments)
            VALUES ($1, $2, $3, 'active', $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(admin_id)
        .bind(input.form_id)
        .bind(Value::Object(data))
        .bind(attachments)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(
            "Created associate {} (matricula {}) for admin {}",
            associate.id,
            associate.registration().unwrap_or_default(),
            admin_id
        );
        Ok(associate)
    }

    pub async fn get(&self, admin_id: Uuid, id: Uuid) -> Result<Associate, ServiceError> {
        let mut conn = self.pool.acquire().await?;
        fetch_associate(&mut conn, admin_id, id, false).await
    }

    /// PUT: the whole `data` document is replaced. An omitted registration
    /// number keeps the current one.
    pub async fn replace(&self, admin_id: Uuid, id: Uuid, input: AssociateInput) -> Result<Associate, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let existing = fetch_associate(&mut tx, admin_id, id, true).await?;

        let form_id = input.form_id.or(existing.form_id);
        let check = match input.form_id {
            Some(requested) if Some(requested) != existing.form_id => FormCheck::Live(requested),
            _ => FormCheck::stored(existing.form_id),
        };
        let mut data = prepare_data(&mut tx, admin_id, check, &input.data).await?;
        let attachments = match input.attachments.as_ref() {
            Some(value) => prepare_attachments(Some(value))?,
            None => existing.attachments.clone(),
        };
        settle_registration(&mut tx, admin_id, &existing, &mut data).await?;

        let associate = update_document(&mut tx, &existing, form_id, data, attachments).await?;
        tx.commit().await?;
        Ok(associate)
    }

    /// PATCH: shallow merge over the stored document, then the same checks as PUT.
    pub async fn patch(&self, admin_id: Uuid, id: Uuid, patch: AssociatePatch) -> Result<Associate, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let existing = fetch_associate(&mut tx, admin_id, id, true).await?;

        let merged = merge_data(&existing.data, patch.data.unwrap_or_default());
        let mut data = prepare_data(&mut tx, admin_id, FormCheck::stored(existing.form_id), &Value::Object(merged)).await?;
        let attachments = match patch.attachments.as_ref() {
            Some(value) => prepare_attachments(Some(value))?,
            None => existing.attachments.clone(),
        };
        settle_registration(&mut tx, admin_id, &existing, &mut data).await?;

        let associate = update_document(&mut tx, &existing, existing.form_id, data, attachments).await?;
        tx.commit().await?;
        Ok(associate)
    }

    pub async fn delete(&self, admin_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        let result = sqlx::query(
            "UPDATE associates SET deleted_at = now(), updated_at = now() WHERE admin_id = $1 AND id = $2 AND deleted_at IS NULL",
        )
        .bind(admin_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        tracing::info!("Deleted associate {} for admin {}", id, admin_id);
        Ok(())
    }

    pub async fn search(&self, admin_id: Uuid, request: SearchRequest) -> Result<SearchPage<Associate>, ServiceError> {
        let mut search = Search::new(SearchOptions::for_admin(admin_id));
        search.assign(request)?;

        let started = Instant::now();
        let builder = QueryBuilder::new(&search);
        let (items, total) = tokio::try_join!(
            builder.select_all::<Associate>(&self.pool),
            builder.count(&self.pool)
        )?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if elapsed_ms > crate::config::config().database.slow_query_threshold_ms {
            tracing::warn!("Slow associate search for admin {}: {} ms, {:?}", admin_id, elapsed_ms, search.conditions());
        }

        Ok(SearchPage {
            items,
            total,
            limit: search.applied_limit(),
            offset: search.applied_offset(),
        })
    }

    /// Move an associate to `target`. Asking for the state it is already in is a conflict.
    pub async fn set_status(
        &self,
        admin_id: Uuid,
        id: Uuid,
        target: AssociateStatus,
        reason: Option<String>,
    ) -> Result<Associate, ServiceError> {
        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        let updated = sqlx::query_as::<_, Associate>(
            r#"
            UPDATE associates
            SET status = $3,
                inactivated_at = CASE WHEN $3 = 'inactive' THEN now() ELSE NULL END,
                inactivation_reason = CASE WHEN $3 = 'inactive' THEN $4 ELSE NULL END,
                updated_at = now()
            WHERE admin_id = $1 AND id = $2 AND deleted_at IS NULL AND status <> $3
            RETURNING *
            "#,
        )
        .bind(admin_id)
        .bind(id)
        .bind(target.as_str())
        .bind(reason)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(associate) => {
                tracing::info!("Associate {} is now {}", id, target);
                Ok(associate)
            }
            None => {
                // Either missing or already in the requested state
                self.get(admin_id, id).await?;
                Err(ServiceError::Conflict(format!("Associate is already {}", target)))
            }
        }
    }
}

fn not_found(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("Associate {} not found", id))
}

pub(crate) async fn fetch_associate(
    conn: &mut PgConnection,
    admin_id: Uuid,
    id: Uuid,
    for_update: bool,
) -> Result<Associate, ServiceError> {
    let sql = if for_update {
        "SELECT * FROM associates WHERE admin_id = $1 AND id = $2 AND deleted_at IS NULL FOR UPDATE"
    } else {
        "SELECT * FROM associates WHERE admin_id = $1 AND id = $2 AND deleted_at IS NULL"
    };
    sqlx::query_as::<_, Associate>(sql)
        .bind(admin_id)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| not_found(id))
}

async fn update_document(
    conn: &mut PgConnection,
    existing: &Associate,
    form_id: Option<Uuid>,
    data: Map<String, Value>,
    attachments: Value,
) -> Result<Associate, ServiceError> {
    let associate = sqlx::query_as::<_, Associate>(
        r#"
        UPDATE associates
        SET form_id = $3, data = $4, attachments = $5, updated_at = now()
        WHERE admin_id = $1 AND id = $2
        RETURNING *
        "#,
    )
    .bind(existing.admin_id)
    .bind(existing.id)
    .bind(form_id)
    .bind(Value::Object(data))
    .bind(attachments)
    .fetch_one(&mut *conn)
    .await?;
    Ok(associate)
}

/// Which form, if any, an incoming document is validated against.
#[derive(Debug, Clone, Copy, PartialEq)]
enum FormCheck {
    None,
    /// A form named by the caller; it must not be deleted.
    Live(Uuid),
    /// The form the record was created from, possibly deleted since.
    Stored(Uuid),
}

impl FormCheck {
    fn live(form_id: Option<Uuid>) -> Self {
        form_id.map_or(FormCheck::None, FormCheck::Live)
    }

    fn stored(form_id: Option<Uuid>) -> Self {
        form_id.map_or(FormCheck::None, FormCheck::Stored)
    }
}

/// Validate an incoming document, against its form when there is one.
async fn prepare_data(
    conn: &mut PgConnection,
    admin_id: Uuid,
    check: FormCheck,
    data: &Value,
) -> Result<Map<String, Value>, ServiceError> {
    let Value::Object(map) = data else {
        return Err(submission_error("data", "Associate data must be a JSON object"));
    };
    reject_reserved_keys(map)?;

    let form = match check {
        FormCheck::None => None,
        FormCheck::Live(form_id) => Some(
            find_form(&mut *conn, admin_id, form_id)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Form {} not found", form_id)))?,
        ),
        FormCheck::Stored(form_id) => find_form_including_deleted(&mut *conn, admin_id, form_id).await?,
    };

    match form {
        Some(form) => Ok(validate_submission(&form.fields.0, data)?),
        None => Ok(map.clone()),
    }
}

fn prepare_attachments(value: Option<&Value>) -> Result<Value, ServiceError> {
    let attachments = validate_attachments(value.unwrap_or(&Value::Null))
        .map_err(|msg| submission_error("attachments", &msg))?;
    serde_json::to_value(attachments).map_err(|e| ServiceError::InvalidInput(e.to_string()))
}

fn reject_reserved_keys(map: &Map<String, Value>) -> Result<(), ServiceError> {
    let errors: FieldErrors = map
        .keys()
        .filter(|k| RESERVED_KEYS.contains(&k.as_str()))
        .map(|k| (k.clone(), format!("'{}' is managed by the system", k)))
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(FormError::InvalidSubmission(errors).into())
    }
}

fn submission_error(key: &str, message: &str) -> ServiceError {
    let mut errors = FieldErrors::new();
    errors.insert(key.to_string(), message.to_string());
    FormError::InvalidSubmission(errors).into()
}

fn merge_data(current: &Value, changes: Map<String, Value>) -> Map<String, Value> {
    let mut merged = current.as_object().cloned().unwrap_or_default();
    for (key, value) in changes {
        if value.is_null() {
            merged.remove(&key);
        } else {
            merged.insert(key, value);
        }
    }
    merged
}

/// Registration number as text; blank counts as absent.
fn registration_of(data: &Map<String, Value>) -> Result<Option<String>, ServiceError> {
    let registration = match data.get(REGISTRATION_KEY) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(_) => return Err(submission_error(REGISTRATION_KEY, "Registration number must be text or a number")),
    };

    if !below_registration_cap(&registration) {
        return Err(submission_error(
            REGISTRATION_KEY,
            &format!("Registration number must be below {}", MAX_REGISTRATION),
        ));
    }
    Ok(Some(registration))
}

/// Non-numeric registrations are free text and always accepted.
fn below_registration_cap(registration: &str) -> bool {
    if registration.is_empty() || !registration.bytes().all(|b| b.is_ascii_digit()) {
        return true;
    }
    match registration.parse::<i64>() {
        Ok(n) => n < MAX_REGISTRATION,
        Err(_) => false,
    }
}

async fn settle_registration(
    conn: &mut PgConnection,
    admin_id: Uuid,
    existing: &Associate,
    data: &mut Map<String, Value>,
) -> Result<(), ServiceError> {
    match registration_of(data)? {
        Some(registration) if Some(&registration) != existing.registration().as_ref() => {
            lock_registrations(conn, admin_id).await?;
            ensure_registration_free(conn, admin_id, &registration, Some(existing.id)).await
        }
        Some(_) => Ok(()),
        None => {
            if let Some(current) = existing.data.get(REGISTRATION_KEY) {
                data.insert(REGISTRATION_KEY.to_string(), current.clone());
            }
            Ok(())
        }
    }
}

/// Serialises registration assignment per admin until the transaction ends.
async fn lock_registrations(conn: &mut PgConnection, admin_id: Uuid) -> Result<(), ServiceError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(format!("associates:matricula:{}", admin_id))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn next_registration(conn: &mut PgConnection, admin_id: Uuid) -> Result<i64, ServiceError> {
    // Deleted rows count too, so numbers are never reissued. `numeric` keeps
    // oversized legacy values from overflowing the cast.
    let next = sqlx::query_scalar::<_, String>(
        r#"
        SELECT (COALESCE(MAX((data ->> 'matricula')::numeric), $2 - 1) + 1)::text
        FROM associates
        WHERE admin_id = $1 AND (data ->> 'matricula') ~ '^[0-9]+$'
        "#,
    )
    .bind(admin_id)
    .bind(FIRST_REGISTRATION)
    .fetch_one(&mut *conn)
    .await?;

    parse_next_registration(&next)
}

fn parse_next_registration(text: &str) -> Result<i64, ServiceError> {
    match text.parse::<i64>() {
        Ok(n) if n <= MAX_REGISTRATION => Ok(n),
        _ => Err(ServiceError::Conflict("Registration numbers are exhausted".to_string())),
    }
}

async fn ensure_registration_free(
    conn: &mut PgConnection,
    admin_id: Uuid,
    registration: &str,
    exclude: Option<Uuid>,
) -> Result<(), ServiceError> {
    let taken = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM associates
            WHERE admin_id = $1 AND deleted_at IS NULL
              AND data ->> 'matricula' = $2
              AND ($3::uuid IS NULL OR id <> $3)
        )
        "#,
    )
    .bind(admin_id)
    .bind(registration)
    .bind(exclude)
    .fetch_one(&mut *conn)
    .await?;

    if taken {
        Err(ServiceError::Conflict(format!("Registration number {} is already in use", registration)))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn merge_overwrites_and_removes() {
        let current = json!({ "nome": "Ana", "cargo": "Analista", "matricula": 1000 });
        let merged = merge_data(&current, object(json!({ "cargo": "Gerente", "telefone": null, "nome": null })));
        assert_eq!(Value::Object(merged), json!({ "cargo": "Gerente", "matricula": 1000 }));
    }

    #[test]
    fn registration_reads_text_and_numbers() {
        assert_eq!(registration_of(&object(json!({ "matricula": 1001 }))).unwrap(), Some("1001".to_string()));
        assert_eq!(registration_of(&object(json!({ "matricula": " A-7 " }))).unwrap(), Some("A-7".to_string()));
        assert_eq!(registration_of(&object(json!({ "matricula": "" }))).unwrap(), None);
        assert_eq!(registration_of(&object(json!({ "nome": "Ana" }))).unwrap(), None);
        assert!(registration_of(&object(json!({ "matricula": [1] }))).is_err());
    }

    #[test]
    fn provided_registration_must_stay_below_cap() {
        assert!(registration_of(&object(json!({ "matricula": "999999999999999998" }))).is_ok());
        assert!(registration_of(&object(json!({ "matricula": "999999999999999999" }))).is_err());
        assert!(registration_of(&object(json!({ "matricula": 1_000_000_000_000_000_000u64 }))).is_err());
        assert!(registration_of(&object(json!({ "matricula": "99999999999999999999999" }))).is_err());
        // Free-text registrations are not numbers
        assert!(registration_of(&object(json!({ "matricula": "RH-99999999999999999999" }))).is_ok());
    }

    #[test]
    fn next_registration_never_passes_cap() {
        assert_eq!(parse_next_registration("1000").unwrap(), 1000);
        assert_eq!(parse_next_registration("999999999999999999").unwrap(), MAX_REGISTRATION);
        assert!(matches!(
            parse_next_registration("1000000000000000000"),
            Err(ServiceError::Conflict(_))
        ));
        assert!(parse_next_registration("123456789012345678901234").is_err());
    }

    #[test]
    fn edits_validate_against_the_stored_form() {
        let id = Uuid::new_v4();
        assert_eq!(FormCheck::stored(Some(id)), FormCheck::Stored(id));
        assert_eq!(FormCheck::live(Some(id)), FormCheck::Live(id));
        assert_eq!(FormCheck::stored(None), FormCheck::None);
    }

    #[test]
    fn reserved_keys_are_refused() {
        let err = reject_reserved_keys(&object(json!({ "status": "inactive", "nome": "Ana" }))).unwrap_err();
        match err {
            ServiceError::Form(FormError::InvalidSubmission(errors)) => {
                assert!(errors.contains_key("status"));
                assert!(!errors.contains_key("nome"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn attachments_are_normalised_to_objects() {
        let value = prepare_attachments(Some(&json!(["https://files.example.com/docs/rg.pdf"]))).unwrap();
        assert_eq!(value[0]["name"], "rg.pdf");
        assert_eq!(prepare_attachments(None).unwrap(), json!([]));
        assert!(prepare_attachments(Some(&json!("nope"))).is_err());
    }

    #[test]
    fn search_page_maps_items() {
        let page = SearchPage { items: vec![1, 2], total: 7, limit: 2, offset: 4 };
        let mapped = page.map(|n| n * 10);
        assert_eq!(mapped.items, vec![10, 20]);
        assert_eq!((mapped.total, mapped.limit, mapped.offset), (7, 2, 4));
    }
}
