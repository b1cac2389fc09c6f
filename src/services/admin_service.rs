use once_cell::sync::Lazy;
use sqlx::PgPool;
use uuid::Uuid;

use super::{conflict_on_unique, ServiceError};
use crate::auth::{hash_password, verify_password, PasswordError};
use crate::database::{models::Admin, DatabaseManager};
use crate::forms::validate::validate_email_format;

/// Checked when the email is unknown so both login failures cost one bcrypt verify.
static DUMMY_HASH: Lazy<Option<String>> = Lazy::new(|| hash_password("not-a-real-password").ok());

pub struct AdminService {
    pool: PgPool,
}

impl AdminService {
    pub async fn new() -> Result<Self, ServiceError> {
        Ok(Self::with_pool(DatabaseManager::pool().await?))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<Admin, ServiceError> {
        let name = name.trim();
        let email = normalize_email(email);
        validate_registration(name, &email, password)?;

        let password = password.to_string();
        let password_hash = blocking(move || hash_password(&password)).await??;
        let admin = sqlx::query_as::<_, Admin>(
            r#"
            INSERT INTO admins (id, name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(&email)
        .bind(&password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "Email is already registered"))?;

        tracing::info!("Registered admin {} ({})", admin.id, admin.email);
        Ok(admin)
    }

    /// Same error for unknown email and wrong password.
    pub async fn login(&self, email: &str, password: &str) -> Result<Admin, ServiceError> {
        let email = normalize_email(email);
        let admin = self.find_by_email(&email).await?;

        let stored = admin.as_ref().map(|a| a.password_hash.clone());
        let password = password.to_string();
        let verified = blocking(move || match stored {
            Some(hash) => verify_password(&password, &hash),
            None => {
                if let Some(dummy) = DUMMY_HASH.as_deref() {
                    verify_password(&password, dummy);
                }
                false
            }
        })
        .await?;

        match admin {
            Some(admin) if verified => Ok(admin),
            _ => {
                tracing::warn!("Failed login for {}", email);
                Err(ServiceError::Unauthorized("Invalid email or password".to_string()))
            }
        }
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<Admin>, ServiceError> {
        let admin = sqlx::query_as::<_, Admin>("SELECT * FROM admins WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(admin)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Admin>, ServiceError> {
        let admin = sqlx::query_as::<_, Admin>(
            "SELECT * FROM admins WHERE lower(email) = $1 AND deleted_at IS NULL",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(admin)
    }
}

/// bcrypt is CPU bound; keep it off the async workers.
async fn blocking<T, F>(work: F) -> Result<T, PasswordError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| PasswordError::Worker(e.to_string()))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_registration(name: &str, email: &str, password: &str) -> Result<(), ServiceError> {
    if name.is_empty() {
        return Err(ServiceError::InvalidInput("Name is required".to_string()));
    }
    validate_email_format(email).map_err(ServiceError::InvalidInput)?;

    let min = crate::config::config().security.min_password_length;
    if password.chars().count() < min {
        return Err(ServiceError::InvalidInput(format!(
            "Password must be at least {} characters",
            min
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_input_checks() {
        assert!(validate_registration("RH", "rh@empresa.com.br", "segredo123").is_ok());
        assert!(matches!(
            validate_registration("", "rh@empresa.com.br", "segredo123"),
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(validate_registration("RH", "not-an-email", "segredo123").is_err());
        assert!(validate_registration("RH", "rh@empresa.com.br", "x").is_err());
    }

    #[test]
    fn emails_compare_case_insensitively() {
        assert_eq!(normalize_email("  RH@Empresa.COM "), "rh@empresa.com");
    }

    #[test]
    fn unknown_email_is_checked_against_a_real_hash() {
        let dummy = DUMMY_HASH.as_deref().expect("dummy hash");
        assert!(dummy.starts_with("$2"));
        assert!(!verify_password("segredo123", dummy));
    }

    #[tokio::test]
    async fn password_work_runs_off_the_runtime() {
        let hash = blocking(|| hash_password("segredo123")).await.unwrap().unwrap();
        assert!(blocking(move || verify_password("segredo123", &hash)).await.unwrap());
    }
}
