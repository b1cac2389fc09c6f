use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::config;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Admin id
    pub sub: Uuid,
    pub email: String,
    pub name: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(admin_id: Uuid, email: String, name: String) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: admin_id,
            email,
            name,
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),

    #[error("JWT secret not configured")]
    InvalidSecret,
}

pub fn generate_jwt(claims: &Claims) -> Result<String, JwtError> {
    let secret = &config::config().security.jwt_secret;

    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

pub fn validate_jwt(token: &str) -> Result<Claims, JwtError> {
    let secret = &config::config().security.jwt_secret;

    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let token_data = decode::<Claims>(token, &decoding_key, &Validation::default())
        .map_err(|e| JwtError::InvalidToken(e.to_string()))?;

    Ok(token_data.claims)
}

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Password worker failed: {0}")]
    Worker(String),
}

/// bcrypt hash (salt embedded) at the configured work factor.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    Ok(bcrypt::hash(password, config::config().security.bcrypt_cost)?)
}

/// A stored hash that cannot be parsed never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match bcrypt::verify(password, hash) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!("Unreadable password hash: {}", e);
            false
        }
    }
}

/// New link token: 32 random bytes as 64 lowercase hex characters. Only its hash is persisted.
pub fn generate_link_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Shape check done before touching the database.
pub fn is_well_formed_token(token: &str) -> bool {
    token.len() == 64 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwt_round_trip_keeps_admin_identity() {
        let admin_id = Uuid::new_v4();
        let claims = Claims::new(admin_id, "rh@example.com".to_string(), "RH".to_string());
        let token = generate_jwt(&claims).unwrap();
        let decoded = validate_jwt(&token).unwrap();
        assert_eq!(decoded.sub, admin_id);
        assert_eq!(decoded.email, "rh@example.com");
        assert!(decoded.exp > decoded.iat);
    }

    #[test]
    fn tampered_jwt_is_rejected() {
        let claims = Claims::new(Uuid::new_v4(), "a@b.co".to_string(), "A".to_string());
        let mut token = generate_jwt(&claims).unwrap();
        token.push('x');
        assert!(matches!(validate_jwt(&token), Err(JwtError::InvalidToken(_))));
        assert!(validate_jwt("not-a-jwt").is_err());
    }

    #[test]
    fn password_hash_is_salted_bcrypt() {
        let hash_a = hash_password("correct horse").unwrap();
        let hash_b = hash_password("correct horse").unwrap();
        assert!(hash_a.starts_with("$2"));
        assert_ne!(hash_a, hash_b);
        assert!(verify_password("correct horse", &hash_a));
        assert!(verify_password("correct horse", &hash_b));
        assert!(!verify_password("wrong horse", &hash_a));
        assert!(!verify_password("correct horse", "not-a-bcrypt-hash"));
    }

    #[test]
    fn link_tokens_are_hex_and_hash_deterministically() {
        let token = generate_link_token();
        assert!(is_well_formed_token(&token));
        assert_ne!(token, generate_link_token());
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
        assert!(!is_well_formed_token("abc"));
        assert!(!is_well_formed_token(&"g".repeat(64)));
    }

    #[test]
    fn link_tokens_have_no_fixed_positions() {
        // Every position should vary across a batch of random tokens
        let tokens: Vec<String> = (0..64).map(|_| generate_link_token()).collect();
        for pos in 0..64 {
            let first = tokens[0].as_bytes()[pos];
            assert!(
                tokens.iter().any(|t| t.as_bytes()[pos] != first),
                "position {} never changed",
                pos
            );
        }
    }
}
