use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub search: SearchConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub links: LinkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub default_limit: i64,
    pub max_limit: Option<i64>,
    pub debug_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub slow_query_threshold_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
    /// Never serialized back out (config dumps end up in logs).
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub min_password_length: usize,
    /// bcrypt work factor (4..=31)
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Base URL of the public UI; link tokens are appended as `/forms/<token>` or `/fields/<token>`.
    pub public_base_url: String,
    pub form_link_ttl_hours: i64,
    pub field_link_ttl_hours: i64,
    pub max_ttl_hours: i64,
    /// Upper bound on associates per field-link request
    pub max_field_links_per_request: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Search overrides
        if let Ok(v) = env::var("SEARCH_DEFAULT_LIMIT") {
            self.search.default_limit = v.parse().unwrap_or(self.search.default_limit);
        }
        if let Ok(v) = env::var("SEARCH_MAX_LIMIT") {
            self.search.max_limit = v.parse().ok();
        }
        if let Ok(v) = env::var("SEARCH_DEBUG_LOGGING") {
            self.search.debug_logging = v.parse().unwrap_or(self.search.debug_logging);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_SLOW_QUERY_THRESHOLD_MS") {
            self.database.slow_query_threshold_ms = v.parse().unwrap_or(self.database.slow_query_threshold_ms);
        }

        // API overrides
        if let Some(v) = env::var("HR_API_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_MIN_PASSWORD_LENGTH") {
            self.security.min_password_length = v.parse().unwrap_or(self.security.min_password_length);
        }
        if let Ok(v) = env::var("SECURITY_BCRYPT_COST") {
            self.security.bcrypt_cost = v.parse().unwrap_or(self.security.bcrypt_cost);
        }

        // Link overrides
        if let Ok(v) = env::var("LINKS_PUBLIC_BASE_URL") {
            self.links.public_base_url = v;
        }
        if let Ok(v) = env::var("LINKS_FORM_TTL_HOURS") {
            self.links.form_link_ttl_hours = v.parse().unwrap_or(self.links.form_link_ttl_hours);
        }
        if let Ok(v) = env::var("LINKS_FIELD_TTL_HOURS") {
            self.links.field_link_ttl_hours = v.parse().unwrap_or(self.links.field_link_ttl_hours);
        }
        if let Ok(v) = env::var("LINKS_MAX_TTL_HOURS") {
            self.links.max_ttl_hours = v.parse().unwrap_or(self.links.max_ttl_hours);
        }
        if let Ok(v) = env::var("LINKS_MAX_FIELD_LINKS_PER_REQUEST") {
            self.links.max_field_links_per_request = v.parse().unwrap_or(self.links.max_field_links_per_request);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            search: SearchConfig {
                default_limit: 50,
                max_limit: Some(1000),
                debug_logging: true,
            },
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 30,
                slow_query_threshold_ms: 100,
            },
            api: ApiConfig {
                port: 3000,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                jwt_secret: "development-only-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                min_password_length: 6,
                bcrypt_cost: 8,
            },
            links: LinkConfig {
                public_base_url: "http://localhost:5173".to_string(),
                form_link_ttl_hours: 24 * 7,
                field_link_ttl_hours: 72,
                max_ttl_hours: 24 * 30,
                max_field_links_per_request: 500,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            search: SearchConfig {
                default_limit: 50,
                max_limit: Some(500),
                debug_logging: false,
            },
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
                slow_query_threshold_ms: 500,
            },
            api: ApiConfig {
                port: 3000,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            security: SecurityConfig {
                cors_origins: vec!["https://staging.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                min_password_length: 8,
                bcrypt_cost: 10,
            },
            links: LinkConfig {
                public_base_url: "https://staging.example.com".to_string(),
                form_link_ttl_hours: 72,
                field_link_ttl_hours: 72,
                max_ttl_hours: 24 * 14,
                max_field_links_per_request: 500,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            search: SearchConfig {
                default_limit: 25,
                max_limit: Some(100),
                debug_logging: false,
            },
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
                slow_query_threshold_ms: 1000,
            },
            api: ApiConfig {
                port: 3000,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            security: SecurityConfig {
                cors_origins: vec!["https://app.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 8,
                min_password_length: 10,
                bcrypt_cost: 12,
            },
            links: LinkConfig {
                public_base_url: "https://app.example.com".to_string(),
                form_link_ttl_hours: 48,
                field_link_ttl_hours: 48,
                max_ttl_hours: 24 * 7,
                max_field_links_per_request: 200,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}
