pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod forms;
pub mod handlers;
pub mod middleware;
pub mod search;
pub mod services;
pub mod types;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, StatusCode},
    middleware::from_fn,
    response::{IntoResponse, Json},
    routing::get,
    Extension, Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::database::DatabaseManager;
use crate::middleware::{jwt_auth_middleware, validate_admin_middleware};
use crate::services::{LinkNotifier, LogNotifier};

/// Shared, request-independent dependencies
#[derive(Clone)]
pub struct AppState {
    pub notifier: Arc<dyn LinkNotifier>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            notifier: Arc::new(LogNotifier),
        }
    }
}

pub fn app() -> Router {
    app_with_state(AppState::default())
}

pub fn app_with_state(state: AppState) -> Router {
    let settings = config::config();

    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        .merge(link_public_routes())
        // Protected API
        .merge(protected_routes())
        // Global middleware
        .layer(Extension(state))
        .layer(DefaultBodyLimit::max(settings.api.max_request_size_bytes))
        .layer(cors_layer(&settings.security.cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn auth_public_routes() -> Router {
    use axum::routing::post;
    use handlers::public::auth;

    Router::new()
        .route("/auth/register", post(auth::register_post))
        .route("/auth/login", post(auth::login_post))
}

fn link_public_routes() -> Router {
    use handlers::public::links;

    Router::new()
        .route("/public/forms/:token", get(links::form_link_get).post(links::form_link_post))
        .route("/public/fields/:token", get(links::field_link_get).post(links::field_link_post))
}

/// Everything under /api: JWT first, then the admin must still exist.
fn protected_routes() -> Router {
    Router::new()
        .merge(auth_routes())
        .merge(associate_routes())
        .merge(form_routes())
        .merge(custom_field_routes())
        .route_layer(from_fn(validate_admin_middleware))
        .route_layer(from_fn(jwt_auth_middleware))
}

fn auth_routes() -> Router {
    use handlers::protected::auth;

    Router::new().route("/api/auth/whoami", get(auth::whoami_get))
}

fn associate_routes() -> Router {
    use axum::routing::post;
    use handlers::protected::associates;

    Router::new()
        .route("/api/associates", get(associates::associates_get).post(associates::associates_post))
        .route("/api/associates/search", post(associates::associates_search))
        .route(
            "/api/associates/:id",
            get(associates::associate_get)
                .put(associates::associate_put)
                .patch(associates::associate_patch)
                .delete(associates::associate_delete),
        )
        .route("/api/associates/:id/deactivate", post(associates::associate_deactivate))
        .route("/api/associates/:id/activate", post(associates::associate_activate))
}

fn form_routes() -> Router {
    use axum::routing::{delete, post};
    use handlers::protected::forms;

    Router::new()
        .route("/api/forms", get(forms::forms_get).post(forms::forms_post))
        .route(
            "/api/forms/:id",
            get(forms::form_get).put(forms::form_put).delete(forms::form_delete),
        )
        .route("/api/forms/:id/links", post(forms::form_links_post))
        .route("/api/forms/:id/links/:link_id", delete(forms::form_link_delete))
}

fn custom_field_routes() -> Router {
    use axum::routing::{delete, post};
    use handlers::protected::custom_fields;

    Router::new()
        .route(
            "/api/custom-fields",
            get(custom_fields::custom_fields_get).post(custom_fields::custom_fields_post),
        )
        .route("/api/custom-fields/:id", delete(custom_fields::custom_field_delete))
        .route("/api/custom-fields/:id/links", post(custom_fields::custom_field_links_post))
}

/// `*` (or nothing configured) allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(allowed))
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "HR Associates API",
            "version": version,
            "description": "Associate records, dynamic forms and free-text search for HR admins",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "auth": "/auth/register, /auth/login (public - token acquisition)",
                "links": "/public/forms/:token, /public/fields/:token (public - link token)",
                "whoami": "/api/auth/whoami (protected)",
                "associates": "/api/associates[/:id][/activate|/deactivate], /api/associates/search (protected)",
                "forms": "/api/forms[/:id][/links[/:link_id]] (protected)",
                "custom_fields": "/api/custom-fields[/:id][/links] (protected)",
            }
        }
    }))
}

async fn health() -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "database": "unavailable"
                    }
                })),
            )
        }
    }
}
