pub mod auth;
pub mod response;
pub mod validate_admin;

pub use auth::{jwt_auth_middleware, AuthAdmin};
pub use response::{ApiResponse, ApiResult};
pub use validate_admin::{validate_admin_middleware, ValidatedAdmin};
