// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Every route here runs behind jwt_auth_middleware followed by
// validate_admin_middleware, so handlers receive a ValidatedAdmin
// extension and scope all work to that admin.
pub mod associates;
pub mod auth;
pub mod custom_fields;
pub mod forms;
