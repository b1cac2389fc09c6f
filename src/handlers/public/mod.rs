// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Token acquisition (/auth/*) and the link pages anonymous visitors
// reach through form and field links (/public/*). Every input here is
// untrusted, and link tokens are the only credential.
pub mod auth;
pub mod links;
