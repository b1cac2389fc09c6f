// handlers/mod.rs - two handler tiers
//
// Public (no auth): /auth/*, /public/*
// Protected (JWT + admin validation): /api/*
pub mod protected;
pub mod public;
pub mod utils;
