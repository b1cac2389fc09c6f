pub mod field_link;
pub mod form_link;

pub use field_link::{field_link_get, field_link_post};
pub use form_link::{form_link_get, form_link_post};

use crate::auth::is_well_formed_token;
use crate::error::ApiError;

/// Rejects tokens that cannot exist before touching the database.
fn require_token_shape(token: &str) -> Result<(), ApiError> {
    if is_well_formed_token(token) {
        Ok(())
    } else {
        Err(ApiError::not_found("Link not found"))
    }
}
