pub mod field;
pub mod links;

pub use field::{custom_field_delete, custom_fields_get, custom_fields_post};
pub use links::custom_field_links_post;
