pub mod form;
pub mod links;

pub use form::{form_delete, form_get, form_put, forms_get, forms_post};
pub use links::{form_link_delete, form_links_post};
