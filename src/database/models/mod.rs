pub mod admin;
pub mod associate;
pub mod custom_field;
pub mod form;
pub mod link;

pub use admin::Admin;
pub use associate::Associate;
pub use custom_field::CustomField;
pub use form::Form;
pub use link::{FieldLink, FormLink};
