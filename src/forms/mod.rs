pub mod field;
pub mod validate;

pub use field::{Attachment, FieldKind, FormField};
pub use validate::{
    validate_attachments, validate_definition, validate_field_definition, validate_submission,
    validate_value, FieldErrors, FormError,
};
