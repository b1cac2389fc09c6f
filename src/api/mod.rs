pub mod format;

pub use format::{associate_to_api_value, associates_to_api_values, metadata_options_from_query, MetadataOptions};
