pub mod collection;
pub mod lifecycle;
pub mod record;
pub mod search;

pub use collection::{associates_get, associates_post};
pub use lifecycle::{associate_activate, associate_deactivate};
pub use record::{associate_delete, associate_get, associate_patch, associate_put};
pub use search::associates_search;

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct MetaQuery {
    /// Include metadata sections. Examples: meta=true, meta=system,lifecycle
    pub meta: Option<String>,
}
