pub mod types;
pub mod parser;
pub mod search;
pub mod search_where;
pub mod search_order;
pub mod error;

pub use types::*;
pub use error::SearchError;
pub use parser::{parse_search_query, parse_where_object};
pub use search::Search;
