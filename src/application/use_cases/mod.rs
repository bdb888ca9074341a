mod dirty_overlay;
mod index_repository;
mod list_repositories;
mod query_parser;
mod rrf_fuse;
mod search_code;
mod usage_linker;

pub use dirty_overlay::*;
pub use index_repository::*;
pub use list_repositories::*;
pub use query_parser::*;
pub use rrf_fuse::*;
pub use search_code::*;
pub use usage_linker::*;
