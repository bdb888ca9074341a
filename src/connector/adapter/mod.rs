mod duckdb_metadata_repository;
mod duckdb_sqi_repository;
mod duckdb_vector_repository;
mod git2_repository;
mod mock_embedding;
mod ort_embedding;
mod treesitter_parser;

pub use duckdb_metadata_repository::*;
pub use duckdb_sqi_repository::*;
pub use duckdb_vector_repository::*;
pub use git2_repository::*;
pub use mock_embedding::*;
pub use ort_embedding::*;
pub use treesitter_parser::*;
