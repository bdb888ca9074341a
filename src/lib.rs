//! # CodeSearch
//!
//! A local code-intelligence engine: indexes a git repository at a specific
//! commit into content-addressed chunks plus structural (SQI) symbol/usage/
//! import data, and answers hybrid vector+structural queries over it.
//!
//! ## Architecture
//!
//! The crate is organized following Domain-Driven Design principles:
//!
//! - `domain`: Core business models and the shared error type
//! - `application`: Use cases and the interfaces they depend on
//! - `connector`: External integrations (git2, DuckDB, tree-sitter, embeddings)

pub mod application;
pub mod connector;
pub mod domain;

// Re-export commonly used types
pub use application::*;
pub use connector::*;
pub use domain::*;
