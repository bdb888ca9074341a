//! # Connector Layer
//!
//! External integrations implementing the application layer's interfaces:
//! git access, DuckDB-backed metadata and vector storage, tree-sitter
//! parsing/extraction, and embedding generation.

pub mod adapter;

pub use adapter::*;
