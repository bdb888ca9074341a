//! # Domain Layer
//!
//! Core business models and the shared error type. Independent of
//! external frameworks and infrastructure.

pub mod error;
pub mod models;

pub use error::*;
pub use models::*;
