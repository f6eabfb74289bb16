//! ragdb-core
//!
//! Shared types, the error taxonomy, the embedding collaborator trait,
//! configuration loading and text preparation for the ragdb engines.

pub mod config;
pub mod data_processor;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
