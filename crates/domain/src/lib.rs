//! # Nimbus Domain
//!
//! Business domain types and models for Nimbus.
//!
//! This crate contains:
//! - Cloud connection state and token types
//! - Resource and catalog entity models
//! - Domain error types and Result definitions
//! - Configuration structures
//!
//! ## Architecture
//! - No dependencies on other Nimbus crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
