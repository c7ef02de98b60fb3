//! # Nimbus Infra
//!
//! Reqwest-backed implementations of the engine's ports plus the
//! configuration loader. Everything here is replaceable behind the
//! traits in `nimbus_core::ports`; the engine itself never sees HTTP.

pub mod auth_connector;
pub mod config;
pub mod entity_client;

pub use auth_connector::HttpAuthConnector;
pub use config::{load, load_from_file, CloudSeed, SyncConfig};
pub use entity_client::HttpEntityClient;
