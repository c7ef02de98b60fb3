//! # Nimbus Core
//!
//! The synchronization engine: authenticated request layer, per-namespace
//! collection fetcher, per-cloud polling orchestrator (`DataCloud`), and
//! the multi-cloud catalog reconciler (`SyncManager`).
//!
//! External collaborators (HTTP transport, token endpoint) are reached
//! through the ports in [`ports`]; `nimbus-infra` provides the
//! reqwest-backed implementations.

pub mod catalog;
pub mod claims;
pub mod data_cloud;
pub mod events;
pub mod fetch;
pub mod ports;
pub mod request;
pub mod sync_manager;

pub use catalog::Catalog;
pub use data_cloud::{DataCloud, FetchState};
pub use events::CloudEvent;
pub use fetch::{fetch_collection, CollectionResult, CLUSTER_SCOPE_KEY};
pub use ports::{AuthConnector, EntityClient, ListOutcome};
pub use request::{CloudSession, ListReply, RequestError};
pub use sync_manager::SyncManager;
