//! Domain types and models

pub mod catalog;
pub mod cloud;
pub mod resource;

pub use catalog::{CatalogEntity, Projectable};
pub use cloud::{Cloud, ConnectionStatus, TokenSet};
pub use resource::{
    Cluster, Credential, Identified, License, Namespace, NamespaceData, NamespacePhase, Namespaced,
    Proxy, ResourceCounts, ResourceKind, ResourceLists, SshKey,
};
