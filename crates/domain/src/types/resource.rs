//! Resource model for management-plane API objects.
//!
//! The remote API exposes Kubernetes-style items. Instead of a class
//! hierarchy, each concrete kind is a plain struct carrying a shared
//! `ResourceMeta` plus kind-specific spec fields, with the common
//! capabilities (identity, namespacing) expressed as small traits.
//!
//! Resources are immutable value snapshots: never mutated in place after
//! deserialization, only replaced wholesale on the next fetch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resource kinds known to the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Namespace,
    Cluster,
    Credential,
    SshKey,
    Proxy,
    License,
    /// Release upgrade history entries for a cluster. Endpoints 404 for
    /// namespaces where no upgrade ever happened.
    UpdateHistory,
}

impl ResourceKind {
    /// Cluster-scoped kinds are listed with a single request instead of
    /// a per-namespace fan-out.
    #[must_use]
    pub fn is_cluster_scoped(self) -> bool {
        matches!(self, Self::Namespace)
    }

    /// Explicit allow-list of kinds whose 404 means "nothing here yet"
    /// rather than a broken endpoint. The API gives no other signal to
    /// tell the two apart, so this is never inferred from status alone.
    #[must_use]
    pub fn tolerates_missing(self) -> bool {
        matches!(self, Self::UpdateHistory)
    }

    /// Kinds that are projected into the catalog.
    #[must_use]
    pub fn catalog_kinds() -> &'static [Self] {
        &[Self::Cluster, Self::Credential, Self::SshKey, Self::Proxy, Self::License]
    }

    /// Stable lowercase label for logging and routing.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Namespace => "namespace",
            Self::Cluster => "cluster",
            Self::Credential => "credential",
            Self::SshKey => "sshkey",
            Self::Proxy => "proxy",
            Self::License => "license",
            Self::UpdateHistory => "updatehistory",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata shared by every API item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMeta {
    /// Server-assigned UID, stable across fetches.
    pub uid: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Opaque change token.
    pub resource_version: String,
    #[serde(rename = "creationTimestamp")]
    pub created_at: DateTime<Utc>,
}

/// Identity capability: every resource has a UID and a name.
pub trait Identified {
    fn uid(&self) -> &str;
    fn name(&self) -> &str;
}

/// Namespacing capability.
pub trait Namespaced {
    fn namespace(&self) -> Option<&str>;
}

macro_rules! impl_resource_accessors {
    ($($ty:ident),+ $(,)?) => {
        $(
            impl Identified for $ty {
                fn uid(&self) -> &str {
                    &self.meta.uid
                }

                fn name(&self) -> &str {
                    &self.meta.name
                }
            }

            impl Namespaced for $ty {
                fn namespace(&self) -> Option<&str> {
                    self.meta.namespace.as_deref()
                }
            }
        )+
    };
}

/// Phase of a namespace on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NamespacePhase {
    Active,
    Terminating,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamespaceStatus {
    #[serde(default)]
    pub phase: NamespacePhase,
}

/// A namespace item as listed by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    #[serde(rename = "metadata")]
    pub meta: ResourceMeta,
    #[serde(default)]
    pub status: NamespaceStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterStatus {
    #[serde(default)]
    pub ready: bool,
}

/// A managed cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    #[serde(rename = "metadata")]
    pub meta: ResourceMeta,
    #[serde(default)]
    pub spec: ClusterSpec,
    #[serde(default)]
    pub status: ClusterStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSpec {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub valid: bool,
}

/// A provider credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "metadata")]
    pub meta: ResourceMeta,
    #[serde(default)]
    pub spec: CredentialSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshKeySpec {
    #[serde(default)]
    pub public_key: Option<String>,
}

/// An SSH public key registered with the management plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SshKey {
    #[serde(rename = "metadata")]
    pub meta: ResourceMeta,
    #[serde(default)]
    pub spec: SshKeySpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxySpec {
    #[serde(default)]
    pub http_proxy: Option<String>,
    #[serde(default)]
    pub https_proxy: Option<String>,
}

/// A proxy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proxy {
    #[serde(rename = "metadata")]
    pub meta: ResourceMeta,
    #[serde(default)]
    pub spec: ProxySpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseSpec {
    #[serde(default)]
    pub expiration_time: Option<DateTime<Utc>>,
}

/// A product license.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    #[serde(rename = "metadata")]
    pub meta: ResourceMeta,
    #[serde(default)]
    pub spec: LicenseSpec,
}

impl_resource_accessors!(Namespace, Cluster, Credential, SshKey, Proxy, License);

/// Materialized collections for one namespace after a full fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceLists {
    pub clusters: Vec<Cluster>,
    pub credentials: Vec<Credential>,
    pub ssh_keys: Vec<SshKey>,
    pub proxies: Vec<Proxy>,
    pub licenses: Vec<License>,
}

/// Per-kind counts kept by preview clouds instead of full collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub clusters: usize,
    pub credentials: usize,
    pub ssh_keys: usize,
    pub proxies: usize,
    pub licenses: usize,
}

impl ResourceLists {
    #[must_use]
    pub fn counts(&self) -> ResourceCounts {
        ResourceCounts {
            clusters: self.clusters.len(),
            credentials: self.credentials.len(),
            ssh_keys: self.ssh_keys.len(),
            proxies: self.proxies.len(),
            licenses: self.licenses.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum NamespaceContents {
    /// Preview clouds cache counts only.
    Counts(ResourceCounts),
    Full(ResourceLists),
}

/// One namespace together with the resources fetched for it.
///
/// Full namespaces own materialized collections; preview namespaces hold
/// counts only and reject collection writes.
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceData {
    pub name: String,
    pub phase: NamespacePhase,
    contents: NamespaceContents,
}

impl NamespaceData {
    /// Namespace that will carry materialized collections.
    #[must_use]
    pub fn full(name: impl Into<String>, phase: NamespacePhase) -> Self {
        Self { name: name.into(), phase, contents: NamespaceContents::Full(ResourceLists::default()) }
    }

    /// Preview namespace carrying counts only.
    #[must_use]
    pub fn preview(name: impl Into<String>, phase: NamespacePhase, counts: ResourceCounts) -> Self {
        Self { name: name.into(), phase, contents: NamespaceContents::Counts(counts) }
    }

    #[must_use]
    pub fn is_preview(&self) -> bool {
        matches!(self.contents, NamespaceContents::Counts(_))
    }

    /// Attach fetched collections to this namespace.
    ///
    /// # Errors
    /// Returns `NimbusError::InvalidInput` when this is a preview
    /// namespace backed by counts.
    pub fn attach(&mut self, lists: ResourceLists) -> crate::errors::Result<()> {
        match &mut self.contents {
            NamespaceContents::Full(existing) => {
                *existing = lists;
                Ok(())
            }
            NamespaceContents::Counts(_) => Err(crate::errors::NimbusError::InvalidInput(format!(
                "namespace {} is a preview snapshot; collections are read-only",
                self.name
            ))),
        }
    }

    /// Materialized collections, empty for preview namespaces.
    #[must_use]
    pub fn lists(&self) -> Option<&ResourceLists> {
        match &self.contents {
            NamespaceContents::Full(lists) => Some(lists),
            NamespaceContents::Counts(_) => None,
        }
    }

    /// Per-kind counts, derived from the collections for full
    /// namespaces.
    #[must_use]
    pub fn counts(&self) -> ResourceCounts {
        match &self.contents {
            NamespaceContents::Full(lists) => lists.counts(),
            NamespaceContents::Counts(counts) => *counts,
        }
    }
}
