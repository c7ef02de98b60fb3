//! Catalog entity projection.
//!
//! A `CatalogEntity` is the host-facing, read-only projection of one
//! fetched resource plus the cloud-level metadata needed to render it.
//! Identity is the resource UID, stable across fetch cycles, which is
//! what makes full-replace reconciliation safe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cloud::Cloud;
use super::resource::{Cluster, Credential, Identified, License, Proxy, ResourceKind, SshKey};

/// Host-facing projection of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntity {
    /// Server-assigned UID of the underlying resource.
    pub uid: String,
    pub kind: ResourceKind,
    pub name: String,
    pub namespace: String,
    /// Endpoint URL of the owning cloud.
    pub cloud_url: String,
    /// Display name of the owning cloud.
    pub cloud_name: String,
    pub resource_version: String,
    pub created_at: DateTime<Utc>,
}

/// Projection from a fetched resource into catalog-entity form.
pub trait Projectable: Identified {
    /// Catalog kind this resource projects to.
    const KIND: ResourceKind;

    /// Opaque change token of this snapshot.
    fn resource_version(&self) -> &str;

    /// Creation timestamp of the underlying resource.
    fn created_at(&self) -> DateTime<Utc>;

    /// Project into a catalog entity scoped to the given cloud and
    /// namespace.
    fn to_entity(&self, cloud: &Cloud, namespace: &str) -> CatalogEntity {
        CatalogEntity {
            uid: self.uid().to_string(),
            kind: Self::KIND,
            name: self.name().to_string(),
            namespace: namespace.to_string(),
            cloud_url: cloud.cloud_url.clone(),
            cloud_name: cloud.name.clone(),
            resource_version: self.resource_version().to_string(),
            created_at: self.created_at(),
        }
    }
}

macro_rules! impl_projectable {
    ($($ty:ident => $kind:expr),+ $(,)?) => {
        $(
            impl Projectable for $ty {
                const KIND: ResourceKind = $kind;

                fn resource_version(&self) -> &str {
                    &self.meta.resource_version
                }

                fn created_at(&self) -> DateTime<Utc> {
                    self.meta.created_at
                }
            }
        )+
    };
}

impl_projectable!(
    Cluster => ResourceKind::Cluster,
    Credential => ResourceKind::Credential,
    SshKey => ResourceKind::SshKey,
    Proxy => ResourceKind::Proxy,
    License => ResourceKind::License,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::resource::{ClusterSpec, ClusterStatus, ResourceMeta};

    #[test]
    fn projection_carries_cloud_metadata() {
        let cloud = Cloud::new("https://cloud.example.com", "prod");
        let cluster = Cluster {
            meta: ResourceMeta {
                uid: "uid-9".into(),
                name: "edge".into(),
                namespace: Some("team-a".into()),
                resource_version: "33".into(),
                created_at: Utc::now(),
            },
            spec: ClusterSpec::default(),
            status: ClusterStatus::default(),
        };

        let entity = cluster.to_entity(&cloud, "team-a");
        assert_eq!(entity.uid, "uid-9");
        assert_eq!(entity.kind, ResourceKind::Cluster);
        assert_eq!(entity.cloud_url, "https://cloud.example.com");
        assert_eq!(entity.cloud_name, "prod");
        assert_eq!(entity.namespace, "team-a");
        assert_eq!(entity.resource_version, "33");
    }
}
