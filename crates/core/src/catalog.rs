//! Multi-cloud catalog of projected entities.
//!
//! The catalog is a flat, replace-on-write store: each write swaps the
//! full entity set for one (cloud, kind) slice in a single mutation, so
//! readers never observe a window where a slice is cleared but not yet
//! repopulated. Entities are identified by server UID; an entity absent
//! from a write vanishes, one present in both old and new slices is
//! simply replaced.

use nimbus_domain::{CatalogEntity, ResourceKind};
use tokio::sync::watch;
use tracing::debug;

/// Flat entity store shared by every synced cloud.
///
/// Backed by a watch channel: the current snapshot lives inside the
/// channel and every mutation publishes the new snapshot to
/// subscribers.
pub struct Catalog {
    entries: watch::Sender<Vec<CatalogEntity>>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    #[must_use]
    pub fn new() -> Self {
        let (entries, _) = watch::channel(Vec::new());
        Self { entries }
    }

    /// Replace the (cloud, kind) slice with `entities` in one mutation.
    ///
    /// Every other cloud's entities and every other kind of the same
    /// cloud are untouched.
    pub fn replace_kind(&self, cloud_url: &str, kind: ResourceKind, entities: Vec<CatalogEntity>) {
        self.entries.send_modify(|entries| {
            let before = entries.len();
            entries.retain(|e| e.cloud_url != cloud_url || e.kind != kind);
            let removed = before - entries.len();
            debug!(
                cloud = %cloud_url,
                kind = %kind,
                removed,
                added = entities.len(),
                "replacing catalog slice"
            );
            entries.extend(entities);
        });
    }

    /// Drop every entity belonging to `cloud_url`.
    pub fn remove_cloud(&self, cloud_url: &str) {
        self.entries.send_modify(|entries| {
            entries.retain(|e| e.cloud_url != cloud_url);
        });
    }

    /// Current snapshot of the full catalog.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CatalogEntity> {
        self.entries.borrow().clone()
    }

    /// Entities of one kind across all clouds.
    #[must_use]
    pub fn of_kind(&self, kind: ResourceKind) -> Vec<CatalogEntity> {
        self.entries.borrow().iter().filter(|e| e.kind == kind).cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Watch the catalog; the receiver sees every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<CatalogEntity>> {
        self.entries.subscribe()
    }
}
