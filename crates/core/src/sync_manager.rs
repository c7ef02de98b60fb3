//! Multi-cloud reconciler.
//!
//! The `SyncManager` owns one [`DataCloud`] per tracked cloud plus the
//! shared [`Catalog`]. Hosts hand it the desired cloud set; it triages
//! added, replaced and removed clouds, keeps a listener per cloud that
//! re-projects fetched data into the catalog on every `DataUpdated`
//! event, and tears everything down on shutdown.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use nimbus_domain::{CatalogEntity, Cloud, Projectable, ResourceKind, SyncSettings};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::data_cloud::DataCloud;
use crate::events::CloudEvent;
use crate::ports::{AuthConnector, EntityClient};

struct CloudEntry {
    data_cloud: Arc<DataCloud>,
    poll: JoinHandle<()>,
    listener: JoinHandle<()>,
}

/// Orchestrates sync across the whole cloud set.
pub struct SyncManager {
    entities: Arc<dyn EntityClient>,
    auth: Arc<dyn AuthConnector>,
    settings: SyncSettings,
    catalog: Arc<Catalog>,
    clouds: Mutex<HashMap<String, CloudEntry>>,
}

impl SyncManager {
    pub fn new(
        entities: Arc<dyn EntityClient>,
        auth: Arc<dyn AuthConnector>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            entities,
            auth,
            settings,
            catalog: Arc::new(Catalog::new()),
            clouds: Mutex::new(HashMap::new()),
        }
    }

    /// The shared catalog populated by the tracked clouds.
    #[must_use]
    pub fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog)
    }

    /// The DataCloud tracking `cloud_url`, if any.
    pub async fn data_cloud(&self, cloud_url: &str) -> Option<Arc<DataCloud>> {
        self.clouds.lock().await.get(cloud_url).map(|entry| Arc::clone(&entry.data_cloud))
    }

    /// Point-in-time copies of every tracked cloud, including tokens
    /// refreshed since the last call. This is what hosts persist.
    pub async fn cloud_snapshots(&self) -> Vec<Cloud> {
        let tracked = self.clouds.lock().await;
        let mut snapshots = Vec::with_capacity(tracked.len());
        for entry in tracked.values() {
            snapshots.push(entry.data_cloud.cloud().await);
        }
        snapshots
    }

    /// Reconcile the tracked set against `desired`, keyed by cloud URL.
    ///
    /// Removed clouds are torn down and scrubbed from the catalog,
    /// surviving clouds get their credentials swapped in place (which
    /// triggers a re-fetch), and new clouds start polling immediately.
    pub async fn update_clouds(&self, desired: Vec<Cloud>) {
        let mut tracked = self.clouds.lock().await;

        let desired_urls: HashSet<&str> =
            desired.iter().map(|cloud| cloud.cloud_url.as_str()).collect();
        let removed: Vec<String> = tracked
            .keys()
            .filter(|url| !desired_urls.contains(url.as_str()))
            .cloned()
            .collect();
        for url in removed {
            if let Some(entry) = tracked.remove(&url) {
                info!(cloud = %url, "cloud removed; stopping sync");
                entry.data_cloud.destroy();
                entry.listener.abort();
                self.catalog.remove_cloud(&url);
            }
        }

        for cloud in desired {
            match tracked.get(&cloud.cloud_url) {
                Some(entry) => {
                    debug!(cloud = %cloud.cloud_url, "updating tracked cloud");
                    entry.data_cloud.replace_cloud(cloud).await;
                }
                None => {
                    info!(cloud = %cloud.cloud_url, "cloud added; starting sync");
                    let url = cloud.cloud_url.clone();
                    tracked.insert(url, self.start_cloud(cloud));
                }
            }
        }
    }

    /// Ask every tracked cloud for an immediate re-fetch.
    pub async fn request_fetch_all(&self) {
        for entry in self.clouds.lock().await.values() {
            entry.data_cloud.request_fetch();
        }
    }

    /// Stop polling and listening for every tracked cloud. The catalog
    /// keeps its last snapshot so hosts can render during shutdown.
    pub async fn shutdown(&self) {
        let mut tracked = self.clouds.lock().await;
        for (url, entry) in tracked.drain() {
            debug!(cloud = %url, "stopping cloud sync");
            entry.data_cloud.destroy();
            entry.listener.abort();
            let _ = entry.poll.await;
        }
    }

    fn start_cloud(&self, cloud: Cloud) -> CloudEntry {
        let data_cloud = DataCloud::new(
            cloud,
            Arc::clone(&self.entities),
            Arc::clone(&self.auth),
            self.settings.clone(),
        );
        // Subscribe before the poll loop starts so the first cycle's
        // events are not missed.
        let mut events = data_cloud.subscribe();
        let poll = data_cloud.spawn();

        let listener_cloud = Arc::clone(&data_cloud);
        let catalog = Arc::clone(&self.catalog);
        let listener = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(CloudEvent::DataUpdated) => {
                        reconcile_catalog(&listener_cloud, &catalog).await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event stream lagged; reconciling anyway");
                        reconcile_catalog(&listener_cloud, &catalog).await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        CloudEntry { data_cloud, poll, listener }
    }
}

/// Project one cloud's fetched data into the shared catalog.
///
/// Only synced namespaces contribute; preview namespaces carry counts
/// without collections and therefore project nothing. Each catalog kind
/// is written with a full replace, so entities that disappeared on the
/// server disappear here too.
async fn reconcile_catalog(data_cloud: &DataCloud, catalog: &Catalog) {
    let cloud = data_cloud.cloud().await;
    let namespaces = data_cloud.namespaces().await;

    let mut per_kind: HashMap<ResourceKind, Vec<CatalogEntity>> = HashMap::new();
    for namespace in &namespaces {
        if !cloud.is_synced(&namespace.name) {
            continue;
        }
        let Some(lists) = namespace.lists() else {
            continue;
        };
        project(&lists.clusters, &cloud, &namespace.name, &mut per_kind);
        project(&lists.credentials, &cloud, &namespace.name, &mut per_kind);
        project(&lists.ssh_keys, &cloud, &namespace.name, &mut per_kind);
        project(&lists.proxies, &cloud, &namespace.name, &mut per_kind);
        project(&lists.licenses, &cloud, &namespace.name, &mut per_kind);
    }

    for kind in ResourceKind::catalog_kinds() {
        let entities = per_kind.remove(kind).unwrap_or_default();
        catalog.replace_kind(&cloud.cloud_url, *kind, entities);
    }
}

fn project<T: Projectable>(
    items: &[T],
    cloud: &Cloud,
    namespace: &str,
    out: &mut HashMap<ResourceKind, Vec<CatalogEntity>>,
) {
    out.entry(T::KIND).or_default().extend(items.iter().map(|item| item.to_entity(cloud, namespace)));
}
