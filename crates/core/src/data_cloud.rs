//! Per-cloud polling orchestrator.
//!
//! A `DataCloud` owns one cloud's fetch lifecycle: namespace discovery,
//! dependent collection fetches, interval-based re-fetch, and an event
//! stream describing state transitions. Namespace discovery strictly
//! precedes the dependent fan-out so that an expired token is refreshed
//! by the first request of the cycle and every later request runs on
//! the fresh token.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nimbus_domain::{
    Cloud, Cluster, Credential, Identified, License, Namespace, NamespaceData, NamespacePhase,
    Proxy, ResourceKind, ResourceLists, SshKey, SyncSettings,
};
use tokio::sync::{broadcast, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::claims;
use crate::events::{CloudEvent, EventBus};
use crate::fetch::{fetch_collection, CollectionResult, CLUSTER_SCOPE_KEY};
use crate::ports::{AuthConnector, EntityClient};
use crate::request::CloudSession;

/// Snapshot of a DataCloud's fetch lifecycle state.
///
/// `loaded` is monotonic: false until the first cycle that completes
/// namespace discovery, true forever after, even when later cycles
/// error. `namespaces` always holds the last successfully committed
/// set; an erroring cloud keeps its stale data rather than clearing it.
#[derive(Debug, Clone, Default)]
pub struct FetchState {
    pub loaded: bool,
    pub error: Option<String>,
    pub namespaces: Vec<NamespaceData>,
}

/// Polling fetch orchestrator for one cloud.
pub struct DataCloud {
    session: CloudSession,
    auth: Arc<dyn AuthConnector>,
    settings: SyncSettings,
    state: RwLock<FetchState>,
    fetching: AtomicBool,
    events: EventBus,
    trigger: Notify,
    cancel: CancellationToken,
}

impl DataCloud {
    pub fn new(
        cloud: Cloud,
        entities: Arc<dyn EntityClient>,
        auth: Arc<dyn AuthConnector>,
        settings: SyncSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            session: CloudSession::new(cloud, entities, Arc::clone(&auth)),
            auth,
            settings,
            state: RwLock::new(FetchState::default()),
            fetching: AtomicBool::new(false),
            events: EventBus::default(),
            trigger: Notify::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// Start the poll loop: an immediate fetch, then interval ticks and
    /// coalesced external triggers until [`DataCloud::destroy`].
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.fetch_data().await;
            loop {
                tokio::select! {
                    _ = this.cancel.cancelled() => {
                        debug!("poll loop cancelled");
                        break;
                    }
                    _ = tokio::time::sleep(this.settings.fetch_interval) => {
                        this.fetch_data().await;
                    }
                    _ = this.trigger.notified() => {
                        this.fetch_data().await;
                    }
                }
            }
        })
    }

    /// Subscribe to this DataCloud's event stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CloudEvent> {
        self.events.subscribe()
    }

    /// Ask the poll loop for a fetch. Concurrent requests collapse into
    /// a single scheduled fetch.
    pub fn request_fetch(&self) {
        self.trigger.notify_one();
    }

    /// Stop future scheduling. Does not abort an outstanding fetch.
    pub fn destroy(&self) {
        self.cancel.cancel();
    }

    /// Swap the cloud this DataCloud tracks (same URL, new credentials)
    /// and trigger a re-fetch. Fetch lifecycle state is preserved so
    /// already-synced data keeps its identity.
    pub async fn replace_cloud(&self, cloud: Cloud) {
        *self.session.cloud_handle().write().await = cloud;
        self.request_fetch();
    }

    /// Point-in-time copy of the tracked cloud, including any tokens
    /// refreshed by the request layer; this is what hosts persist.
    pub async fn cloud(&self) -> Cloud {
        self.session.snapshot().await
    }

    pub async fn state(&self) -> FetchState {
        self.state.read().await.clone()
    }

    pub async fn loaded(&self) -> bool {
        self.state.read().await.loaded
    }

    pub async fn error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    pub async fn namespaces(&self) -> Vec<NamespaceData> {
        self.state.read().await.namespaces.clone()
    }

    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.fetching.load(Ordering::SeqCst)
    }

    /// Run one fetch cycle unless one is already in flight.
    ///
    /// Re-entrant guard: a second call while a fetch is outstanding
    /// returns immediately; at most one fetch per DataCloud is ever in
    /// flight.
    pub async fn fetch_data(&self) {
        if self
            .fetching
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("fetch already in flight; ignoring trigger");
            return;
        }
        self.events.emit(CloudEvent::FetchingChanged);

        self.run_cycle().await;

        self.fetching.store(false, Ordering::SeqCst);
        self.events.emit(CloudEvent::FetchingChanged);
    }

    async fn run_cycle(&self) {
        let cloud = self.session.snapshot().await;
        debug!(cloud = %cloud.cloud_url, "starting fetch cycle");

        if cloud.config.is_none() {
            match self.auth.load_capabilities(&cloud.cloud_url).await {
                Ok(caps) => {
                    self.session.cloud_handle().write().await.config = Some(caps);
                }
                Err(err) => {
                    self.set_error(format!("failed to load cloud configuration: {err}")).await;
                    return;
                }
            }
        }

        if !cloud.connected() {
            self.set_error("cloud is not connected; re-authentication required").await;
            return;
        }

        // Namespace discovery gates the whole cycle: nothing else can be
        // scoped without it.
        let discovered: CollectionResult<Namespace> =
            fetch_collection(&self.session, ResourceKind::Namespace, &[]).await;
        if discovered.errors_occurred() || !discovered.items.contains_key(CLUSTER_SCOPE_KEY) {
            let message = discovered
                .errors
                .get(CLUSTER_SCOPE_KEY)
                .cloned()
                .unwrap_or_else(|| "namespace discovery returned no data".to_string());
            self.set_error(format!("namespace discovery failed: {message}")).await;
            return;
        }

        let all_names: Vec<String> = discovered
            .for_namespace(CLUSTER_SCOPE_KEY)
            .iter()
            .map(|ns| ns.name().to_string())
            .collect();
        let phases: HashMap<String, NamespacePhase> = discovered
            .for_namespace(CLUSTER_SCOPE_KEY)
            .iter()
            .map(|ns| (ns.name().to_string(), ns.status.phase))
            .collect();

        // Tokens may have been refreshed by the discovery request; take
        // a fresh snapshot before reading the claim roles.
        let cloud = self.session.snapshot().await;
        let unignored: Vec<String> = all_names
            .iter()
            .filter(|name| !cloud.ignored_namespaces.contains(name))
            .cloned()
            .collect();
        let targets = claims::readable_namespaces(cloud.access_token(), unignored);

        let (clusters, credentials, ssh_keys) = tokio::join!(
            fetch_collection::<Cluster>(&self.session, ResourceKind::Cluster, &targets),
            fetch_collection::<Credential>(&self.session, ResourceKind::Credential, &targets),
            fetch_collection::<SshKey>(&self.session, ResourceKind::SshKey, &targets),
        );
        // Preview clouds trade proxies and licenses for latency.
        let (proxies, licenses) = if self.settings.preview {
            (CollectionResult::default(), CollectionResult::default())
        } else {
            tokio::join!(
                fetch_collection::<Proxy>(&self.session, ResourceKind::Proxy, &targets),
                fetch_collection::<License>(&self.session, ResourceKind::License, &targets),
            )
        };

        let mut partial_errors = Vec::new();
        collect_errors(ResourceKind::Cluster, &clusters, &mut partial_errors);
        collect_errors(ResourceKind::Credential, &credentials, &mut partial_errors);
        collect_errors(ResourceKind::SshKey, &ssh_keys, &mut partial_errors);
        collect_errors(ResourceKind::Proxy, &proxies, &mut partial_errors);
        collect_errors(ResourceKind::License, &licenses, &mut partial_errors);

        let mut clusters = clusters;
        let mut credentials = credentials;
        let mut ssh_keys = ssh_keys;
        let mut proxies = proxies;
        let mut licenses = licenses;

        let mut namespaces = Vec::with_capacity(targets.len());
        for name in &targets {
            let phase = phases.get(name).copied().unwrap_or_default();
            let lists = ResourceLists {
                clusters: clusters.items.remove(name).unwrap_or_default(),
                credentials: credentials.items.remove(name).unwrap_or_default(),
                ssh_keys: ssh_keys.items.remove(name).unwrap_or_default(),
                proxies: proxies.items.remove(name).unwrap_or_default(),
                licenses: licenses.items.remove(name).unwrap_or_default(),
            };

            if self.settings.preview {
                namespaces.push(NamespaceData::preview(name, phase, lists.counts()));
            } else {
                let mut data = NamespaceData::full(name, phase);
                if let Err(err) = data.attach(lists) {
                    warn!(namespace = %name, error = %err, "failed to attach collections");
                }
                namespaces.push(data);
            }
        }

        self.commit(namespaces, partial_errors, &all_names).await;
    }

    /// Replace the namespace list atomically and reconcile the cloud's
    /// synced/ignored bookkeeping against the namespaces that actually
    /// exist on the server.
    async fn commit(
        &self,
        namespaces: Vec<NamespaceData>,
        partial_errors: Vec<String>,
        discovered_names: &[String],
    ) {
        let new_error =
            if partial_errors.is_empty() { None } else { Some(partial_errors.join("; ")) };

        let (first_load, error_changed) = {
            let mut state = self.state.write().await;
            let first_load = !state.loaded;
            let error_changed = state.error != new_error;
            state.loaded = true;
            state.error = new_error;
            state.namespaces = namespaces;
            (first_load, error_changed)
        };

        self.session.cloud_handle().write().await.reconcile_namespaces(discovered_names);

        if first_load {
            info!("first fetch cycle completed");
            self.events.emit(CloudEvent::Loaded);
        }
        if error_changed {
            self.events.emit(CloudEvent::ErrorChanged);
        }
        self.events.emit(CloudEvent::DataUpdated);
    }

    /// Record a cycle-level error. Previously fetched namespaces are
    /// retained: stale-but-present data beats an empty catalog.
    async fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(error = %message, "fetch cycle failed");

        let changed = {
            let mut state = self.state.write().await;
            let changed = state.error.as_deref() != Some(message.as_str());
            state.error = Some(message);
            changed
        };
        if changed {
            self.events.emit(CloudEvent::ErrorChanged);
        }
    }
}

impl Drop for DataCloud {
    fn drop(&mut self) {
        if !self.cancel.is_cancelled() {
            self.cancel.cancel();
        }
    }
}

fn collect_errors<T>(kind: ResourceKind, result: &CollectionResult<T>, out: &mut Vec<String>) {
    for (namespace, message) in &result.errors {
        out.push(format!("{kind}/{namespace}: {message}"));
    }
}
