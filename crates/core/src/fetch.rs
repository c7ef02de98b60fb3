//! Per-namespace collection fetcher.
//!
//! Given a resource kind and a set of namespaces, fans out one request
//! per namespace, deserializes successful bodies item by item, and
//! isolates every failure mode: the call never fails, it always returns
//! a partial, best-effort [`CollectionResult`].

use std::collections::BTreeMap;

use futures::future::join_all;
use nimbus_domain::ResourceKind;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::request::{CloudSession, RequestError};

/// Synthetic map key used for cluster-scoped kinds, which are fetched
/// with a single request instead of a per-namespace fan-out.
pub const CLUSTER_SCOPE_KEY: &str = "*";

/// Aggregate result of one collection fetch.
///
/// `items` maps namespace name (or [`CLUSTER_SCOPE_KEY`]) to the
/// successfully deserialized objects. Namespaces that failed hard appear
/// in `errors` and contribute no `items` key at all; permission-denied
/// and benign-404 namespaces appear with an empty list.
#[derive(Debug)]
pub struct CollectionResult<T> {
    pub items: BTreeMap<String, Vec<T>>,
    /// Namespace name to error message, for failures worth surfacing.
    pub errors: BTreeMap<String, String>,
    /// Whether any request in the fan-out refreshed the tokens.
    pub tokens_refreshed: bool,
}

impl<T> Default for CollectionResult<T> {
    fn default() -> Self {
        Self { items: BTreeMap::new(), errors: BTreeMap::new(), tokens_refreshed: false }
    }
}

impl<T> CollectionResult<T> {
    /// Whether the caller should surface a warning. Never a reason to
    /// discard the successfully fetched items.
    #[must_use]
    pub fn errors_occurred(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Items fetched for one namespace, empty when absent.
    #[must_use]
    pub fn for_namespace(&self, namespace: &str) -> &[T] {
        self.items.get(namespace).map_or(&[], Vec::as_slice)
    }

    /// Total item count across all namespaces.
    #[must_use]
    pub fn total(&self) -> usize {
        self.items.values().map(Vec::len).sum()
    }
}

/// Fetch one collection, fanned out across `namespaces`.
///
/// Cluster-scoped kinds issue a single request keyed by
/// [`CLUSTER_SCOPE_KEY`] and ignore `namespaces`. A kind the cloud
/// reports as administratively disabled is skipped entirely with zero
/// requests. An empty namespace list for a namespaced kind yields an
/// empty result, not an error.
#[instrument(skip(session, namespaces), fields(kind = %kind, fanout = namespaces.len()))]
pub async fn fetch_collection<T: DeserializeOwned>(
    session: &CloudSession,
    kind: ResourceKind,
    namespaces: &[String],
) -> CollectionResult<T> {
    let mut result = CollectionResult::default();

    if !session.kind_enabled(kind).await {
        debug!(kind = %kind, "kind disabled on this cloud; skipping fetch");
        return result;
    }

    let targets: Vec<Option<&str>> = if kind.is_cluster_scoped() {
        vec![None]
    } else {
        namespaces.iter().map(|ns| Some(ns.as_str())).collect()
    };

    if targets.is_empty() {
        return result;
    }

    let replies = join_all(targets.into_iter().map(|namespace| async move {
        let key = namespace.unwrap_or(CLUSTER_SCOPE_KEY).to_string();
        (key, session.list(kind, namespace).await)
    }))
    .await;

    for (key, reply) in replies {
        match reply {
            Ok(reply) => {
                result.tokens_refreshed |= reply.tokens_refreshed;
                result.items.insert(key.clone(), deserialize_items(kind, &key, &reply.body));
            }
            Err(err) if err.is_permission_denied() => {
                // Permission gaps are expected and routine.
                debug!(kind = %kind, namespace = %key, "list denied; treating as empty");
                result.items.insert(key, Vec::new());
            }
            Err(err) if err.is_not_found() && kind.tolerates_missing() => {
                debug!(kind = %kind, namespace = %key, "no entries yet; treating 404 as empty");
                result.items.insert(key, Vec::new());
            }
            Err(err) => {
                warn!(kind = %kind, namespace = %key, error = %err, "collection fetch failed");
                result.errors.insert(key, error_summary(&err));
            }
        }
    }

    result
}

fn error_summary(err: &RequestError) -> String {
    match err.status() {
        Some(status) => format!("{status}: {err}"),
        None => err.to_string(),
    }
}

/// Deserialize `body.items` one element at a time.
///
/// A single item failing schema validation is dropped and logged with
/// its index and name; it never aborts the rest of the batch.
fn deserialize_items<T: DeserializeOwned>(kind: ResourceKind, scope: &str, body: &Value) -> Vec<T> {
    let Some(raw_items) = body.get("items").and_then(Value::as_array) else {
        warn!(kind = %kind, namespace = scope, "list body has no items array");
        return Vec::new();
    };

    let mut items = Vec::with_capacity(raw_items.len());
    for (index, raw) in raw_items.iter().enumerate() {
        match serde_json::from_value::<T>(raw.clone()) {
            Ok(item) => items.push(item),
            Err(err) => {
                let name = raw
                    .get("metadata")
                    .and_then(|m| m.get("name"))
                    .and_then(Value::as_str)
                    .unwrap_or("<unknown>");
                warn!(
                    kind = %kind,
                    namespace = scope,
                    index,
                    name,
                    error = %err,
                    "dropping item that failed to deserialize"
                );
            }
        }
    }
    items
}
