//! End-to-end sync through the real HTTP implementations against a
//! mock management plane.

use std::sync::Arc;
use std::time::Duration;

use nimbus_core::{Catalog, DataCloud, SyncManager};
use nimbus_domain::{Cloud, ResourceKind, SyncSettings, TokenSet};
use nimbus_infra::{HttpAuthConnector, HttpEntityClient};
use wiremock::matchers::{bearer_token, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn namespace_body(names: &[&str]) -> serde_json::Value {
    let items: Vec<_> = names
        .iter()
        .map(|name| {
            serde_json::json!({
                "metadata": {
                    "uid": format!("ns-{name}"),
                    "name": name,
                    "resourceVersion": "1",
                    "creationTimestamp": "2024-03-01T12:00:00Z"
                },
                "status": { "phase": "Active" }
            })
        })
        .collect();
    serde_json::json!({ "items": items })
}

fn cluster_body(namespace: &str, uid: &str, name: &str) -> serde_json::Value {
    serde_json::json!({ "items": [{
        "metadata": {
            "uid": uid,
            "name": name,
            "namespace": namespace,
            "resourceVersion": "3",
            "creationTimestamp": "2024-03-01T12:00:00Z"
        },
        "spec": { "provider": "aws", "region": "eu-central-1" }
    }] })
}

fn empty_list() -> serde_json::Value {
    serde_json::json!({ "items": [] })
}

async fn mount_capabilities(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/apis/nimbus/v1/capabilities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(server)
        .await;
}

async fn mount_empty(server: &MockServer, endpoint: &str) {
    Mock::given(method("GET"))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_list()))
        .mount(server)
        .await;
}

fn seed_cloud(url: &str, access_token: &str) -> Cloud {
    let mut cloud = Cloud::new(url, "integration");
    cloud.update_tokens(TokenSet::new(access_token.into(), Some("r-1".into()), 0));
    cloud.sync_all = true;
    cloud
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

/// The full loop: a stale token 401s on namespace discovery, gets
/// refreshed exactly once, and the cycle lands cluster entities in the
/// catalog under the fresh token.
#[tokio::test(flavor = "multi_thread")]
async fn stale_token_is_refreshed_and_catalog_is_populated() {
    let server = MockServer::start().await;
    mount_capabilities(&server).await;

    Mock::given(method("GET"))
        .and(path("/apis/nimbus/v1/namespaces"))
        .and(bearer_token("stale"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "accessToken": "fresh",
            "refreshToken": "r-2",
            "expiresIn": 300
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/apis/nimbus/v1/namespaces"))
        .and(bearer_token("fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(namespace_body(&["team-a"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/apis/nimbus/v1/namespaces/team-a/clusters"))
        .and(bearer_token("fresh"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(cluster_body("team-a", "c-1", "edge")),
        )
        .mount(&server)
        .await;
    // Permission denied downgrades to an empty list, not an error.
    Mock::given(method("GET"))
        .and(path("/apis/nimbus/v1/namespaces/team-a/credentials"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    mount_empty(&server, "/apis/nimbus/v1/namespaces/team-a/sshkeys").await;
    mount_empty(&server, "/apis/nimbus/v1/namespaces/team-a/proxies").await;
    mount_empty(&server, "/apis/nimbus/v1/namespaces/team-a/licenses").await;

    let manager = SyncManager::new(
        Arc::new(HttpEntityClient::new().unwrap()),
        Arc::new(HttpAuthConnector::new().unwrap()),
        SyncSettings::default(),
    );
    manager.update_clouds(vec![seed_cloud(&server.uri(), "stale")]).await;

    let catalog = manager.catalog();
    wait_for(|| !catalog.is_empty()).await;

    let clusters = catalog.of_kind(ResourceKind::Cluster);
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].uid, "c-1");
    assert_eq!(clusters[0].cloud_name, "integration");
    assert_eq!(clusters[0].namespace, "team-a");

    let snapshots = manager.cloud_snapshots().await;
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].access_token(), Some("fresh"));
    assert_eq!(snapshots[0].refresh_token(), Some("r-2"));
    assert!(snapshots[0].connect_error.is_none());

    let data_cloud = manager.data_cloud(&server.uri()).await.unwrap();
    assert!(data_cloud.error().await.is_none(), "403 must not surface as an error");

    manager.shutdown().await;
}

/// A namespace-discovery outage flips the error on but keeps the data
/// from the last good cycle.
#[tokio::test(flavor = "multi_thread")]
async fn discovery_outage_keeps_stale_namespaces() {
    let server = MockServer::start().await;
    mount_capabilities(&server).await;

    Mock::given(method("GET"))
        .and(path("/apis/nimbus/v1/namespaces"))
        .respond_with(ResponseTemplate::new(200).set_body_json(namespace_body(&["team-a"])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/apis/nimbus/v1/namespaces"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(serde_json::json!({ "message": "etcd unavailable" })),
        )
        .mount(&server)
        .await;
    mount_empty(&server, "/apis/nimbus/v1/namespaces/team-a/clusters").await;
    mount_empty(&server, "/apis/nimbus/v1/namespaces/team-a/credentials").await;
    mount_empty(&server, "/apis/nimbus/v1/namespaces/team-a/sshkeys").await;
    mount_empty(&server, "/apis/nimbus/v1/namespaces/team-a/proxies").await;
    mount_empty(&server, "/apis/nimbus/v1/namespaces/team-a/licenses").await;

    let data_cloud = DataCloud::new(
        seed_cloud(&server.uri(), "token"),
        Arc::new(HttpEntityClient::new().unwrap()),
        Arc::new(HttpAuthConnector::new().unwrap()),
        SyncSettings::default(),
    );

    data_cloud.fetch_data().await;
    assert!(data_cloud.loaded().await);
    assert_eq!(data_cloud.namespaces().await.len(), 1);
    assert!(data_cloud.error().await.is_none());

    data_cloud.fetch_data().await;
    assert!(data_cloud.loaded().await, "loaded never flips back");
    assert_eq!(data_cloud.namespaces().await.len(), 1, "stale namespaces survive the outage");
    let error = data_cloud.error().await.unwrap();
    assert!(error.contains("etcd unavailable"));
}

/// Removing a cloud from the desired set scrubs its entities while the
/// other cloud's slice is untouched.
#[tokio::test(flavor = "multi_thread")]
async fn removed_cloud_is_scrubbed_without_touching_others() {
    let one = MockServer::start().await;
    let two = MockServer::start().await;
    for server in [&one, &two] {
        mount_capabilities(server).await;
        Mock::given(method("GET"))
            .and(path("/apis/nimbus/v1/namespaces"))
            .respond_with(ResponseTemplate::new(200).set_body_json(namespace_body(&["team-a"])))
            .mount(server)
            .await;
        mount_empty(server, "/apis/nimbus/v1/namespaces/team-a/credentials").await;
        mount_empty(server, "/apis/nimbus/v1/namespaces/team-a/sshkeys").await;
        mount_empty(server, "/apis/nimbus/v1/namespaces/team-a/proxies").await;
        mount_empty(server, "/apis/nimbus/v1/namespaces/team-a/licenses").await;
    }
    Mock::given(method("GET"))
        .and(path("/apis/nimbus/v1/namespaces/team-a/clusters"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(cluster_body("team-a", "c-one", "alpha")),
        )
        .mount(&one)
        .await;
    Mock::given(method("GET"))
        .and(path("/apis/nimbus/v1/namespaces/team-a/clusters"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(cluster_body("team-a", "c-two", "beta")),
        )
        .mount(&two)
        .await;

    let manager = SyncManager::new(
        Arc::new(HttpEntityClient::new().unwrap()),
        Arc::new(HttpAuthConnector::new().unwrap()),
        SyncSettings::default(),
    );
    manager
        .update_clouds(vec![seed_cloud(&one.uri(), "token"), seed_cloud(&two.uri(), "token")])
        .await;

    let catalog: Arc<Catalog> = manager.catalog();
    wait_for(|| catalog.of_kind(ResourceKind::Cluster).len() == 2).await;

    manager.update_clouds(vec![seed_cloud(&two.uri(), "token")]).await;

    let clusters = catalog.of_kind(ResourceKind::Cluster);
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].uid, "c-two");

    manager.shutdown().await;
}
