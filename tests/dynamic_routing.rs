//! End-to-end tests for the dynamic configuration pipeline: provider
//! messages in, routed traffic out, with no restart in between.

use std::time::Duration;

use switchyard::config::dynamic::{Configuration, Frontend, MatchRule};

mod common;
use common::{
    host_route, http_client, prefix_route, raw_get, spawn_proxy, start_mock_backend, ProxyOptions,
};

#[tokio::test]
async fn test_empty_start_returns_404() {
    let proxy = spawn_proxy(ProxyOptions::default()).await;

    // No discovery data has arrived: every request is a routing miss.
    let response = http_client().get(proxy.url("/")).send().await.unwrap();
    assert_eq!(response.status(), 404);

    let response = http_client().get(proxy.url("/anything")).send().await.unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_register_then_deregister_service() {
    let proxy = spawn_proxy(ProxyOptions::default()).await;
    let backend = start_mock_backend("hello from test").await;

    // Service appears in the discovery backend.
    proxy
        .push("catalog", host_route("test.switchyard.local", &[backend]))
        .await;
    proxy.wait_for_generation(1).await;

    let (status, body) = raw_get(proxy.addr, "test.switchyard.local", "/").await;
    assert_eq!(status, 200);
    assert_eq!(body, "hello from test");

    // Another host does not match it.
    let (status, _) = raw_get(proxy.addr, "other.switchyard.local", "/").await;
    assert_eq!(status, 404);

    // Service deregisters: the provider's view becomes empty.
    proxy.push("catalog", Configuration::default()).await;
    proxy.wait_for_generation(2).await;

    let (status, _) = raw_get(proxy.addr, "test.switchyard.local", "/").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_reload_reroutes_without_restart() {
    let proxy = spawn_proxy(ProxyOptions::default()).await;
    let alpha = start_mock_backend("alpha").await;
    let beta = start_mock_backend("beta").await;

    proxy.push("catalog", prefix_route("/", &[alpha])).await;
    proxy.wait_for_generation(1).await;
    let response = http_client().get(proxy.url("/")).send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "alpha");

    // The discovery backend moves the service; traffic follows within the
    // debounce window, on the same listener.
    proxy.push("catalog", prefix_route("/", &[beta])).await;
    proxy.wait_for_generation(2).await;
    let response = http_client().get(proxy.url("/")).send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "beta");
}

#[tokio::test]
async fn test_rejected_update_keeps_serving() {
    let proxy = spawn_proxy(ProxyOptions::default()).await;
    let backend = start_mock_backend("steady").await;

    proxy.push("catalog", prefix_route("/", &[backend])).await;
    proxy.wait_for_generation(1).await;

    // A frontend pointing at a backend that does not exist: the whole
    // snapshot must be rejected, and the old table keeps serving.
    let mut broken = Configuration::default();
    broken.frontends.insert(
        "web".to_string(),
        Frontend {
            entry_points: vec![],
            backend: "nowhere".to_string(),
            priority: 0,
            rule: MatchRule::PathPrefix {
                prefix: "/".to_string(),
            },
        },
    );
    proxy.push("catalog", broken).await;
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(proxy.switch.generation(), 1, "bad snapshot must not publish");
    let response = http_client().get(proxy.url("/")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "steady");
}

#[tokio::test]
async fn test_overlapping_prefixes_prefer_more_specific() {
    let proxy = spawn_proxy(ProxyOptions::default()).await;
    let site = start_mock_backend("site").await;
    let api = start_mock_backend("api").await;

    let mut config = prefix_route("/", &[site]);
    let api_config = prefix_route("/api", &[api]);
    config.frontends.insert(
        "api".to_string(),
        Frontend {
            backend: "api_pool".to_string(),
            ..api_config.frontends["web"].clone()
        },
    );
    config
        .backends
        .insert("api_pool".to_string(), api_config.backends["pool"].clone());

    proxy.push("catalog", config).await;
    proxy.wait_for_generation(1).await;

    let client = http_client();
    let body = client.get(proxy.url("/api/v1/users")).send().await.unwrap();
    assert_eq!(body.text().await.unwrap(), "api");
    let body = client.get(proxy.url("/index.html")).send().await.unwrap();
    assert_eq!(body.text().await.unwrap(), "site");
}

#[tokio::test]
async fn test_burst_of_updates_publishes_once() {
    let proxy = spawn_proxy(ProxyOptions {
        debounce_ms: 300,
        ..Default::default()
    })
    .await;
    let backend = start_mock_backend("settled").await;

    // A flapping provider: five updates inside one debounce window.
    for _ in 0..5 {
        proxy.push("catalog", prefix_route("/", &[backend])).await;
    }
    proxy.wait_for_generation(1).await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(proxy.switch.generation(), 1, "burst must coalesce");
    let response = http_client().get(proxy.url("/")).send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "settled");
}
