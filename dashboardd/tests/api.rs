//! End-to-end tests driving the dashboard router over HTTP, with mock
//! upstream servers standing in for the node API and the market-data API.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::Json as AxumJson;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;

use dashboardd::api::routes::{self, AppState};
use dashboardd::discovery::DiscoveryClient;
use dashboardd::help::HelpCenter;
use dashboardd::price::{MarketClient, PriceCache};
use dashboardd::store::{NewNode, NodeStore};

/// Counters and captures shared with the mock node API handlers.
#[derive(Default)]
struct MockNode {
    auth_calls: AtomicUsize,
    service_payload: Mutex<Option<Value>>,
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// A mock node management API covering everything the aggregate view calls.
async fn spawn_node_mock(mock: Arc<MockNode>) -> SocketAddr {
    let auth = mock.clone();
    let services = mock.clone();

    let routes = Router::new()
        .route(
            "/auth/authenticate",
            post(move |AxumJson(body): AxumJson<Value>| {
                let auth = auth.clone();
                async move {
                    auth.auth_calls.fetch_add(1, Ordering::SeqCst);
                    if body["username"] == "myst" && body["password"] == "hunter2" {
                        Json(json!({ "token": "tok-1" })).into_response()
                    } else {
                        StatusCode::UNAUTHORIZED.into_response()
                    }
                }
            }),
        )
        .route(
            "/healthcheck",
            get(|| async { Json(json!({ "status": "ok", "uptime": "26h31m12s" })) }),
        )
        .route(
            "/sessions/stats-aggregated",
            get(|| async { Json(json!({ "stats": { "count": 12, "sum_tokens": 42 } })) }),
        )
        .route(
            "/sessions/stats-daily",
            get(|| async { Json(json!({ "items": {} })) }),
        )
        .route("/sessions", get(|| async { Json(json!({ "items": [] })) }))
        .route(
            "/identities",
            get(|| async {
                Json(json!({
                    "identities": [
                        { "id": "0xid1", "registration_status": "Registered" }
                    ]
                }))
            }),
        )
        .route(
            "/services",
            get(|| async { Json(json!([])) }).post(move |AxumJson(body): AxumJson<Value>| {
                let services = services.clone();
                async move {
                    *services.service_payload.lock().unwrap() = Some(body);
                    Json(json!({ "id": "svc-1", "status": "Running" }))
                }
            }),
        )
        .route(
            "/nat/type",
            get(|| async { Json(json!({ "type": "full_cone" })) }),
        )
        .route("/proposals", get(|| async { Json(json!([])) }))
        .route(
            "/node/monitoring-status",
            get(|| async { Json(json!({ "status": "monitored" })) }),
        );

    spawn(Router::new().nest("/tequilapi", routes)).await
}

struct TestApp {
    base: String,
    client: reqwest::Client,
    store: Arc<NodeStore>,
    _store_dir: TempDir,
    help_dir: TempDir,
}

async fn spawn_app(market: Option<Router>) -> TestApp {
    let store_dir = TempDir::new().unwrap();
    let help_dir = TempDir::new().unwrap();
    let store = Arc::new(NodeStore::open(store_dir.path().join("nodes.json")).unwrap());

    let market_base = match market {
        Some(router) => {
            let addr = spawn(router).await;
            format!("http://{addr}")
        }
        // Unreachable default; price tests supply their own mock.
        None => "http://127.0.0.1:9".to_string(),
    };

    let http = reqwest::Client::new();
    let state = AppState {
        store: store.clone(),
        http: http.clone(),
        price_cache: Arc::new(PriceCache::new(Duration::from_secs(600))),
        market: Arc::new(MarketClient::new(http.clone(), market_base)),
        // Unreachable on purpose: discovery must degrade, not fail.
        discovery: Arc::new(DiscoveryClient::new(
            http,
            "http://127.0.0.1:9".to_string(),
            Duration::from_secs(1),
        )),
        help: Arc::new(HelpCenter::new(help_dir.path())),
    };

    let addr = spawn(routes::router(state)).await;
    TestApp {
        base: format!("http://{addr}"),
        client: reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap(),
        store,
        _store_dir: store_dir,
        help_dir,
    }
}

fn seed_node(app: &TestApp, name: &str, addr: SocketAddr) -> u32 {
    app.store
        .add(NewNode {
            name: name.to_string(),
            address: addr.ip().to_string(),
            port: addr.port(),
            token: Some("tok-1".to_string()),
        })
        .unwrap()
        .id
}

#[tokio::test]
async fn add_node_authenticates_and_persists() {
    let mock = Arc::new(MockNode::default());
    let node_addr = spawn_node_mock(mock.clone()).await;
    let app = spawn_app(None).await;

    let address = node_addr.ip().to_string();
    let port = node_addr.port().to_string();
    let resp = app
        .client
        .post(format!("{}/add_node", app.base))
        .form(&[
            ("name", "node-a"),
            ("address", address.as_str()),
            ("port", port.as_str()),
            ("password", "hunter2"),
        ])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let location = resp.headers()["location"].to_str().unwrap().to_string();
    assert!(location.contains("Node%20node-a%20added"), "{location}");

    let nodes = app.store.list();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].id, 1);
    assert_eq!(nodes[0].token.as_deref(), Some("tok-1"));
    assert_eq!(mock.auth_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn duplicate_name_is_rejected_before_any_remote_call() {
    let mock = Arc::new(MockNode::default());
    let node_addr = spawn_node_mock(mock.clone()).await;
    let app = spawn_app(None).await;
    seed_node(&app, "node-a", node_addr);

    let address = node_addr.ip().to_string();
    let port = node_addr.port().to_string();
    let resp = app
        .client
        .post(format!("{}/add_node", app.base))
        .form(&[
            ("name", "node-a"),
            ("address", address.as_str()),
            ("port", port.as_str()),
            ("password", "hunter2"),
        ])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let location = resp.headers()["location"].to_str().unwrap();
    assert!(location.contains("already%20exists"));
    assert_eq!(
        mock.auth_calls.load(Ordering::SeqCst),
        0,
        "no remote call may precede the duplicate check"
    );
    assert_eq!(app.store.list().len(), 1);
}

#[tokio::test]
async fn node_data_aggregates_and_degrades_enrichment() {
    let mock = Arc::new(MockNode::default());
    let node_addr = spawn_node_mock(mock).await;
    let app = spawn_app(None).await;
    let id = seed_node(&app, "node-a", node_addr);

    let resp = app
        .client
        .get(format!("{}/node/{id}/data", app.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["health"]["status"], "ok");
    assert_eq!(body["stats"]["stats"]["count"], 12);
    assert_eq!(body["identities"]["identities"][0]["id"], "0xid1");
    assert_eq!(body["nat_info"], json!({ "type": "full_cone", "status": "finished" }));
    assert_eq!(body["monitoring_status"]["status"], "monitored");
    // Discovery is unreachable in this setup: metrics degrade to absent.
    assert_eq!(body["quality_metrics"], Value::Null);
    assert_eq!(body["location_info"], Value::Null);
}

#[tokio::test]
async fn unknown_node_is_a_json_404() {
    let app = spawn_app(None).await;

    let resp = app
        .client
        .get(format!("{}/node/99/data", app.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Node 99 not found");
}

fn market_mock(calls: Arc<AtomicUsize>) -> Router {
    Router::new().route(
        "/v2/cryptocurrency/quotes/latest",
        get(move || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Json(json!({
                    "data": {
                        "3361": {
                            "name": "Mysterium",
                            "symbol": "MYST",
                            "max_supply": null,
                            "circulating_supply": 25000000.0,
                            "total_supply": 30000000.0,
                            "quote": {
                                "USD": {
                                    "price": 0.25,
                                    "percent_change_1h": 0.1,
                                    "percent_change_24h": -1.2,
                                    "percent_change_7d": 3.4,
                                    "percent_change_30d": -5.6,
                                    "volume_24h": 1000000.0,
                                    "volume_change_24h": 2.0,
                                    "market_cap": 9000000.0,
                                    "fully_diluted_market_cap": 12000000.0,
                                    "last_updated": "2023-11-14T22:13:20Z"
                                }
                            }
                        }
                    }
                }))
            }
        }),
    )
}

#[tokio::test]
async fn price_is_cached_across_calls() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = spawn_app(Some(market_mock(calls.clone()))).await;

    // With nothing cached, a missing key is rejected.
    let resp = app
        .client
        .get(format!("{}/api/myst-price", app.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let first = app
        .client
        .get(format!("{}/api/myst-price?api_key=k1", app.base))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first: Value = first.json().await.unwrap();
    assert_eq!(first["symbol"], "MYST");

    // Second call inside the ttl: identical payload, no second fetch,
    // and the key is not consulted at all.
    let second: Value = app
        .client
        .get(format!("{}/api/myst-price", app.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn both_service_routes_normalize_to_one_wire_shape() {
    let mock = Arc::new(MockNode::default());
    let node_addr = spawn_node_mock(mock.clone()).await;
    let app = spawn_app(None).await;
    let id = seed_node(&app, "node-a", node_addr);

    // The start-service route takes `type`; provider comes from identities.
    let resp = app
        .client
        .post(format!("{}/node/{id}/start_service", app.base))
        .json(&json!({ "type": "wireguard" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        mock.service_payload.lock().unwrap().take().unwrap(),
        json!({ "provider_id": "0xid1", "type": "wireguard" })
    );

    // The create-service route takes `service_type`.
    let resp = app
        .client
        .post(format!("{}/node/{id}/services", app.base))
        .json(&json!({ "service_type": "wireguard", "provider_id": "0xexplicit" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        mock.service_payload.lock().unwrap().take().unwrap(),
        json!({ "provider_id": "0xexplicit", "type": "wireguard" })
    );

    // Missing type is rejected up front.
    let resp = app
        .client
        .post(format!("{}/node/{id}/start_service", app.base))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn removing_a_node_leaves_the_rest_untouched() {
    let mock = Arc::new(MockNode::default());
    let node_addr = spawn_node_mock(mock).await;
    let app = spawn_app(None).await;
    for name in ["a", "b", "c"] {
        seed_node(&app, name, node_addr);
    }

    let resp = app
        .client
        .post(format!("{}/remove_node/2", app.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let ids: Vec<u32> = app.store.list().into_iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![1, 3]);
}

#[tokio::test]
async fn credentials_update_replaces_the_stored_token() {
    let mock = Arc::new(MockNode::default());
    let node_addr = spawn_node_mock(mock).await;
    let app = spawn_app(None).await;
    let id = app
        .store
        .add(NewNode {
            name: "node-a".to_string(),
            address: node_addr.ip().to_string(),
            port: node_addr.port(),
            token: Some("stale".to_string()),
        })
        .unwrap()
        .id;

    let resp = app
        .client
        .post(format!("{}/node/{id}/credentials", app.base))
        .json(&json!({ "password": "hunter2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["token"], "tok-1");
    assert_eq!(app.store.get(id).unwrap().token.as_deref(), Some("tok-1"));

    // A wrong password surfaces as 401 and leaves the token alone.
    let resp = app
        .client
        .post(format!("{}/node/{id}/credentials", app.base))
        .json(&json!({ "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.store.get(id).unwrap().token.as_deref(), Some("tok-1"));
}

#[tokio::test]
async fn help_pages_render_from_descriptors() {
    let app = spawn_app(None).await;
    std::fs::write(
        app.help_dir.path().join("getting-started.yaml"),
        r#"
title: Getting started
description: First steps
sections:
  - heading: Adding a node
    content: |
      Enter the node address.
      Use the management password.
"#,
    )
    .unwrap();

    let index = app
        .client
        .get(format!("{}/help", app.base))
        .send()
        .await
        .unwrap();
    assert_eq!(index.status(), StatusCode::OK);
    let html = index.text().await.unwrap();
    assert!(html.contains("Getting started"));
    assert!(html.contains("/help/getting-started"));

    let topic = app
        .client
        .get(format!("{}/help/getting-started", app.base))
        .send()
        .await
        .unwrap();
    assert_eq!(topic.status(), StatusCode::OK);
    let html = topic.text().await.unwrap();
    assert!(html.contains("Adding a node"));
    assert!(html.contains("<br />"));

    let missing = app
        .client
        .get(format!("{}/help/nope", app.base))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn connection_stats_fall_back_to_zeros() {
    // Node endpoint reserved then closed: unreachable.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let node_addr = listener.local_addr().unwrap();
    drop(listener);

    let app = spawn_app(None).await;
    let id = seed_node(&app, "node-a", node_addr);

    let resp = app
        .client
        .get(format!("{}/node/{id}/connection_stats", app.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body,
        json!({ "bytesReceived": 0, "bytesSent": 0, "duration": 0, "tokensSpent": 0 })
    );
}
