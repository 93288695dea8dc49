//! End-to-end test over a real socket.

use std::net::SocketAddr;
use std::sync::Arc;

use cartsync_server::config::Config;
use cartsync_server::db::MemoryPurchaseStore;
use cartsync_server::{build_app, AppState};
use serde_json::{json, Value};

#[tokio::test]
async fn test_sync_over_http_records_peer_address() {
    let store = Arc::new(MemoryPurchaseStore::new());
    let app = build_app(AppState::new(store.clone(), Config::default()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{}/api/cart/sync", addr))
        .header("user-agent", "sw-test/2.0")
        .json(&json!({"items": [
            {"userId": "u1", "items": [{"price": 20}, {"price": 5}], "id": "q1"},
            {"userId": "", "items": [{"price": 1}], "id": "q2"}
        ]}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["processedCount"], 1);
    assert_eq!(body["totalReceived"], 2);

    let stored = store.records_for_user("u1");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].metadata.client_ip, "127.0.0.1");
    assert_eq!(stored[0].metadata.user_agent, "sw-test/2.0");
    assert_eq!(stored[0].metadata.queue_id, "q1");
}
