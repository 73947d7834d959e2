mod common;

use ad_click_tracker::api::routes::ad_routes;
use axum_test::TestServer;
use serde_json::json;
use std::sync::atomic::Ordering;

fn server(ctx: &common::TestContext) -> TestServer {
    let app = ad_routes()
        .layer(common::MockConnectInfoLayer)
        .with_state(ctx.state.clone());
    TestServer::new(app).unwrap()
}

#[tokio::test]
async fn test_list_ads() {
    let ctx = common::create_test_context(&["1", "2"]);
    let server = server(&ctx);

    let response = server.get("/ads").await;

    response.assert_status_ok();
    let ads = response.json::<serde_json::Value>();
    assert_eq!(ads.as_array().unwrap().len(), 2);
    assert_eq!(ads[0]["id"], "1");
    assert_eq!(ads[0]["image_url"], "https://cdn.example/1.png");
    assert_eq!(ads[0]["target_url"], "https://shop.example/1");
}

#[tokio::test]
async fn test_list_ads_database_down() {
    let ctx = common::create_test_context(&["1"]);
    ctx.ads.down.store(true, Ordering::SeqCst);
    let server = server(&ctx);

    let response = server.get("/ads").await;

    assert_eq!(response.status_code(), 503);
}

#[tokio::test]
async fn test_analytics_requires_ad_id() {
    let ctx = common::create_test_context(&["1"]);
    let server = server(&ctx);

    let missing = server.get("/ads/analytics").await;
    assert_eq!(missing.status_code(), 400);

    let empty = server.get("/ads/analytics").add_query_param("ad_id", "").await;
    assert_eq!(empty.status_code(), 400);
    let body = empty.json::<serde_json::Value>();
    assert_eq!(body["error"]["message"], "missing advertisement id");
}

#[tokio::test]
async fn test_analytics_unknown_ad_is_zero() {
    let ctx = common::create_test_context(&["1"]);
    let server = server(&ctx);

    let response = server
        .get("/ads/analytics")
        .add_query_param("ad_id", "never-clicked")
        .await;

    response.assert_status_ok();
    response.assert_json(&json!({ "ad_id": "never-clicked", "click_count": 0 }));
}

#[tokio::test]
async fn test_analytics_counts_recorded_clicks() {
    let ctx = common::create_test_context(&["1"]);
    let server = server(&ctx);

    for secs in [1, 2, 3] {
        server
            .post("/ads/click")
            .json(&json!({ "ad_id": "1", "playback_time": secs }))
            .await
            .assert_status_ok();
    }

    let response = server
        .get("/ads/analytics")
        .add_query_param("ad_id", "1")
        .await;

    response.assert_json(&json!({ "ad_id": "1", "click_count": 3 }));
}
