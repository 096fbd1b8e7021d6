//! Integration tests for the JSON-RPC endpoint, driven through the router
//! without binding a socket.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use hatena_blog_mcp::{mcp, HatenaBlogClient};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

const FEED: &str = r#"<rss version="2.0"><channel>
  <item>
    <title>Rust Programming</title>
    <link>https://example.hatenablog.com/entry/1</link>
    <dc:date>2024-01-01T00:00:00+09:00</dc:date>
    <summary>&lt;p&gt;About traits&lt;/p&gt;</summary>
    <category>Rust</category>
    <category>Traits</category>
  </item>
  <item>
    <title>Coffee</title>
    <link>https://example.hatenablog.com/entry/2</link>
  </item>
</channel></rss>"#;

async fn app() -> (MockServer, axum::Router) {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
        .mount(&mock_server)
        .await;
    let client = HatenaBlogClient::with_feed_url(
        reqwest::Client::new(),
        format!("{}/rss", mock_server.uri()),
        Duration::from_secs(300),
    );
    (mock_server, mcp::router(Arc::new(client)))
}

async fn post_json(router: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn tool_text(body: &Value) -> &str {
    body["result"]["content"][0]["text"].as_str().unwrap()
}

#[tokio::test]
async fn test_initialize_echoes_id() {
    let (_server, router) = app().await;
    let (status, body) = post_json(
        router,
        "/api/mcp",
        json!({ "jsonrpc": "2.0", "id": 42, "method": "initialize" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 42);
    assert_eq!(body["result"]["protocolVersion"], "2024-11-05");
}

#[tokio::test]
async fn test_tools_list_on_root_path() {
    let (_server, router) = app().await;
    let (status, body) = post_json(
        router,
        "/",
        json!({ "jsonrpc": "2.0", "id": "x", "method": "tools/list" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["tools"][0]["name"], "search_blog");
}

#[tokio::test]
async fn test_search_tool_text() {
    let (_server, router) = app().await;
    let (status, body) = post_json(
        router,
        "/api/mcp",
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": "search_blog", "arguments": { "keyword": "TRAITS" } }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        tool_text(&body),
        "Found 1 posts matching \"TRAITS\":\n\n\
         1. **Rust Programming**\n   URL: https://example.hatenablog.com/entry/1\n   \
         Published: 2024-01-01T00:00:00+09:00\n   Summary: About traits\n   Categories: Rust, Traits\n"
    );
    assert_eq!(body["result"]["content"][0]["type"], "text");
}

#[tokio::test]
async fn test_float_limit_accepted() {
    let (_server, router) = app().await;
    let (status, body) = post_json(
        router,
        "/api/mcp",
        json!({
            "jsonrpc": "2.0",
            "id": 5,
            "method": "tools/call",
            "params": { "name": "get_recent_posts", "arguments": { "limit": 1.0 } }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(tool_text(&body).starts_with("Recent 1 posts:\n\n1. **Rust Programming**"));
}

#[tokio::test]
async fn test_get_post_by_url_tool_text() {
    let (_server, router) = app().await;
    let (_, body) = post_json(
        router,
        "/api/mcp",
        json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": {
                "name": "get_post_by_url",
                "arguments": { "url": "https://example.hatenablog.com/entry/1" }
            }
        }),
    )
    .await;

    assert_eq!(
        tool_text(&body),
        "**Rust Programming**\n\nURL: https://example.hatenablog.com/entry/1\n\
         Published: 2024-01-01T00:00:00+09:00\nUpdated: 2024-01-01T00:00:00+09:00\n\
         Categories: Rust, Traits\n\nContent:\n<p>About traits</p>"
    );
}

#[tokio::test]
async fn test_missing_post_is_internal_error() {
    let (_server, router) = app().await;
    let (status, body) = post_json(
        router,
        "/api/mcp",
        json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {
                "name": "get_post_by_url",
                "arguments": { "url": "https://example.hatenablog.com/entry/999" }
            }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["id"], Value::Null);
    assert_eq!(body["error"]["code"], -32603);
    assert_eq!(body["error"]["message"], "Internal error");
    assert_eq!(
        body["error"]["data"],
        "Tool execution failed: Failed to get post by URL: \
         Post not found: https://example.hatenablog.com/entry/999"
    );
}

#[tokio::test]
async fn test_unknown_method_is_bad_request() {
    let (_server, router) = app().await;
    let (status, body) = post_json(
        router,
        "/api/mcp",
        json!({ "jsonrpc": "2.0", "id": 4, "method": "prompts/list" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], -32601);
    assert_eq!(body["error"]["message"], "Unknown method: prompts/list");
}

#[tokio::test]
async fn test_invalid_json_is_parse_error() {
    let (_server, router) = app().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/mcp")
        .body(Body::from("{not json"))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], -32700);
}

#[tokio::test]
async fn test_get_is_method_not_allowed() {
    let (_server, router) = app().await;
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/mcp")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["message"], "Method not allowed");
}

#[tokio::test]
async fn test_cors_preflight() {
    let (_server, router) = app().await;
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/mcp")
        .header(header::ORIGIN, "https://claude.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn test_bare_options_is_ok() {
    let (_server, router) = app().await;
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
