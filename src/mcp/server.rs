use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::protocol::{
    initialize_result, tool_definitions, RpcRequest, RpcResponse, INTERNAL_ERROR,
    INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR,
};
use super::tools::call_tool;
use crate::client::HatenaBlogClient;

#[derive(Clone)]
struct AppState {
    client: Arc<HatenaBlogClient>,
}

/// Routes the MCP endpoint at `/` and `/api/mcp`, with permissive CORS.
pub fn router(client: Arc<HatenaBlogClient>) -> Router {
    let state = AppState { client };

    Router::new()
        .route("/", any(mcp_handler))
        .route("/api/mcp", any(mcp_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds `addr` and serves the MCP endpoint until the process exits.
pub async fn serve(client: Arc<HatenaBlogClient>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, feed = %client.feed_url(), "MCP server listening");
    axum::serve(listener, router(client)).await
}

async fn mcp_handler(State(state): State<AppState>, method: Method, body: Bytes) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }

    if method != Method::POST {
        return reply(
            StatusCode::METHOD_NOT_ALLOWED,
            RpcResponse::error(METHOD_NOT_FOUND, "Method not allowed", None),
        );
    }

    let request: RpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "Rejecting unparseable JSON-RPC body");
            return reply(
                StatusCode::BAD_REQUEST,
                RpcResponse::error(PARSE_ERROR, "Parse error", Some(json!(e.to_string()))),
            );
        }
    };

    let (status, response) = handle_request(&state.client, request).await;
    reply(status, response)
}

fn reply(status: StatusCode, response: RpcResponse) -> Response {
    (status, Json(response)).into_response()
}

/// Dispatches one JSON-RPC request to the feed client.
pub async fn handle_request(
    client: &HatenaBlogClient,
    request: RpcRequest,
) -> (StatusCode, RpcResponse) {
    let method = request.method.as_deref().unwrap_or("undefined");
    tracing::info!(method = %method, "MCP request");

    match method {
        "initialize" => (
            StatusCode::OK,
            RpcResponse::success(request.id, initialize_result()),
        ),
        "tools/list" => (
            StatusCode::OK,
            RpcResponse::success(request.id, json!({ "tools": tool_definitions() })),
        ),
        "tools/call" => {
            let params = request.params.as_ref();
            let Some(name) = params.and_then(|p| p.get("name")).and_then(Value::as_str) else {
                return (
                    StatusCode::BAD_REQUEST,
                    RpcResponse::error(INVALID_PARAMS, "Tool name is required", None),
                );
            };
            let arguments = params
                .and_then(|p| p.get("arguments"))
                .cloned()
                .unwrap_or(Value::Null);

            match call_tool(client, name, &arguments).await {
                Ok(text) => (
                    StatusCode::OK,
                    RpcResponse::success(
                        request.id,
                        json!({ "content": [{ "type": "text", "text": text }] }),
                    ),
                ),
                Err(e) => {
                    tracing::error!(tool = %name, error = %e, "Tool execution failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        RpcResponse::error(
                            INTERNAL_ERROR,
                            "Internal error",
                            Some(json!(format!("Tool execution failed: {e}"))),
                        ),
                    )
                }
            }
        }
        other => (
            StatusCode::BAD_REQUEST,
            RpcResponse::error(METHOD_NOT_FOUND, format!("Unknown method: {other}"), None),
        ),
    }
}
