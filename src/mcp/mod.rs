//! MCP-style JSON-RPC endpoint over the feed client.
//!
//! A thin adapter: it parses requests, dispatches the three tools
//! (`search_blog`, `get_recent_posts`, `get_post_by_url`) to
//! [`HatenaBlogClient`](crate::HatenaBlogClient) and renders results as text.

mod protocol;
mod server;
mod tools;

pub use protocol::{
    initialize_result, tool_definitions, RpcErrorObject, RpcRequest, RpcResponse, INTERNAL_ERROR,
    INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION, SERVER_NAME,
};
pub use server::{handle_request, router, serve};
pub use tools::{
    call_tool, format_post_detail, format_recent_posts, format_search_results, ToolError,
};
