use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::client::{ClientError, HatenaBlogClient, DEFAULT_LIMIT};
use crate::feed::Post;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    /// A client operation failed; `operation` names which one.
    #[error("{operation}: {source}")]
    Operation {
        operation: &'static str,
        #[source]
        source: ClientError,
    },
}

fn failed(operation: &'static str) -> impl FnOnce(ClientError) -> ToolError {
    move |source| ToolError::Operation { operation, source }
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    keyword: String,
    #[serde(default)]
    limit: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RecentArgs {
    #[serde(default)]
    limit: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct UrlArgs {
    url: String,
}

fn parse_args<T: DeserializeOwned>(arguments: &Value) -> Result<T, ToolError> {
    // Absent arguments behave like an empty object
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// Resolves a tool's `limit` argument.
///
/// Missing, null, `false`, zero and empty-string limits mean the default.
/// Floats and numeric strings are accepted and truncated toward zero.
fn effective_limit(limit: Option<&Value>) -> Result<usize, ToolError> {
    let invalid = |value: &Value| ToolError::InvalidArguments(format!("invalid limit: {value}"));

    let Some(value) = limit else {
        return Ok(DEFAULT_LIMIT);
    };
    let n = match value {
        Value::Null | Value::Bool(false) => return Ok(DEFAULT_LIMIT),
        Value::String(s) if s.trim().is_empty() => return Ok(DEFAULT_LIMIT),
        Value::Number(n) => n.as_f64().ok_or_else(|| invalid(value))?,
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| invalid(value))?,
        _ => return Err(invalid(value)),
    };

    if n.is_nan() || n == 0.0 {
        return Ok(DEFAULT_LIMIT);
    }
    if n < 0.0 {
        return Err(invalid(value));
    }
    // Float-to-int casts saturate, so huge values mean "everything"
    Ok(n.trunc() as usize)
}

/// Runs a named tool and renders its result as text.
pub async fn call_tool(
    client: &HatenaBlogClient,
    name: &str,
    arguments: &Value,
) -> Result<String, ToolError> {
    tracing::debug!(tool = %name, "Dispatching tool call");

    match name {
        "search_blog" => {
            let args: SearchArgs = parse_args(arguments)?;
            let limit = effective_limit(args.limit.as_ref())?;
            let posts = client
                .search(&args.keyword, limit)
                .await
                .map_err(failed("Search failed"))?;
            Ok(format_search_results(&args.keyword, &posts))
        }
        "get_recent_posts" => {
            let args: RecentArgs = parse_args(arguments)?;
            let limit = effective_limit(args.limit.as_ref())?;
            let posts = client
                .list_recent(limit)
                .await
                .map_err(failed("Failed to get recent posts"))?;
            Ok(format_recent_posts(&posts))
        }
        "get_post_by_url" => {
            let args: UrlArgs = parse_args(arguments)?;
            let post = client
                .get_by_url(&args.url)
                .await
                .map_err(failed("Failed to get post by URL"))?;
            Ok(format_post_detail(&post))
        }
        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}

fn format_post_list(posts: &[Post]) -> String {
    posts
        .iter()
        .enumerate()
        .map(|(i, post)| {
            format!(
                "{}. **{}**\n   URL: {}\n   Published: {}\n   Summary: {}\n   Categories: {}\n",
                i + 1,
                post.title,
                post.link,
                post.published,
                post.summary,
                post.categories.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_search_results(keyword: &str, posts: &[Post]) -> String {
    format!(
        "Found {} posts matching \"{}\":\n\n{}",
        posts.len(),
        keyword,
        format_post_list(posts)
    )
}

pub fn format_recent_posts(posts: &[Post]) -> String {
    format!("Recent {} posts:\n\n{}", posts.len(), format_post_list(posts))
}

pub fn format_post_detail(post: &Post) -> String {
    format!(
        "**{}**\n\nURL: {}\nPublished: {}\nUpdated: {}\nCategories: {}\n\nContent:\n{}",
        post.title,
        post.link,
        post.published,
        post.updated,
        post.categories.join(", "),
        post.content
    )
}
