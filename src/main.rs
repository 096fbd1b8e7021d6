use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::ffi::OsString;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use hatena_blog_mcp::mcp::{format_post_detail, format_recent_posts, format_search_results};
use hatena_blog_mcp::util::strip_control_chars;
use hatena_blog_mcp::{mcp, Config, HatenaBlogClient, DEFAULT_LIMIT};

/// Default config file path (~/.config/hatena-blog-mcp/config.toml), if
/// there is a home directory to put it in.
fn default_config_path(home: Option<OsString>) -> Option<PathBuf> {
    let home = home.filter(|h| !h.is_empty())?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("hatena-blog-mcp")
            .join("config.toml"),
    )
}

#[derive(Parser, Debug)]
#[command(
    name = "hatena-blog-mcp",
    version,
    about = "Search a Hatena Blog feed, or serve it as MCP tools"
)]
struct Args {
    /// Config file (default: ~/.config/hatena-blog-mcp/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Blog identifier, overrides config and BLOG_ID
    #[arg(long, global = true)]
    blog_id: Option<String>,

    /// Cache duration in seconds, overrides config and CACHE_DURATION
    #[arg(long, value_name = "SECS", global = true)]
    cache_duration: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the JSON-RPC endpoint
    Serve {
        /// Address to bind, overrides config
        #[arg(long, value_name = "ADDR")]
        listen: Option<SocketAddr>,
    },
    /// Search posts by keyword
    Search {
        keyword: String,
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
    },
    /// List the most recent posts
    Recent {
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
    },
    /// Show one post by its exact URL
    Get { url: String },
}

fn load_config(args: &Args) -> Result<Config> {
    resolve_config(args, std::env::var_os("HOME"), |key| std::env::var(key).ok())
}

/// File, then environment, then flags.
fn resolve_config(
    args: &Args,
    home: Option<OsString>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config> {
    let path = args.config.clone().or_else(|| default_config_path(home));
    let mut config = match path {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => {
            tracing::debug!("No home directory and no --config, using default config");
            Config::default()
        }
    };

    config.apply_env_with(env);

    if let Some(blog_id) = &args.blog_id {
        config.blog_id = blog_id.clone();
    }
    if let Some(secs) = args.cache_duration {
        config.cache_duration = secs;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so command output stays pipeable
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let client = HatenaBlogClient::from_config(&config).context("Failed to create feed client")?;

    let output = match args.command {
        Command::Serve { listen } => {
            let addr = match listen {
                Some(addr) => addr,
                None => config
                    .listen_addr
                    .parse()
                    .with_context(|| format!("Invalid listen_addr: {}", config.listen_addr))?,
            };
            mcp::serve(Arc::new(client), addr)
                .await
                .context("MCP server failed")?;
            return Ok(());
        }
        Command::Search { keyword, limit } => {
            let posts = client.search(&keyword, limit).await?;
            format_search_results(&keyword, &posts)
        }
        Command::Recent { limit } => {
            let posts = client.list_recent(limit).await?;
            format_recent_posts(&posts)
        }
        Command::Get { url } => {
            let post = client.get_by_url(&url).await?;
            format_post_detail(&post)
        }
    };

    // SEC-001: feed text is remote input
    println!("{}", strip_control_chars(&output));
    Ok(())
}
