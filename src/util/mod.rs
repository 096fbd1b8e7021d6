//! Utility functions for common operations.
//!
//! - **Markup stripping**: regex-equivalent `<...>` tag removal for post summaries
//! - **Truncation**: character-based caps with no ellipsis
//! - **Terminal safety**: control-character stripping before printing feed text
//!
//! # Examples
//!
//! ```
//! use hatena_blog_mcp::util::{strip_html_tags, truncate_chars};
//!
//! let summary = strip_html_tags("<p>Hello <b>World</b></p>");
//! assert_eq!(truncate_chars(&summary, 5), "Hello");
//! ```

mod text;

pub use text::{strip_control_chars, strip_html_tags, truncate_chars};
