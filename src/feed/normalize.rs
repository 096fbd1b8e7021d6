use serde::{Deserialize, Serialize};

use super::document::FeedDocument;
use super::xml::XmlElement;
use crate::util::{strip_html_tags, truncate_chars};

/// Maximum length of [`Post::summary`], in characters.
pub const SUMMARY_MAX_CHARS: usize = 500;

/// A feed entry normalized to one shape regardless of RSS or Atom origin.
///
/// Every field is always populated; a value missing from the source is an
/// empty string or an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub title: String,
    /// Canonical URL of the post.
    pub link: String,
    /// Source-native date string, not reinterpreted.
    pub published: String,
    pub updated: String,
    /// `content` with markup removed, capped at [`SUMMARY_MAX_CHARS`].
    pub summary: String,
    pub categories: Vec<String>,
    /// Raw summary text before markup removal.
    pub content: String,
}

impl Post {
    /// Case-insensitive substring match over title, summary and categories.
    ///
    /// `keyword_lower` must already be lowercased. An empty keyword matches
    /// every post.
    pub fn matches(&self, keyword_lower: &str) -> bool {
        let haystack = format!(
            "{} {} {}",
            self.title,
            self.summary,
            self.categories.join(" ")
        )
        .to_lowercase();
        haystack.contains(keyword_lower)
    }
}

/// Where a field value may come from within a raw entry.
#[derive(Debug, Clone, Copy)]
enum Candidate {
    /// Text content of the first child element with this name.
    Text(&'static str),
    /// Attribute of the first child element with this name.
    Attr {
        element: &'static str,
        attr: &'static str,
    },
}

impl Candidate {
    fn resolve(self, entry: &XmlElement) -> Option<&str> {
        let value = match self {
            Candidate::Text(element) => entry.child(element)?.text(),
            Candidate::Attr { element, attr } => entry.child(element)?.attr(attr)?,
        };
        (!value.is_empty()).then_some(value)
    }
}

const TITLE: &[Candidate] = &[Candidate::Text("title")];
const LINK: &[Candidate] = &[
    Candidate::Attr {
        element: "link",
        attr: "href",
    },
    Candidate::Text("link"),
];
const PUBLISHED: &[Candidate] = &[Candidate::Text("published"), Candidate::Text("dc:date")];
const UPDATED: &[Candidate] = &[Candidate::Text("updated"), Candidate::Text("dc:date")];
const BODY: &[Candidate] = &[Candidate::Text("summary"), Candidate::Text("content")];

/// First candidate yielding a non-empty value, else an empty string.
fn first_present(entry: &XmlElement, candidates: &[Candidate]) -> String {
    candidates
        .iter()
        .find_map(|c| c.resolve(entry))
        .unwrap_or_default()
        .to_string()
}

/// Category labels in source order: `term` attribute, else text; empties dropped.
fn categories(entry: &XmlElement) -> Vec<String> {
    entry
        .children_named("category")
        .filter_map(|category| {
            category
                .attr("term")
                .filter(|term| !term.is_empty())
                .or_else(|| Some(category.text()).filter(|text| !text.is_empty()))
        })
        .map(str::to_string)
        .collect()
}

/// Normalizes one raw `<item>` or `<entry>`.
pub fn extract_post(entry: &XmlElement) -> Post {
    let content = first_present(entry, BODY);
    let summary = truncate_chars(&strip_html_tags(&content), SUMMARY_MAX_CHARS).into_owned();

    Post {
        title: first_present(entry, TITLE),
        link: first_present(entry, LINK),
        published: first_present(entry, PUBLISHED),
        updated: first_present(entry, UPDATED),
        summary,
        categories: categories(entry),
        content,
    }
}

/// Normalizes every entry of a document, preserving feed order.
///
/// Pure: the same document always yields the same posts.
pub fn extract_posts(document: &FeedDocument) -> Vec<Post> {
    let posts: Vec<Post> = document.entries().iter().map(extract_post).collect();
    tracing::debug!(
        posts = posts.len(),
        atom = document.is_atom(),
        "Extracted posts from feed"
    );
    posts
}
