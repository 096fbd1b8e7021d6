use super::xml::{parse_document, XmlElement, XmlError};

/// A parsed feed, resolved once into the shape its entries came from.
///
/// RSS documents contribute `rss > channel[0] > item*`, Atom documents
/// contribute `feed > entry*`. Anything else (an unrecognised root, a channel
/// without items, a feed without entries) is [`FeedDocument::Empty`], which
/// normalizes to no posts rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedDocument {
    Rss { items: Vec<XmlElement> },
    Atom { entries: Vec<XmlElement> },
    Empty,
}

impl FeedDocument {
    /// Parses feed XML text and selects the entry list.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError`] only when the text is not well-formed XML. A
    /// well-formed document of an unexpected shape is `Ok(FeedDocument::Empty)`.
    pub fn parse(content: &str) -> Result<Self, XmlError> {
        let root = parse_document(content)?;
        Ok(Self::from_root(root))
    }

    /// Selects the entry list from an already parsed root element.
    ///
    /// Only the first `<channel>` of an RSS document is considered.
    pub fn from_root(mut root: XmlElement) -> Self {
        let root_name = root.name().to_owned();
        match root_name.as_str() {
            "rss" => {
                let Some(mut channel) = root.take_children_named("channel").into_iter().next()
                else {
                    return FeedDocument::Empty;
                };
                let items = channel.take_children_named("item");
                if items.is_empty() {
                    FeedDocument::Empty
                } else {
                    FeedDocument::Rss { items }
                }
            }
            "feed" => {
                let entries = root.take_children_named("entry");
                if entries.is_empty() {
                    FeedDocument::Empty
                } else {
                    FeedDocument::Atom { entries }
                }
            }
            other => {
                tracing::debug!(root = %other, "Unrecognized feed root element, treating as empty");
                FeedDocument::Empty
            }
        }
    }

    /// Raw entries in feed order.
    pub fn entries(&self) -> &[XmlElement] {
        match self {
            FeedDocument::Rss { items } => items,
            FeedDocument::Atom { entries } => entries,
            FeedDocument::Empty => &[],
        }
    }

    /// Whether the entries came from an Atom feed.
    pub fn is_atom(&self) -> bool {
        matches!(self, FeedDocument::Atom { .. })
    }
}
