use quick_xml::escape::resolve_html5_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// SEC-003: Maximum element nesting depth accepted from a feed document.
/// Prevents stack and memory blowups from maliciously nested XML.
const MAX_XML_DEPTH: usize = 256;

/// Errors produced while folding an XML document into an element tree.
#[derive(Debug, Error)]
pub enum XmlError {
    /// quick-xml rejected the input (bad syntax, mismatched end tag, bad escape).
    #[error("XML syntax error: {0}")]
    Syntax(String),
    /// The document ended while elements were still open.
    #[error("unclosed element <{0}>")]
    Unclosed(String),
    /// The document contains no element at all.
    #[error("document has no root element")]
    NoRoot,
    /// A second top-level element followed the root.
    #[error("document has more than one root element")]
    MultipleRoots,
    /// Non-whitespace text appeared outside the root element.
    #[error("text outside of the root element")]
    StrayText,
    /// SEC-003: Nesting exceeded [`MAX_XML_DEPTH`].
    #[error("XML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),
}

impl From<quick_xml::Error> for XmlError {
    fn from(e: quick_xml::Error) -> Self {
        XmlError::Syntax(e.to_string())
    }
}

/// One element of a parsed XML document.
///
/// Mirrors the source tag hierarchy: attributes are kept apart from the
/// element's own text, and child elements keep document order. Names are the
/// qualified names as written (`dc:date`, not a resolved namespace).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<XmlElement>,
}

impl XmlElement {
    fn from_start(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Self, XmlError> {
        let decoder = reader.decoder();
        let name = decoder
            .decode(e.name().as_ref())
            .map_err(|err| XmlError::Syntax(err.to_string()))?
            .into_owned();

        let mut attributes = Vec::new();
        for attr_result in e.attributes() {
            let attr = match attr_result {
                Ok(attr) => attr,
                Err(err) => {
                    tracing::warn!(element = %name, error = %err, "Skipping malformed XML attribute");
                    continue;
                }
            };
            let key = decoder
                .decode(attr.key.as_ref())
                .map_err(|err| XmlError::Syntax(err.to_string()))?
                .into_owned();
            let value = attr
                .decode_and_unescape_value_with(decoder, resolve_html5_entity)?
                .into_owned();
            attributes.push((key, value));
        }

        Ok(Self {
            name,
            attributes,
            text: String::new(),
            children: Vec::new(),
        })
    }

    /// Qualified tag name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of the named attribute, if present.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The element's own character data (text and CDATA, unescaped).
    ///
    /// Text belonging to child elements is not included. Whitespace-only
    /// content is reported as empty.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// First child element with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All child elements with the given name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Takes ownership of all children with the given name, in document order.
    pub(crate) fn take_children_named(&mut self, name: &str) -> Vec<XmlElement> {
        let (matching, rest) = std::mem::take(&mut self.children)
            .into_iter()
            .partition(|c| c.name == name);
        self.children = rest;
        matching
    }

    fn finish(mut self) -> Self {
        if self.text.trim().is_empty() {
            self.text.clear();
        }
        self
    }
}

/// Parses an XML document into its root [`XmlElement`].
///
/// Declarations, comments, processing instructions and the DOCTYPE are
/// skipped. Entity references resolve against the fixed HTML5 named-entity
/// table (a superset of the XML builtins) plus numeric character references.
/// Entities declared in a DTD are never expanded; see SEC-002 in `Cargo.toml`.
pub fn parse_document(content: &str) -> Result<XmlElement, XmlError> {
    let mut reader = Reader::from_str(content);
    let mut buf = Vec::new();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if root.is_some() && stack.is_empty() {
                    return Err(XmlError::MultipleRoots);
                }
                // SEC-003: Reject excessively nested documents
                if stack.len() >= MAX_XML_DEPTH {
                    return Err(XmlError::MaxDepthExceeded(MAX_XML_DEPTH));
                }
                stack.push(XmlElement::from_start(&e, &reader)?);
            }
            Ok(Event::Empty(e)) => {
                let element = XmlElement::from_start(&e, &reader)?.finish();
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(_)) => {
                // quick-xml verifies the end name against the open element
                let element = stack
                    .pop()
                    .ok_or_else(|| XmlError::Syntax("unexpected closing tag".to_string()))?
                    .finish();
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape_with(resolve_html5_entity)?;
                match stack.last_mut() {
                    Some(open) => open.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => return Err(XmlError::StrayText),
                }
            }
            Ok(Event::CData(e)) => {
                let bytes = e.into_inner();
                let text =
                    std::str::from_utf8(&bytes).map_err(|err| XmlError::Syntax(err.to_string()))?;
                match stack.last_mut() {
                    Some(open) => open.text.push_str(text),
                    None => return Err(XmlError::StrayText),
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.pop() {
        return Err(XmlError::Unclosed(open.name));
    }

    root.ok_or(XmlError::NoRoot)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_some() => Err(XmlError::MultipleRoots),
        None => {
            *root = Some(element);
            Ok(())
        }
    }
}
