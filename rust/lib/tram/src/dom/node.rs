use std::fmt;
use std::sync::Arc;

use super::document::NodeId;

/// Callback attached to an element for one event kind.
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

/// An event delivered to element listeners by
/// [`Document::dispatch_event`](super::Document::dispatch_event).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Event kind without the `on` prefix, e.g. `click`.
    pub kind: String,
    /// Node the event was dispatched on.
    pub target: NodeId,
    /// Node whose listener is running; differs from `target` while bubbling.
    pub current_target: NodeId,
}

/// An event listener binding.
#[derive(Clone)]
pub struct Listener {
    pub event: String,
    pub handler: EventHandler,
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("event", &self.event).finish()
    }
}

impl PartialEq for Listener {
    /// Handlers are opaque; two bindings are equal when they listen to the
    /// same event.
    fn eq(&self, other: &Self) -> bool {
        self.event == other.event
    }
}

// ── Markup tree ─────────────────────────────────────────────────────

/// A node of a detached markup tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An element of a detached markup tree.
///
/// Attributes keep insertion order so serialization is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub listeners: Vec<Listener>,
    pub children: Vec<Node>,
}

/// What a page or template produces: a single element, or a primitive text
/// value when the template reduced to one text node.
#[derive(Debug, Clone, PartialEq)]
pub enum Renderable {
    Element(Element),
    Text(String),
}

/// Elements that never have children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Check whether `tag` is a void element.
pub fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

impl Element {
    /// Empty element.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Builder: set an attribute.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder: append a child.
    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }

    /// Builder: append a text child.
    pub fn text(self, text: impl Into<String>) -> Self {
        self.child(Node::Text(text.into()))
    }

    /// Builder: bind an event handler.
    pub fn on<F>(mut self, event: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.listeners.push(Listener {
            event: event.into(),
            handler: Arc::new(handler),
        });
        self
    }

    /// Read an attribute value.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, keeping its position if it already exists.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Concatenated text of all descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.collect_text(&mut out);
        }
        out
    }

    /// Serialize as HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    pub(crate) fn write_html(&self, out: &mut String) {
        write_open_tag(out, &self.tag, &self.attributes);
        if is_void(&self.tag) {
            return;
        }
        for child in &self.children {
            child.write_html(out);
        }
        write_close_tag(out, &self.tag);
    }
}

impl Node {
    /// Text node shorthand.
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    /// Serialize as HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                for child in &el.children {
                    child.collect_text(out);
                }
            }
        }
    }

    pub(crate) fn write_html(&self, out: &mut String) {
        match self {
            Node::Text(text) => escape_text(out, text),
            Node::Element(el) => el.write_html(out),
        }
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Node::Element(el)
    }
}

impl From<Renderable> for Node {
    fn from(r: Renderable) -> Self {
        match r {
            Renderable::Element(el) => Node::Element(el),
            Renderable::Text(text) => Node::Text(text),
        }
    }
}

impl Renderable {
    /// Primitive text shorthand.
    pub fn text(text: impl Into<String>) -> Self {
        Renderable::Text(text.into())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Renderable::Element(el) => Some(el),
            Renderable::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Renderable::Text(text) => Some(text),
            Renderable::Element(_) => None,
        }
    }

    pub fn text_content(&self) -> String {
        match self {
            Renderable::Element(el) => el.text_content(),
            Renderable::Text(text) => text.clone(),
        }
    }

    /// Serialize as HTML. Primitive text is escaped like a text node.
    pub fn to_html(&self) -> String {
        match self {
            Renderable::Element(el) => el.to_html(),
            Renderable::Text(text) => {
                let mut out = String::new();
                escape_text(&mut out, text);
                out
            }
        }
    }
}

impl From<Element> for Renderable {
    fn from(el: Element) -> Self {
        Renderable::Element(el)
    }
}

impl From<Node> for Renderable {
    fn from(node: Node) -> Self {
        match node {
            Node::Element(el) => Renderable::Element(el),
            Node::Text(text) => Renderable::Text(text),
        }
    }
}

// ── Serialization helpers ───────────────────────────────────────────

pub(crate) fn write_open_tag(out: &mut String, tag: &str, attributes: &[(String, String)]) {
    out.push('<');
    out.push_str(tag);
    for (name, value) in attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_attribute(out, value);
        out.push('"');
    }
    out.push('>');
}

pub(crate) fn write_close_tag(out: &mut String, tag: &str) {
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

pub(crate) fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

pub(crate) fn escape_attribute(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}
