//! Markup templates.
//!
//! A template is markup with `{}` placeholders, evaluated together with one
//! [`Slot`] per placeholder into a [`Renderable`]. Custom tag names resolve
//! against a [`Registry`] of components.
//!
//! ```ignore
//! let html = Tram::html(Some(Registry::new().with("greeting", |el| {
//!     html!(Html::default(), "<p>hello {}</p>", el.attribute("name"))
//! })));
//! let page = html!(html, "<main><greeting name={}></greeting></main>", "tram")?;
//! assert_eq!(page.to_html(), "<main><p>hello tram</p></main>");
//! ```
//!
//! Placeholders may stand for text, nodes or node lists in content, and
//! for text or an event handler in attribute values. `{{` and `}}` are
//! literal braces. Whitespace-only text containing a newline is dropped
//! between tags, and all whitespace-only text is dropped around the root.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::dom::{is_void, Element, Event, EventHandler, Listener, Node, Renderable};
use crate::error::{Result, TemplateError};

/// Internal marker standing in for a placeholder while parsing.
const SLOT: char = '\u{E000}';

/// A custom element: receives the element as written (attributes,
/// listeners, evaluated children) and renders its replacement.
pub type Component = Arc<dyn Fn(&Element) -> Result<Renderable> + Send + Sync>;

// ── Registry ────────────────────────────────────────────────────────

/// Named components available to a template.
#[derive(Clone, Default)]
pub struct Registry {
    components: HashMap<String, Component>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: register a component. Names are case-insensitive.
    pub fn with<F>(mut self, name: &str, component: F) -> Self
    where
        F: Fn(&Element) -> Result<Renderable> + Send + Sync + 'static,
    {
        self.register(name, component);
        self
    }

    /// Register a component, replacing any previous one with that name.
    pub fn register<F>(&mut self, name: &str, component: F)
    where
        F: Fn(&Element) -> Result<Renderable> + Send + Sync + 'static,
    {
        self.components
            .insert(name.to_ascii_lowercase(), Arc::new(component));
    }

    pub fn get(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.components.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Registry").field("components", &names).finish()
    }
}

// ── Slot ────────────────────────────────────────────────────────────

/// A value interpolated into a template placeholder.
#[derive(Clone)]
pub enum Slot {
    /// Renders nothing; as a whole attribute value, omits the attribute.
    Empty,
    Text(String),
    Node(Node),
    Nodes(Vec<Node>),
    /// Only valid as a whole attribute value; binds a listener.
    Handler(EventHandler),
}

impl Slot {
    /// Wrap a closure as an event handler slot.
    pub fn handler<F>(handler: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        Slot::Handler(Arc::new(handler))
    }

    fn describe(&self) -> &'static str {
        match self {
            Slot::Empty => "empty value",
            Slot::Text(_) => "text",
            Slot::Node(_) | Slot::Nodes(_) => "node",
            Slot::Handler(_) => "event handler",
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Empty => f.write_str("Empty"),
            Slot::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Slot::Node(node) => f.debug_tuple("Node").field(node).finish(),
            Slot::Nodes(nodes) => f.debug_tuple("Nodes").field(nodes).finish(),
            Slot::Handler(_) => f.write_str("Handler"),
        }
    }
}

impl From<&str> for Slot {
    fn from(s: &str) -> Self {
        Slot::Text(s.to_string())
    }
}

impl From<String> for Slot {
    fn from(s: String) -> Self {
        Slot::Text(s)
    }
}

impl From<&String> for Slot {
    fn from(s: &String) -> Self {
        Slot::Text(s.clone())
    }
}

macro_rules! slot_from_display {
    ($($t:ty),*) => {
        $(impl From<$t> for Slot {
            fn from(v: $t) -> Self {
                Slot::Text(v.to_string())
            }
        })*
    };
}

slot_from_display!(char, bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl From<&Value> for Slot {
    /// Strings interpolate raw, `null` renders nothing, everything else
    /// renders as JSON.
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => Slot::Empty,
            Value::String(s) => Slot::Text(s.clone()),
            other => Slot::Text(other.to_string()),
        }
    }
}

impl From<Value> for Slot {
    fn from(v: Value) -> Self {
        match v {
            Value::String(s) => Slot::Text(s),
            other => Slot::from(&other),
        }
    }
}

impl From<Node> for Slot {
    fn from(node: Node) -> Self {
        Slot::Node(node)
    }
}

impl From<Element> for Slot {
    fn from(el: Element) -> Self {
        Slot::Node(Node::Element(el))
    }
}

impl From<Renderable> for Slot {
    fn from(r: Renderable) -> Self {
        Slot::Node(r.into())
    }
}

impl From<Vec<Node>> for Slot {
    fn from(nodes: Vec<Node>) -> Self {
        Slot::Nodes(nodes)
    }
}

impl From<Vec<Element>> for Slot {
    fn from(els: Vec<Element>) -> Self {
        Slot::Nodes(els.into_iter().map(Node::Element).collect())
    }
}

impl From<EventHandler> for Slot {
    fn from(handler: EventHandler) -> Self {
        Slot::Handler(handler)
    }
}

impl<T: Into<Slot>> From<Option<T>> for Slot {
    fn from(v: Option<T>) -> Self {
        v.map_or(Slot::Empty, Into::into)
    }
}

// ── Html ────────────────────────────────────────────────────────────

/// Template evaluator bound to a component registry.
#[derive(Clone, Default, Debug)]
pub struct Html {
    registry: Arc<Registry>,
}

impl Html {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Evaluate `markup` with one slot per `{}` placeholder.
    ///
    /// The result is the single root element, or [`Renderable::Text`] when
    /// the template reduces to text (an empty template yields empty text).
    pub fn render(&self, markup: &str, slots: Vec<Slot>) -> Result<Renderable> {
        let (source, expected) = prepare(markup)?;
        if expected != slots.len() {
            return Err(TemplateError::SlotCount {
                expected,
                got: slots.len(),
            }
            .into());
        }

        let mut parser = Parser {
            src: &source,
            pos: 0,
            slots: slots.into_iter(),
            registry: &self.registry,
        };
        let mut roots: Vec<Node> = parser
            .parse_children(None)?
            .into_iter()
            .filter(|n| !matches!(n, Node::Text(t) if t.trim().is_empty()))
            .collect();

        match roots.len() {
            0 => Ok(Renderable::Text(String::new())),
            1 => Ok(roots.remove(0).into()),
            n => Err(TemplateError::RootCount(n).into()),
        }
    }
}

/// Replace placeholders with [`SLOT`] markers and unescape doubled braces.
///
/// The marker character itself is reserved and rejected in `markup`.
fn prepare(markup: &str) -> std::result::Result<(String, usize), TemplateError> {
    let mut out = String::with_capacity(markup.len());
    let mut count = 0;
    let mut chars = markup.char_indices().peekable();
    while let Some((offset, c)) = chars.next() {
        match (c, chars.peek().map(|(_, next)| *next)) {
            (SLOT, _) => {
                return Err(TemplateError::Syntax {
                    offset,
                    message: "reserved character U+E000 in markup".into(),
                });
            }
            ('{', Some('{')) | ('}', Some('}')) => {
                chars.next();
                out.push(c);
            }
            ('{', Some('}')) => {
                chars.next();
                out.push(SLOT);
                count += 1;
            }
            _ => out.push(c),
        }
    }
    Ok((out, count))
}

// ── Parser ──────────────────────────────────────────────────────────

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    slots: std::vec::IntoIter<Slot>,
    registry: &'a Registry,
}

/// One piece of an attribute value.
enum Part {
    Text(String),
    Slot(Slot),
}

impl Parser<'_> {
    fn rest(&self) -> &str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn syntax(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::Syntax {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn next_slot(&mut self) -> Slot {
        // Counts were checked up front.
        self.slots.next().unwrap_or(Slot::Empty)
    }

    /// Parse content until the closing tag of `parent` (consumed) or, at
    /// top level, the end of input.
    fn parse_children(&mut self, parent: Option<&str>) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        let mut text = String::new();

        loop {
            let Some(c) = self.peek() else {
                if let Some(tag) = parent {
                    return Err(TemplateError::Unclosed(tag.to_string()).into());
                }
                break;
            };

            match c {
                '<' if self.rest().starts_with("</") => {
                    flush_text(&mut text, &mut nodes);
                    let found = self.parse_close_tag()?;
                    return match parent {
                        Some(tag) if tag == found => Ok(merge_text(nodes)),
                        Some(tag) => Err(TemplateError::Mismatched {
                            expected: tag.to_string(),
                            found,
                        }
                        .into()),
                        None => Err(self.syntax(format!("unexpected </{found}>")).into()),
                    };
                }
                '<' if self.rest().starts_with("<!--") => {
                    let Some(end) = self.rest().find("-->") else {
                        return Err(self.syntax("unterminated comment").into());
                    };
                    self.pos += end + 3;
                }
                '<' if self.rest().starts_with("<!") => {
                    let Some(end) = self.rest().find('>') else {
                        return Err(self.syntax("unterminated declaration").into());
                    };
                    self.pos += end + 1;
                }
                '<' if self.rest()[1..].starts_with(|c: char| c.is_ascii_alphabetic()) => {
                    flush_text(&mut text, &mut nodes);
                    let node = self.parse_element()?;
                    nodes.push(node);
                }
                SLOT => {
                    self.bump();
                    match self.next_slot() {
                        Slot::Empty => {}
                        Slot::Text(s) => text.push_str(&s),
                        Slot::Node(node) => {
                            flush_text(&mut text, &mut nodes);
                            nodes.push(node);
                        }
                        Slot::Nodes(list) => {
                            flush_text(&mut text, &mut nodes);
                            nodes.extend(list);
                        }
                        slot @ Slot::Handler(_) => {
                            return Err(self.syntax(format!(
                                "a {} cannot be rendered as content",
                                slot.describe()
                            ))
                            .into());
                        }
                    }
                }
                '&' => {
                    let decoded = self.parse_entity();
                    text.push(decoded);
                }
                c => {
                    self.bump();
                    text.push(c);
                }
            }
        }

        flush_text(&mut text, &mut nodes);
        Ok(merge_text(nodes))
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
        {
            self.bump();
        }
        self.src[start..self.pos].to_ascii_lowercase()
    }

    fn parse_close_tag(&mut self) -> Result<String> {
        self.pos += 2;
        let name = self.parse_name();
        self.skip_whitespace();
        if self.bump() != Some('>') {
            return Err(self.syntax(format!("malformed closing tag </{name}")).into());
        }
        Ok(name)
    }

    fn parse_element(&mut self) -> Result<Node> {
        self.bump();
        let tag = self.parse_name();
        let mut el = Element::new(tag.clone());
        let mut self_closing = false;

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(TemplateError::Unclosed(tag).into()),
                Some('>') => {
                    self.bump();
                    break;
                }
                Some('/') if self.rest().starts_with("/>") => {
                    self.pos += 2;
                    self_closing = true;
                    break;
                }
                Some(SLOT) => {
                    return Err(self.syntax("placeholder in attribute name position").into());
                }
                Some(_) => self.parse_attribute(&mut el)?,
            }
        }

        if !self_closing && !is_void(&tag) {
            el.children = match tag.as_str() {
                "script" | "style" => self.parse_raw_text(&tag)?,
                _ => self.parse_children(Some(&tag))?,
            };
        }

        match self.registry.get(&tag) {
            Some(component) => {
                tracing::trace!(tag = %tag, "rendering component");
                Ok(component(&el)?.into())
            }
            None => Ok(Node::Element(el)),
        }
    }

    fn parse_attribute(&mut self, el: &mut Element) -> Result<()> {
        let start = self.pos;
        while self.peek().is_some_and(|c| {
            !c.is_whitespace() && !matches!(c, '=' | '>' | '/' | '"' | '\'' | SLOT)
        }) {
            self.bump();
        }
        if self.pos == start {
            return Err(self.syntax("expected attribute name").into());
        }
        let name = self.src[start..self.pos].to_ascii_lowercase();

        self.skip_whitespace();
        if self.peek() != Some('=') {
            el.set_attribute(name, "");
            return Ok(());
        }
        self.bump();
        self.skip_whitespace();

        let parts = self.parse_attribute_value(&el.tag)?;
        apply_attribute(el, name, parts)
    }

    fn parse_attribute_value(&mut self, tag: &str) -> Result<Vec<Part>> {
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.bump();
                Some(q)
            }
            _ => None,
        };

        let mut parts = Vec::new();
        let mut text = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(TemplateError::Unclosed(tag.to_string()).into());
            };
            match (quote, c) {
                (Some(q), c) if c == q => {
                    self.bump();
                    break;
                }
                (None, c) if c.is_whitespace() || c == '>' => break,
                (None, '/') if self.rest().starts_with("/>") => break,
                (_, SLOT) => {
                    self.bump();
                    if !text.is_empty() {
                        parts.push(Part::Text(std::mem::take(&mut text)));
                    }
                    parts.push(Part::Slot(self.next_slot()));
                }
                (_, '&') => text.push(self.parse_entity()),
                (_, c) => {
                    self.bump();
                    text.push(c);
                }
            }
        }
        if !text.is_empty() || parts.is_empty() {
            parts.push(Part::Text(text));
        }
        Ok(parts)
    }

    /// Content of `<script>`/`<style>`: no tags, entities or comments.
    fn parse_raw_text(&mut self, tag: &str) -> Result<Vec<Node>> {
        let close = format!("</{tag}");
        let Some(end) = self.rest().to_ascii_lowercase().find(&close) else {
            return Err(TemplateError::Unclosed(tag.to_string()).into());
        };
        let raw = self.src[self.pos..self.pos + end].to_string();
        self.pos += end;

        let mut text = String::new();
        for c in raw.chars() {
            match c {
                SLOT => match self.next_slot() {
                    Slot::Text(s) => text.push_str(&s),
                    Slot::Empty => {}
                    other => {
                        return Err(self
                            .syntax(format!("a {} cannot be placed in <{tag}>", other.describe()))
                            .into());
                    }
                },
                c => text.push(c),
            }
        }

        let found = self.parse_close_tag()?;
        if found != tag {
            return Err(TemplateError::Mismatched {
                expected: tag.to_string(),
                found,
            }
            .into());
        }
        Ok(if text.is_empty() {
            Vec::new()
        } else {
            vec![Node::Text(text)]
        })
    }

    /// Decode a character reference at the cursor; a lone `&` is literal.
    fn parse_entity(&mut self) -> char {
        let body = &self.rest()[1..];
        let decoded = body
            .char_indices()
            .take(12)
            .find(|&(_, c)| c == ';')
            .and_then(|(end, _)| decode_entity(&body[..end]).map(|c| (c, end + 2)));
        match decoded {
            Some((c, len)) => {
                self.pos += len;
                c
            }
            None => {
                self.pos += 1;
                '&'
            }
        }
    }
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

fn apply_attribute(el: &mut Element, name: String, mut parts: Vec<Part>) -> Result<()> {
    if matches!(parts.as_slice(), [Part::Slot(_)]) {
        if let Some(Part::Slot(slot)) = parts.pop() {
            return match slot {
                Slot::Empty => Ok(()),
                Slot::Text(text) => {
                    el.set_attribute(name, text);
                    Ok(())
                }
                Slot::Handler(handler) => {
                    let event = name.strip_prefix("on").unwrap_or(&name).to_string();
                    el.listeners.push(Listener { event, handler });
                    Ok(())
                }
                other => Err(TemplateError::MisplacedSlot(other.describe()).into()),
            };
        }
    }

    let mut value = String::new();
    for part in parts {
        match part {
            Part::Text(text) => value.push_str(&text),
            Part::Slot(Slot::Text(text)) => value.push_str(&text),
            Part::Slot(Slot::Empty) => {}
            Part::Slot(other) => return Err(TemplateError::MisplacedSlot(other.describe()).into()),
        }
    }
    el.set_attribute(name, value);
    Ok(())
}

fn flush_text(text: &mut String, nodes: &mut Vec<Node>) {
    if text.is_empty() {
        return;
    }
    let run = std::mem::take(text);
    if run.trim().is_empty() && run.contains('\n') {
        return;
    }
    nodes.push(Node::Text(run));
}

/// Join adjacent text nodes.
fn merge_text(nodes: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        match (out.last_mut(), node) {
            (Some(Node::Text(prev)), Node::Text(next)) => prev.push_str(&next),
            (_, node) => out.push(node),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TramError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn render(markup: &str, slots: Vec<Slot>) -> Result<Renderable> {
        Html::default().render(markup, slots)
    }

    fn template_err(result: Result<Renderable>) -> TemplateError {
        match result {
            Err(TramError::Template(err)) => err,
            other => panic!("expected template error, got {other:?}"),
        }
    }

    // ====================================================================
    // Structure
    // ====================================================================

    #[test]
    fn renders_nested_elements() {
        let out = render("<div id=\"app\"><p>Hello <b>tram</b></p></div>", vec![]).unwrap();
        assert_eq!(
            out.to_html(),
            "<div id=\"app\"><p>Hello <b>tram</b></p></div>"
        );
    }

    #[test]
    fn drops_indentation_between_tags() {
        let out = render(
            "
            <ul>
              <li>one</li>
              <li>two</li>
            </ul>
            ",
            vec![],
        )
        .unwrap();
        assert_eq!(out.to_html(), "<ul><li>one</li><li>two</li></ul>");
    }

    #[test]
    fn keeps_inline_spaces() {
        let out = render("<p><b>a</b> <i>b</i></p>", vec![]).unwrap();
        assert_eq!(out.to_html(), "<p><b>a</b> <i>b</i></p>");
    }

    #[test]
    fn lowercases_names() {
        let out = render("<DIV Class=\"x\"></div>", vec![]).unwrap();
        assert_eq!(out.to_html(), "<div class=\"x\"></div>");
    }

    #[test]
    fn void_and_self_closing_tags() {
        let out = render("<p><br><img src=a.png/><span/></p>", vec![]).unwrap();
        assert_eq!(
            out.to_html(),
            "<p><br><img src=\"a.png\"><span></span></p>"
        );
    }

    #[test]
    fn boolean_and_unquoted_attributes() {
        let out = render("<input disabled type=text value='a b'>", vec![]).unwrap();
        let el = out.as_element().unwrap();
        assert_eq!(el.attribute("disabled"), Some(""));
        assert_eq!(el.attribute("type"), Some("text"));
        assert_eq!(el.attribute("value"), Some("a b"));
    }

    #[test]
    fn comments_and_doctype_are_dropped() {
        let out = render("<!doctype html><div><!-- note --></div>", vec![]).unwrap();
        assert_eq!(out.to_html(), "<div></div>");
    }

    #[test]
    fn entities_are_decoded() {
        let out = render("<p title=\"&quot;x&quot;\">&lt;a&gt; &amp; &#65;&#x42; & c</p>", vec![])
            .unwrap();
        let el = out.as_element().unwrap();
        assert_eq!(el.attribute("title"), Some("\"x\""));
        assert_eq!(el.text_content(), "<a> & AB & c");
    }

    #[test]
    fn script_content_is_raw() {
        let out = render("<script>if (a < b) { x(); }</script>", vec![]).unwrap();
        assert_eq!(out.text_content(), "if (a < b) { x(); }");
    }

    #[test]
    fn doubled_braces_are_literal() {
        let out = render("<p>{{}}</p>", vec![]).unwrap();
        assert_eq!(out.text_content(), "{}");
    }

    // ====================================================================
    // Roots
    // ====================================================================

    #[test]
    fn text_only_template_is_text() {
        let out = render("{}", vec![Slot::from(3)]).unwrap();
        assert_eq!(out, Renderable::text("3"));
    }

    #[test]
    fn empty_template_is_empty_text() {
        assert_eq!(render("  \n ", vec![]).unwrap(), Renderable::text(""));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let out = render("  <div></div>  ", vec![]).unwrap();
        assert!(out.as_element().is_some());
    }

    #[test]
    fn several_roots_are_rejected() {
        let err = template_err(render("<a></a><b></b>", vec![]));
        assert_eq!(err, TemplateError::RootCount(2));
    }

    // ====================================================================
    // Slots
    // ====================================================================

    #[test]
    fn text_slots_are_escaped_on_output() {
        let out = render("<p>{}</p>", vec![Slot::from("<b>")]).unwrap();
        assert_eq!(out.to_html(), "<p>&lt;b&gt;</p>");
    }

    #[test]
    fn adjacent_text_merges() {
        let out = render("<p>count: {}!</p>", vec![Slot::from(2)]).unwrap();
        let el = out.as_element().unwrap();
        assert_eq!(el.children, vec![Node::Text("count: 2!".into())]);
    }

    #[test]
    fn node_and_list_slots() {
        let items: Vec<Element> = ["a", "b"]
            .iter()
            .map(|t| Element::new("li").text(*t))
            .collect();
        let out = render(
            "<div>{}<ul>{}</ul></div>",
            vec![Slot::from(Element::new("h1").text("t")), Slot::from(items)],
        )
        .unwrap();
        assert_eq!(
            out.to_html(),
            "<div><h1>t</h1><ul><li>a</li><li>b</li></ul></div>"
        );
    }

    #[test]
    fn json_values_interpolate() {
        let out = render(
            "<p a={} b={}>{}</p>",
            vec![
                Slot::from(serde_json::json!("s")),
                Slot::from(serde_json::json!(null)),
                Slot::from(serde_json::json!({"n": 1})),
            ],
        )
        .unwrap();
        assert_eq!(out.to_html(), r#"<p a="s">{"n":1}</p>"#);
    }

    #[test]
    fn partial_attribute_values_concatenate() {
        let out = render(
            "<a href=\"/users/{}?tab={}\"></a>",
            vec![Slot::from("7"), Slot::from(None::<&str>)],
        )
        .unwrap();
        assert_eq!(out.as_element().unwrap().attribute("href"), Some("/users/7?tab="));
    }

    #[test]
    fn handler_slot_binds_listener() {
        let out = render(
            "<button onclick={}>go</button>",
            vec![Slot::handler(|_| {})],
        )
        .unwrap();
        let el = out.as_element().unwrap();
        assert_eq!(el.listeners.len(), 1);
        assert_eq!(el.listeners[0].event, "click");
        assert_eq!(el.attribute("onclick"), None);
    }

    #[test]
    fn slot_count_must_match() {
        let err = template_err(render("<p>{}</p>", vec![]));
        assert_eq!(err, TemplateError::SlotCount { expected: 1, got: 0 });
    }

    #[test]
    fn misplaced_slots_are_rejected() {
        let err = template_err(render(
            "<p class=\"a {}\"></p>",
            vec![Slot::from(Element::new("b"))],
        ));
        assert_eq!(err, TemplateError::MisplacedSlot("node"));

        let err = template_err(render(
            "<p title=\"x{}\"></p>",
            vec![Slot::handler(|_| {})],
        ));
        assert_eq!(err, TemplateError::MisplacedSlot("event handler"));
    }

    // ====================================================================
    // Errors
    // ====================================================================

    #[test]
    fn unclosed_tag() {
        let err = template_err(render("<div><p></p>", vec![]));
        assert_eq!(err, TemplateError::Unclosed("div".into()));
    }

    #[test]
    fn mismatched_tag() {
        let err = template_err(render("<div></span>", vec![]));
        assert_eq!(
            err,
            TemplateError::Mismatched {
                expected: "div".into(),
                found: "span".into()
            }
        );
    }

    #[test]
    fn stray_closing_tag() {
        let err = template_err(render("</div>", vec![]));
        assert!(matches!(err, TemplateError::Syntax { offset: 6, .. }));
    }

    #[test]
    fn reserved_marker_character_is_rejected() {
        let err = template_err(render("<p>\u{E000}-{}</p>", vec!["value".into()]));
        assert!(matches!(err, TemplateError::Syntax { offset: 3, .. }));
    }

    // ====================================================================
    // Components
    // ====================================================================

    #[test]
    fn registry_components_replace_custom_tags() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let registry = Registry::new().with("Greeting", move |el| {
            counter.fetch_add(1, Ordering::SeqCst);
            let name = el.attribute("name").unwrap_or("nobody").to_string();
            Html::default().render("<p>hello {}</p>", vec![Slot::from(name)])
        });
        assert!(registry.contains("greeting"));

        let html = Html::new(registry);
        let out = html
            .render("<main><greeting name={}></greeting></main>", vec![Slot::from("tram")])
            .unwrap();
        assert_eq!(out.to_html(), "<main><p>hello tram</p></main>");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn components_receive_children() {
        let html = Html::new(Registry::new().with("card", |el| {
            Ok(Element::new("section")
                .attr("class", "card")
                .child(Element {
                    children: el.children.clone(),
                    ..Element::new("div")
                })
                .into())
        }));
        let out = html.render("<card><b>x</b></card>", vec![]).unwrap();
        assert_eq!(
            out.to_html(),
            "<section class=\"card\"><div><b>x</b></div></section>"
        );
    }

    #[test]
    fn component_errors_propagate() {
        let html = Html::new(Registry::new().with("broken", |_| {
            Html::default().render("<a></a><b></b>", vec![])
        }));
        let err = template_err(html.render("<div><broken/></div>", vec![]));
        assert_eq!(err, TemplateError::RootCount(2));
    }
}
