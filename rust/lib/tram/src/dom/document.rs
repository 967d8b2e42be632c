use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::node::{
    escape_text, is_void, write_close_tag, write_open_tag, Element, Event, EventHandler,
    Listener, Node,
};
use super::selector::Selector;

/// Handle to a node owned by a [`Document`].
///
/// Slots are reused once a node is freed; the generation keeps a stale
/// handle from addressing the slot's next occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.index)?;
        if self.generation > 0 {
            write!(f, "v{}", self.generation)?;
        }
        Ok(())
    }
}

/// A live, mutable document.
///
/// Nodes live in an arena and are addressed by [`NodeId`]. Nodes removed
/// with [`remove_child`](Self::remove_child) stay addressable but detached.
/// Nodes that [`morph`](Self::morph) replaces or drops are freed and their
/// slots reused.
///
/// All methods take `&self`; the arena sits behind a `RwLock` and no lock is
/// held while event handlers run, so handlers may dispatch actions that
/// re-render this document.
///
/// The tree starts as `<html><body></body></html>`.
pub struct Document {
    arena: RwLock<Arena>,
}

pub(crate) struct Arena {
    nodes: Vec<Slot>,
    /// Indices of vacant slots.
    free: Vec<usize>,
    root: NodeId,
    body: NodeId,
    pub(crate) focused: Option<NodeId>,
}

struct Slot {
    generation: u32,
    node: Option<LiveNode>,
}

pub(crate) struct LiveNode {
    pub(crate) kind: LiveKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

pub(crate) enum LiveKind {
    Element(LiveElement),
    Text(String),
}

pub(crate) struct LiveElement {
    pub(crate) tag: String,
    pub(crate) attributes: Vec<(String, String)>,
    pub(crate) listeners: Vec<Listener>,
    /// Live-only scroll offset; never part of markup.
    pub(crate) scroll: (i32, i32),
}

impl Document {
    /// Create a document with an empty `<body>`.
    pub fn new() -> Self {
        let mut arena = Arena {
            nodes: Vec::new(),
            free: Vec::new(),
            root: NodeId { index: 0, generation: 0 },
            body: NodeId { index: 0, generation: 0 },
            focused: None,
        };
        let root = arena.alloc_element("html");
        let body = arena.alloc_element("body");
        arena.append(root, body);
        arena.root = root;
        arena.body = body;
        Self {
            arena: RwLock::new(arena),
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Arena> {
        self.arena.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Arena> {
        self.arena.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ====================================================================
    // Structure
    // ====================================================================

    /// The `<html>` element.
    pub fn root(&self) -> NodeId {
        self.read().root
    }

    /// The `<body>` element.
    pub fn body(&self) -> NodeId {
        self.read().body
    }

    /// Check if `id` belongs to this document (attached or not).
    pub fn contains(&self, id: NodeId) -> bool {
        self.read().get(id).is_some()
    }

    /// Number of live nodes, attached or not.
    pub fn node_count(&self) -> usize {
        let arena = self.read();
        arena.nodes.len() - arena.free.len()
    }

    /// Check if `id` is reachable from the root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.read().is_connected(id)
    }

    /// Create a detached element.
    pub fn create_element(&self, tag: &str) -> NodeId {
        self.write().alloc_element(tag)
    }

    /// Create a detached text node.
    pub fn create_text(&self, text: &str) -> NodeId {
        self.write().alloc(LiveKind::Text(text.to_string()))
    }

    /// Instantiate a markup tree as detached live nodes.
    pub fn create_node(&self, node: &Node) -> NodeId {
        self.write().build(node)
    }

    /// Append `child` to `parent`, detaching it from any previous parent.
    ///
    /// Returns `false` if either id is unknown or the move would create a
    /// cycle.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> bool {
        let mut arena = self.write();
        if arena.get(parent).is_none() || arena.get(child).is_none() {
            return false;
        }
        if arena.is_ancestor_or_self(child, parent) {
            return false;
        }
        arena.append(parent, child);
        true
    }

    /// Detach `child` from `parent`. Returns `false` if it was not a child.
    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> bool {
        let mut arena = self.write();
        if arena.get(child).and_then(|n| n.parent) != Some(parent) {
            return false;
        }
        arena.detach(child);
        true
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.read().get(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.read()
            .get(id)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// First child that is an element, skipping text.
    pub fn first_element_child(&self, id: NodeId) -> Option<NodeId> {
        let arena = self.read();
        arena
            .get(id)?
            .children
            .iter()
            .copied()
            .find(|c| arena.element(*c).is_some())
    }

    // ====================================================================
    // Element data
    // ====================================================================

    /// Tag name, or `None` for text nodes.
    pub fn tag(&self, id: NodeId) -> Option<String> {
        self.read().element(id).map(|el| el.tag.clone())
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<String> {
        self.read()
            .element(id)?
            .attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    pub fn set_attribute(&self, id: NodeId, name: &str, value: &str) {
        let mut arena = self.write();
        if let Some(el) = arena.element_mut(id) {
            match el.attributes.iter_mut().find(|(k, _)| k == name) {
                Some(slot) => slot.1 = value.to_string(),
                None => el.attributes.push((name.to_string(), value.to_string())),
            }
        }
    }

    pub fn remove_attribute(&self, id: NodeId, name: &str) {
        let mut arena = self.write();
        if let Some(el) = arena.element_mut(id) {
            el.attributes.retain(|(k, _)| k != name);
        }
    }

    /// Concatenated text of the node and its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        let arena = self.read();
        let mut out = String::new();
        arena.collect_text(id, &mut out);
        out
    }

    /// Serialized children.
    pub fn inner_html(&self, id: NodeId) -> String {
        let arena = self.read();
        let mut out = String::new();
        if let Some(node) = arena.get(id) {
            for child in &node.children {
                arena.write_html(*child, &mut out);
            }
        }
        out
    }

    /// Serialized node, including its own tag.
    pub fn outer_html(&self, id: NodeId) -> String {
        let arena = self.read();
        let mut out = String::new();
        arena.write_html(id, &mut out);
        out
    }

    /// Snapshot a live subtree as a detached markup tree.
    pub fn snapshot(&self, id: NodeId) -> Option<Node> {
        self.read().snapshot(id)
    }

    // ====================================================================
    // Queries
    // ====================================================================

    /// First element in document order matching a CSS selector.
    ///
    /// Supports `tag`, `#id`, `.class`, `*`, compounds such as `div#a.b`,
    /// and descendant combinators (`main .item`). Unparseable selectors
    /// match nothing.
    pub fn query_selector(&self, selector: &str) -> Option<NodeId> {
        let selector = Selector::parse(selector)?;
        let arena = self.read();
        arena
            .descendants(arena.root)
            .into_iter()
            .find(|id| selector.matches(&arena, *id))
    }

    /// All matching elements in document order.
    pub fn query_selector_all(&self, selector: &str) -> Vec<NodeId> {
        let Some(selector) = Selector::parse(selector) else {
            return Vec::new();
        };
        let arena = self.read();
        arena
            .descendants(arena.root)
            .into_iter()
            .filter(|id| selector.matches(&arena, *id))
            .collect()
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.query_selector(&format!("#{id}"))
    }

    // ====================================================================
    // Live-only state
    // ====================================================================

    /// Give focus to an element.
    pub fn focus(&self, id: NodeId) {
        let mut arena = self.write();
        if arena.element(id).is_some() {
            arena.focused = Some(id);
        }
    }

    /// Currently focused element, if it is still attached.
    pub fn focused(&self) -> Option<NodeId> {
        let arena = self.read();
        arena.focused.filter(|id| arena.is_connected(*id))
    }

    pub fn set_scroll(&self, id: NodeId, x: i32, y: i32) {
        if let Some(el) = self.write().element_mut(id) {
            el.scroll = (x, y);
        }
    }

    pub fn scroll(&self, id: NodeId) -> (i32, i32) {
        self.read().element(id).map(|el| el.scroll).unwrap_or_default()
    }

    // ====================================================================
    // Events
    // ====================================================================

    /// Bind a handler on a live element.
    pub fn add_event_listener<F>(&self, id: NodeId, event: &str, handler: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        if let Some(el) = self.write().element_mut(id) {
            el.listeners.push(Listener {
                event: event.to_string(),
                handler: std::sync::Arc::new(handler),
            });
        }
    }

    /// Deliver an event to `target`, then bubble it to each ancestor.
    ///
    /// Handlers are collected first and run with no lock held. Returns the
    /// number of handlers invoked.
    pub fn dispatch_event(&self, target: NodeId, kind: &str) -> usize {
        let calls: Vec<(NodeId, EventHandler)> = {
            let arena = self.read();
            let mut calls = Vec::new();
            let mut current = arena.get(target).map(|_| target);
            while let Some(id) = current {
                if let Some(el) = arena.element(id) {
                    calls.extend(
                        el.listeners
                            .iter()
                            .filter(|l| l.event == kind)
                            .map(|l| (id, l.handler.clone())),
                    );
                }
                current = arena.get(id).and_then(|n| n.parent);
            }
            calls
        };

        tracing::debug!(%target, kind, handlers = calls.len(), "dispatching event");
        for (current_target, handler) in &calls {
            handler(&Event {
                kind: kind.to_string(),
                target,
                current_target: *current_target,
            });
        }
        calls.len()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("html", &self.outer_html(self.root()))
            .finish()
    }
}

// ── Arena ───────────────────────────────────────────────────────────

impl Arena {
    pub(crate) fn get(&self, id: NodeId) -> Option<&LiveNode> {
        self.nodes
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)?
            .node
            .as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut LiveNode> {
        self.nodes
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)?
            .node
            .as_mut()
    }

    /// Slots ever allocated, vacant ones included.
    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn element(&self, id: NodeId) -> Option<&LiveElement> {
        match &self.get(id)?.kind {
            LiveKind::Element(el) => Some(el),
            LiveKind::Text(_) => None,
        }
    }

    pub(crate) fn element_mut(&mut self, id: NodeId) -> Option<&mut LiveElement> {
        match &mut self.get_mut(id)?.kind {
            LiveKind::Element(el) => Some(el),
            LiveKind::Text(_) => None,
        }
    }

    fn alloc(&mut self, kind: LiveKind) -> NodeId {
        let node = LiveNode {
            kind,
            parent: None,
            children: Vec::new(),
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.nodes[index];
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        self.nodes.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            index: self.nodes.len() - 1,
            generation: 0,
        }
    }

    /// Detach `id` and release it with all its descendants.
    ///
    /// Freed handles stop resolving; focus on a freed node is dropped.
    pub(crate) fn free(&mut self, id: NodeId) {
        if id == self.root || id == self.body {
            return;
        }
        self.detach(id);
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(slot) = self
                .nodes
                .get_mut(current.index)
                .filter(|slot| slot.generation == current.generation)
            else {
                continue;
            };
            let Some(node) = slot.node.take() else {
                continue;
            };
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(current.index);
            if self.focused == Some(current) {
                self.focused = None;
            }
            stack.extend(node.children);
        }
    }

    fn alloc_element(&mut self, tag: &str) -> NodeId {
        self.alloc(LiveKind::Element(LiveElement {
            tag: tag.to_string(),
            attributes: Vec::new(),
            listeners: Vec::new(),
            scroll: (0, 0),
        }))
    }

    /// Instantiate a markup subtree, detached.
    pub(crate) fn build(&mut self, node: &Node) -> NodeId {
        match node {
            Node::Text(text) => self.alloc(LiveKind::Text(text.clone())),
            Node::Element(el) => self.build_element(el),
        }
    }

    pub(crate) fn build_element(&mut self, el: &Element) -> NodeId {
        let id = self.alloc(LiveKind::Element(LiveElement {
            tag: el.tag.clone(),
            attributes: el.attributes.clone(),
            listeners: el.listeners.clone(),
            scroll: (0, 0),
        }));
        for child in &el.children {
            let child_id = self.build(child);
            self.append(id, child_id);
        }
        id
    }

    pub(crate) fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.get_mut(parent) {
            node.children.push(child);
        }
    }

    /// Put `new` where `old` is under `parent`; `old` becomes detached.
    pub(crate) fn replace(&mut self, parent: NodeId, old: NodeId, new: NodeId) {
        self.detach(new);
        let Some(index) = self
            .get(parent)
            .and_then(|p| p.children.iter().position(|c| *c == old))
        else {
            return;
        };
        if let Some(p) = self.get_mut(parent) {
            p.children[index] = new;
        }
        if let Some(node) = self.get_mut(old) {
            node.parent = None;
        }
        if let Some(node) = self.get_mut(new) {
            node.parent = Some(parent);
        }
    }

    pub(crate) fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.get(id).and_then(|n| n.parent) else {
            return;
        };
        if let Some(p) = self.get_mut(parent) {
            p.children.retain(|c| *c != id);
        }
        if let Some(node) = self.get_mut(id) {
            node.parent = None;
        }
    }

    fn is_connected(&self, id: NodeId) -> bool {
        self.is_ancestor_or_self(self.root, id)
    }

    /// Walk up from `id` looking for `ancestor`.
    fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.get(id).map(|_| id);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.get(c).and_then(|n| n.parent);
        }
        false
    }

    /// Elements under `id` in document order, excluding `id` itself.
    fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .get(id)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(current) = stack.pop() {
            if let Some(node) = self.get(current) {
                if matches!(node.kind, LiveKind::Element(_)) {
                    out.push(current);
                    stack.extend(node.children.iter().rev().copied());
                }
            }
        }
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.get(id) else { return };
        match &node.kind {
            LiveKind::Text(text) => out.push_str(text),
            LiveKind::Element(_) => {
                for child in &node.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.get(id) else { return };
        match &node.kind {
            LiveKind::Text(text) => escape_text(out, text),
            LiveKind::Element(el) => {
                write_open_tag(out, &el.tag, &el.attributes);
                if is_void(&el.tag) {
                    return;
                }
                for child in &node.children {
                    self.write_html(*child, out);
                }
                write_close_tag(out, &el.tag);
            }
        }
    }

    fn snapshot(&self, id: NodeId) -> Option<Node> {
        let node = self.get(id)?;
        Some(match &node.kind {
            LiveKind::Text(text) => Node::Text(text.clone()),
            LiveKind::Element(el) => Node::Element(Element {
                tag: el.tag.clone(),
                attributes: el.attributes.clone(),
                listeners: el.listeners.clone(),
                children: node
                    .children
                    .iter()
                    .filter_map(|c| self.snapshot(*c))
                    .collect(),
            }),
        })
    }
}
