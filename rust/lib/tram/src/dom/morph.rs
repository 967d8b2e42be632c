//! In-place reconciliation of live nodes against freshly rendered markup.
//!
//! The root element always keeps its identity. Below it, children are paired
//! by position: a live child is morphed when it has the same kind, tag and
//! `id` as its counterpart, and replaced otherwise. Live-only state (focus,
//! scroll) survives on every node that is morphed rather than replaced.
//! Replaced and surplus live nodes are freed.

use super::document::{Arena, Document, LiveKind, NodeId};
use super::node::{Element, Node, Renderable};

/// Tag of the bare element that holds a mounted page.
pub const CONTAINER_TAG: &str = "div";

impl Document {
    /// Morph `target` to match `next`.
    ///
    /// `target` must be an element. For [`Renderable::Text`] the element is
    /// kept but reset to a bare [`CONTAINER_TAG`] whose only child is the
    /// text. Returns `false` if `target` is not an element of this
    /// document; nothing is touched in that case.
    pub fn morph(&self, target: NodeId, next: &Renderable) -> bool {
        let mut arena = self.write();
        if arena.element(target).is_none() {
            return false;
        }
        match next {
            Renderable::Element(el) => morph_element(&mut arena, target, el),
            Renderable::Text(text) => {
                if let Some(live) = arena.element_mut(target) {
                    if live.tag != CONTAINER_TAG {
                        live.tag = CONTAINER_TAG.to_string();
                    }
                    live.attributes.clear();
                    live.listeners.clear();
                }
                morph_children(&mut arena, target, std::slice::from_ref(&Node::Text(text.clone())));
            }
        }
        true
    }
}

fn morph_element(arena: &mut Arena, id: NodeId, next: &Element) {
    if let Some(live) = arena.element_mut(id) {
        if live.tag != next.tag {
            live.tag = next.tag.clone();
        }
        if live.attributes != next.attributes {
            live.attributes = next.attributes.clone();
        }
        live.listeners = next.listeners.clone();
    }
    morph_children(arena, id, &next.children);
}

fn morph_children(arena: &mut Arena, parent: NodeId, next: &[Node]) {
    let live: Vec<NodeId> = arena
        .get(parent)
        .map(|n| n.children.clone())
        .unwrap_or_default();

    for (index, node) in next.iter().enumerate() {
        match live.get(index) {
            Some(&current) if same_kind(arena, current, node) => morph_node(arena, current, node),
            Some(&current) => {
                let built = arena.build(node);
                arena.replace(parent, current, built);
                arena.free(current);
            }
            None => {
                let built = arena.build(node);
                arena.append(parent, built);
            }
        }
    }

    for surplus in live.iter().skip(next.len()) {
        arena.free(*surplus);
    }
}

fn morph_node(arena: &mut Arena, id: NodeId, next: &Node) {
    match next {
        Node::Element(el) => morph_element(arena, id, el),
        Node::Text(text) => {
            if let Some(live) = arena.get_mut(id) {
                if let LiveKind::Text(ref mut current) = live.kind {
                    if current != text {
                        *current = text.clone();
                    }
                }
            }
        }
    }
}

/// Same node kind, same tag, same `id` attribute.
fn same_kind(arena: &Arena, id: NodeId, next: &Node) -> bool {
    let Some(live) = arena.get(id) else {
        return false;
    };
    match (&live.kind, next) {
        (LiveKind::Text(_), Node::Text(_)) => true,
        (LiveKind::Element(a), Node::Element(b)) => {
            let live_id = a.attributes.iter().find(|(k, _)| k == "id").map(|(_, v)| v);
            a.tag == b.tag && live_id.map(String::as_str) == b.attribute("id")
        }
        _ => false,
    }
}
