//! Markup trees, a live document, and reconciliation between the two.
//!
//! - [`Node`] / [`Element`] / [`Renderable`]: detached trees produced by
//!   pages and templates; serializable to HTML without any document.
//! - [`Document`]: live nodes addressed by [`NodeId`], with selector
//!   queries, focus, scroll and events.
//! - [`Document::morph`]: reconcile a live element against a new tree.

mod document;
mod morph;
mod node;
mod selector;

pub use document::{Document, NodeId};
pub use morph::CONTAINER_TAG;
pub use node::{is_void, Element, Event, EventHandler, Listener, Node, Renderable};
