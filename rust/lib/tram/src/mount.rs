use std::fmt;
use std::sync::Arc;

use crate::dom::{Document, NodeId, CONTAINER_TAG};
use crate::error::{Result, TramError};
use crate::host::Host;
use crate::render::PageRenderer;
use crate::value::StateTree;

/// Where an app is mounted: a selector resolved on every mount, or a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountTarget {
    Selector(String),
    Node(NodeId),
}

impl From<&str> for MountTarget {
    fn from(selector: &str) -> Self {
        MountTarget::Selector(selector.to_string())
    }
}

impl From<String> for MountTarget {
    fn from(selector: String) -> Self {
        MountTarget::Selector(selector)
    }
}

impl From<NodeId> for MountTarget {
    fn from(id: NodeId) -> Self {
        MountTarget::Node(id)
    }
}

impl fmt::Display for MountTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountTarget::Selector(s) => f.write_str(s),
            MountTarget::Node(id) => write!(f, "{id}"),
        }
    }
}

/// Renders pages into a host document.
///
/// The target element owns one container child, created on first mount
/// and morphed in place afterwards. Everything that can fail (host checks,
/// target lookup, path, page rendering) happens before the document is
/// touched.
pub struct MountController {
    host: Arc<dyn Host>,
    renderer: PageRenderer,
}

impl MountController {
    pub fn new(host: Arc<dyn Host>, renderer: PageRenderer) -> Self {
        Self { host, renderer }
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    pub fn renderer(&self) -> &PageRenderer {
        &self.renderer
    }

    /// The target's first element child, creating an empty
    /// [`CONTAINER_TAG`] element if there is none.
    pub fn ensure_container_child(document: &Document, target: NodeId) -> NodeId {
        if let Some(child) = document.first_element_child(target) {
            return child;
        }
        let child = document.create_element(CONTAINER_TAG);
        document.append_child(target, child);
        child
    }

    /// Render `path` (or the host location) into `target`.
    ///
    /// Returns the container child that now holds the page.
    pub fn render(
        &self,
        target: &MountTarget,
        path: Option<&str>,
        state: Option<StateTree>,
    ) -> Result<NodeId> {
        let document = self.host.document().ok_or_else(|| {
            TramError::UnsupportedEnvironment(format!("cannot mount into '{target}' without a document"))
        })?;
        let target_id = resolve_target(&document, target)?;
        let path = match path {
            Some(path) => path.to_string(),
            None => self.host.location().ok_or_else(|| {
                TramError::UnsupportedEnvironment("no location to derive the path from".into())
            })?,
        };

        let page = self.renderer.render(&path, state)?;

        let container = Self::ensure_container_child(&document, target_id);
        document.morph(container, &page);
        tracing::debug!(%target, %path, %container, "mounted");
        Ok(container)
    }
}

fn resolve_target(document: &Document, target: &MountTarget) -> Result<NodeId> {
    let found = match target {
        MountTarget::Selector(selector) => document.query_selector(selector),
        MountTarget::Node(id) => document.tag(*id).map(|_| *id),
    };
    found.ok_or_else(|| TramError::TargetNotFound(target.to_string()))
}

impl fmt::Debug for MountController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountController")
            .field("renderer", &self.renderer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Renderable;
    use crate::host::{Browser, Headless};
    use crate::router::RouteTable;

    fn controller(host: Arc<dyn Host>) -> MountController {
        let routes = Arc::new(RouteTable::new("/404"));
        routes.add_route("/404", |_| Ok(Renderable::text("missing")));
        routes.add_route("/:id", |s| Ok(Renderable::text(s.param("id").unwrap_or_default())));
        routes.add_route("/broken", |_| {
            Err(TramError::TargetNotFound("rendering failed".into()))
        });
        MountController::new(host, PageRenderer::new(routes, Arc::new(StateTree::new())))
    }

    fn browser() -> (Arc<Document>, Arc<Browser>) {
        let doc = Arc::new(Document::new());
        let app = doc.create_element("main");
        doc.set_attribute(app, "id", "app");
        doc.append_child(doc.body(), app);
        let host = Arc::new(Browser::new(doc.clone(), "http://localhost/from-location").unwrap());
        (doc, host)
    }

    // ====================================================================
    // Container child
    // ====================================================================

    #[test]
    fn container_child_is_created_once() {
        let doc = Document::new();
        let target = doc.body();
        let first = MountController::ensure_container_child(&doc, target);
        let second = MountController::ensure_container_child(&doc, target);
        assert_eq!(first, second);
        assert_eq!(doc.children(target), vec![first]);
        assert_eq!(doc.tag(first).as_deref(), Some("div"));
    }

    #[test]
    fn existing_element_child_is_reused() {
        let doc = Document::new();
        let existing = doc.create_element("section");
        doc.append_child(doc.body(), existing);
        assert_eq!(MountController::ensure_container_child(&doc, doc.body()), existing);
    }

    // ====================================================================
    // Render
    // ====================================================================

    #[test]
    fn renders_explicit_path_by_selector() {
        let (doc, host) = browser();
        let mounter = controller(host);
        let container = mounter.render(&"#app".into(), Some("/foo"), None).unwrap();
        assert_eq!(doc.text_content(container), "foo");
        let app = doc.get_element_by_id("app").unwrap();
        assert_eq!(doc.first_element_child(app), Some(container));
    }

    #[test]
    fn path_defaults_to_location() {
        let (doc, host) = browser();
        let mounter = controller(host);
        let container = mounter.render(&"#app".into(), None, None).unwrap();
        assert_eq!(doc.text_content(container), "from-location");
    }

    #[test]
    fn remount_reuses_container() {
        let (doc, host) = browser();
        let mounter = controller(host);
        let first = mounter.render(&"#app".into(), Some("/a"), None).unwrap();
        let second = mounter.render(&"#app".into(), Some("/b"), None).unwrap();
        assert_eq!(first, second);
        assert_eq!(doc.text_content(second), "b");
    }

    #[test]
    fn node_target() {
        let (doc, host) = browser();
        let mounter = controller(host);
        let app = doc.get_element_by_id("app").unwrap();
        let container = mounter.render(&app.into(), Some("/x"), None).unwrap();
        assert_eq!(doc.parent(container), Some(app));
    }

    #[test]
    fn headless_is_unsupported() {
        let mounter = controller(Arc::new(Headless));
        let err = mounter.render(&"#app".into(), Some("/"), None).unwrap_err();
        assert!(matches!(err, TramError::UnsupportedEnvironment(_)));
    }

    #[test]
    fn missing_target_leaves_document_untouched() {
        let (doc, host) = browser();
        let before = doc.outer_html(doc.root());
        let mounter = controller(host);
        let err = mounter.render(&"#nope".into(), Some("/x"), None).unwrap_err();
        assert!(matches!(err, TramError::TargetNotFound(ref t) if t == "#nope"));
        assert_eq!(doc.outer_html(doc.root()), before);
    }

    #[test]
    fn page_error_leaves_document_untouched() {
        let (doc, host) = browser();
        let before = doc.outer_html(doc.root());
        let mounter = controller(host);
        assert!(mounter.render(&"#app".into(), Some("/broken"), None).is_err());
        assert_eq!(doc.outer_html(doc.root()), before);
    }
}
