use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use crate::config::TramOptions;
use crate::dom::{NodeId, Renderable};
use crate::error::{Result, TramError};
use crate::host::{Headless, Host};
use crate::html::{Html, Registry};
use crate::mount::{MountController, MountTarget};
use crate::render::{PageRenderer, RenderState, StateSource};
use crate::router::RouteTable;
use crate::store::{Dispatcher, Reducer, StateStore};
use crate::value::{Action, StateTree};

/// Lifecycle of a [`Tram`] app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Routes and reducers are being registered; no store exists.
    Configured,
    /// `start` built a store and the mount loop is live.
    Running,
}

/// Tram: a minimal single-page-app runtime.
///
/// - `add_route(pattern, page)` maps a path pattern to a page
/// - `add_reducer(key, reducer, initial)` registers a slice of state
/// - `start(target, path)` builds the store and keeps `target` rendered
/// - `to_node(path, state)` / `to_string(path, state)` render without a document
///
/// # Examples
///
/// ```ignore
/// let doc = Arc::new(Document::new());
/// let app = Tram::with_host(TramOptions::default(), Arc::new(Browser::new(doc, "http://localhost/")?));
///
/// app.add_reducer("counter", |n, action| match action.kind.as_str() {
///     "add" => json!(n.as_i64().unwrap_or(0) + 1),
///     _ => n.clone(),
/// }, 2);
/// app.add_route("/", |s| Ok(Renderable::text(s.slice("counter").map(Value::to_string).unwrap_or_default())));
///
/// app.start("body", None)?;
/// app.dispatch(&Action::new("add"))?;   // body now reads "3"
/// ```
pub struct Tram {
    options: TramOptions,
    routes: Arc<RouteTable>,
    model: Arc<Model>,
    mounter: Arc<MountController>,
}

/// Reducers, initial state and the running store, shared with the renderer.
struct Model {
    reducers: RwLock<BTreeMap<String, Reducer>>,
    initial: RwLock<StateTree>,
    lifecycle: RwLock<Lifecycle>,
}

#[derive(Clone)]
enum Lifecycle {
    Configured,
    Running {
        store: Arc<StateStore>,
        /// Stores from earlier `start` calls; their subscriptions stay live.
        superseded: Vec<Arc<StateStore>>,
    },
}

impl Model {
    fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store(&self) -> Option<Arc<StateStore>> {
        match self.lifecycle() {
            Lifecycle::Running { store, .. } => Some(store),
            Lifecycle::Configured => None,
        }
    }

    fn initial(&self) -> StateTree {
        self.initial
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl StateSource for Model {
    fn current(&self) -> StateTree {
        match self.store() {
            Some(store) => store.get_state(),
            None => self.initial(),
        }
    }

    fn dispatcher(&self) -> Option<Dispatcher> {
        self.store().map(|store| store.dispatcher())
    }
}

impl Tram {
    /// App with default options and no document.
    pub fn new() -> Self {
        Self::with_options(TramOptions::default())
    }

    /// App with `options` and no document; only `to_node`/`to_string` work.
    pub fn with_options(options: TramOptions) -> Self {
        Self::with_host(options, Arc::new(Headless))
    }

    /// App rendering into `host`.
    pub fn with_host(options: TramOptions, host: Arc<dyn Host>) -> Self {
        let routes = Arc::new(RouteTable::new(options.default_route.clone()));
        let model = Arc::new(Model {
            reducers: RwLock::new(BTreeMap::new()),
            initial: RwLock::new(StateTree::new()),
            lifecycle: RwLock::new(Lifecycle::Configured),
        });
        let renderer = PageRenderer::new(routes.clone(), model.clone());
        Self {
            options,
            routes,
            model,
            mounter: Arc::new(MountController::new(host, renderer)),
        }
    }

    pub fn options(&self) -> &TramOptions {
        &self.options
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        match self.model.lifecycle() {
            Lifecycle::Configured => Phase::Configured,
            Lifecycle::Running { .. } => Phase::Running,
        }
    }

    // ====================================================================
    // Routes
    // ====================================================================

    /// Register a page for `pattern`; the last registration wins.
    pub fn add_route<F>(&self, pattern: &str, page: F) -> &Self
    where
        F: Fn(&RenderState) -> Result<Renderable> + Send + Sync + 'static,
    {
        self.routes.add_route(pattern, page);
        self
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    // ====================================================================
    // Reducers & state
    // ====================================================================

    /// Register `reducer` for the `key` slice, starting at `initial`.
    ///
    /// Re-adding a key replaces both. Reducers added after `start` only
    /// take part in stores built by a later `start`.
    pub fn add_reducer<F>(&self, key: &str, reducer: F, initial: impl Into<Value>) -> &Self
    where
        F: Fn(&Value, &Action) -> Value + Send + Sync + 'static,
    {
        if self.phase() == Phase::Running {
            tracing::warn!(key, "reducer added after start; the running store will not use it");
        }
        self.model
            .reducers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), Arc::new(reducer));
        let mut tree = self.model.initial.write().unwrap_or_else(PoisonError::into_inner);
        *tree = tree.with(key, initial);
        self
    }

    /// Reducer registered under `key`.
    pub fn reducer(&self, key: &str) -> Option<Reducer> {
        self.model
            .reducers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Initial state accumulated by `add_reducer`.
    pub fn initial_state(&self) -> StateTree {
        self.model.initial()
    }

    /// Live store state while running, otherwise the initial state.
    pub fn state(&self) -> StateTree {
        self.model.current()
    }

    /// The store built by the latest `start`.
    pub fn store(&self) -> Option<Arc<StateStore>> {
        self.model.store()
    }

    /// Dispatch into the running store.
    pub fn dispatch(&self, action: &Action) -> Result<StateTree> {
        self.store().ok_or(TramError::NotStarted)?.dispatch(action)
    }

    // ====================================================================
    // Lifecycle
    // ====================================================================

    /// Build the store, mount once, and re-mount after every dispatch.
    ///
    /// With `path` set every render uses it; otherwise the host location
    /// is read on each render. If the first mount fails the app stays in
    /// its previous phase and nothing is subscribed.
    ///
    /// Calling `start` again builds another store and subscription; the
    /// earlier one keeps re-rendering on its own dispatches.
    pub fn start(
        &self,
        target: impl Into<MountTarget>,
        path: Option<&str>,
    ) -> Result<Arc<StateStore>> {
        let target = target.into();
        if self.mounter.host().document().is_none() {
            return Err(TramError::UnsupportedEnvironment(format!(
                "cannot start '{target}' without a document"
            )));
        }

        let reducers = self
            .model
            .reducers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let store = StateStore::new(reducers, &self.model.initial());

        let previous = {
            let mut lifecycle = self.model.lifecycle.write().unwrap_or_else(PoisonError::into_inner);
            let superseded = match &*lifecycle {
                Lifecycle::Configured => Vec::new(),
                Lifecycle::Running { store: old, superseded } => {
                    tracing::warn!(%target, "start called on a running app; the previous store stays subscribed");
                    let mut all = superseded.clone();
                    all.push(old.clone());
                    all
                }
            };
            std::mem::replace(
                &mut *lifecycle,
                Lifecycle::Running {
                    store: store.clone(),
                    superseded,
                },
            )
        };

        if let Err(err) = self.mounter.render(&target, path, None) {
            *self.model.lifecycle.write().unwrap_or_else(PoisonError::into_inner) = previous;
            return Err(err);
        }

        let mounter = Arc::downgrade(&self.mounter);
        let listener_target = target.clone();
        let listener_path = path.map(str::to_string);
        store.subscribe(move |state| {
            let Some(mounter) = mounter.upgrade() else {
                return Ok(());
            };
            mounter
                .render(&listener_target, listener_path.as_deref(), Some(state.clone()))
                .map(|_| ())
        });

        tracing::info!(%target, path = path.unwrap_or("<location>"), "app started");
        Ok(store)
    }

    /// Render once into `target` without subscribing.
    ///
    /// `state` replaces the current state for this render only.
    pub fn mount(
        &self,
        target: impl Into<MountTarget>,
        path: Option<&str>,
        state: Option<StateTree>,
    ) -> Result<NodeId> {
        self.mounter.render(&target.into(), path, state)
    }

    // ====================================================================
    // Rendering without a document
    // ====================================================================

    /// Render the page for `path` against `state`, or the current state.
    pub fn to_node(&self, path: &str, state: Option<StateTree>) -> Result<Renderable> {
        self.mounter.renderer().render(path, state)
    }

    /// [`to_node`](Self::to_node) serialized as HTML.
    pub fn to_string(&self, path: &str, state: Option<StateTree>) -> Result<String> {
        self.to_node(path, state).map(|node| node.to_html())
    }

    /// Template evaluator, optionally with custom components.
    pub fn html(registry: Option<Registry>) -> Html {
        Html::new(registry.unwrap_or_default())
    }
}

impl Default for Tram {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Tram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tram")
            .field("options", &self.options)
            .field("phase", &self.phase())
            .field("initial", &self.initial_state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, Element};
    use crate::host::Browser;
    use serde_json::json;

    fn counter(state: &Value, action: &Action) -> Value {
        match action.kind.as_str() {
            "add" => json!(state.as_i64().unwrap_or(0) + 1),
            _ => state.clone(),
        }
    }

    fn counter_page(s: &RenderState) -> Result<Renderable> {
        Ok(Renderable::text(
            s.get("counter").and_then(|b| b.text()).unwrap_or_default(),
        ))
    }

    fn browser_app() -> (Arc<Document>, Tram) {
        let doc = Arc::new(Document::new());
        let host = Browser::new(doc.clone(), "http://localhost/").unwrap();
        (doc, Tram::with_host(TramOptions::default(), Arc::new(host)))
    }

    // ====================================================================
    // Configuration
    // ====================================================================

    #[test]
    fn new_app_is_configured() {
        let app = Tram::new();
        assert_eq!(app.phase(), Phase::Configured);
        assert!(app.store().is_none());
        assert_eq!(app.options().default_route, "/404");
        assert_eq!(app.routes().default_route(), "/404");
    }

    #[test]
    fn add_reducer_records_reducer_and_initial_state() {
        let app = Tram::new();
        app.add_reducer("counter", counter, 2);

        assert_eq!(app.initial_state().get("counter"), Some(&json!(2)));
        let reducer = app.reducer("counter").unwrap();
        assert_eq!(reducer(&json!(2), &Action::new("add")), json!(3));
        assert!(app.reducer("other").is_none());
    }

    #[test]
    fn re_adding_reducer_replaces_initial_state() {
        let app = Tram::new();
        app.add_reducer("counter", counter, 2)
            .add_reducer("counter", counter, 10);
        assert_eq!(app.initial_state().get("counter"), Some(&json!(10)));
        assert_eq!(app.initial_state().len(), 1);
    }

    #[test]
    fn dispatch_before_start_fails() {
        let app = Tram::new();
        assert!(matches!(
            app.dispatch(&Action::new("add")),
            Err(TramError::NotStarted)
        ));
    }

    // ====================================================================
    // Lifecycle
    // ====================================================================

    #[test]
    fn start_mounts_and_rerenders_on_dispatch() {
        let (doc, app) = browser_app();
        app.add_reducer("counter", counter, 2)
            .add_route("/", counter_page);

        let store = app.start("body", None).unwrap();
        assert_eq!(app.phase(), Phase::Running);
        assert_eq!(doc.text_content(doc.body()), "2");

        store.dispatch(&Action::new("add")).unwrap();
        assert_eq!(doc.text_content(doc.body()), "3");
        assert_eq!(app.state().get("counter"), Some(&json!(3)));
    }

    #[test]
    fn failed_start_stays_configured() {
        let (_doc, app) = browser_app();
        app.add_route("/", counter_page);

        let err = app.start("#missing", None).unwrap_err();
        assert!(matches!(err, TramError::TargetNotFound(_)));
        assert_eq!(app.phase(), Phase::Configured);
    }

    #[test]
    fn headless_start_is_unsupported() {
        let app = Tram::new();
        app.add_route("/", counter_page);
        assert!(matches!(
            app.start("body", Some("/")),
            Err(TramError::UnsupportedEnvironment(_))
        ));
        assert_eq!(app.phase(), Phase::Configured);
    }

    /// Host without a document that records the app phase at each lookup.
    struct PhaseRecordingHost {
        app: std::sync::OnceLock<std::sync::Weak<Tram>>,
        seen: std::sync::Mutex<Vec<Phase>>,
    }

    impl Host for PhaseRecordingHost {
        fn document(&self) -> Option<Arc<Document>> {
            if let Some(app) = self.app.get().and_then(std::sync::Weak::upgrade) {
                self.seen.lock().unwrap().push(app.phase());
            }
            None
        }

        fn location(&self) -> Option<String> {
            None
        }
    }

    #[test]
    fn start_checks_for_a_document_before_building_a_store() {
        let host = Arc::new(PhaseRecordingHost {
            app: std::sync::OnceLock::new(),
            seen: std::sync::Mutex::new(Vec::new()),
        });
        let app = Arc::new(Tram::with_host(TramOptions::default(), host.clone()));
        host.app.set(Arc::downgrade(&app)).unwrap();
        app.add_route("/", counter_page);

        let err = app.start("body", Some("/")).unwrap_err();
        assert!(matches!(err, TramError::UnsupportedEnvironment(_)));
        assert_eq!(*host.seen.lock().unwrap(), vec![Phase::Configured]);
        assert!(app.store().is_none());
    }

    #[test]
    fn reducer_added_after_start_is_not_live() {
        let (_doc, app) = browser_app();
        app.add_reducer("counter", counter, 2).add_route("/", counter_page);
        let store = app.start("body", None).unwrap();

        app.add_reducer("late", counter, 0);
        assert!(!store.get_state().contains("late"));
        assert!(app.initial_state().contains("late"));
    }

    #[test]
    fn second_start_keeps_first_subscription() {
        let (doc, app) = browser_app();
        app.add_reducer("counter", counter, 2).add_route("/", counter_page);

        let first = app.start("body", None).unwrap();
        let second = app.start("body", None).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&app.store().unwrap(), &second));

        first.dispatch(&Action::new("add")).unwrap();
        assert_eq!(doc.text_content(doc.body()), "3");
        assert_eq!(first.subscriber_count(), 1);
    }

    // ====================================================================
    // Rendering
    // ====================================================================

    #[test]
    fn to_node_uses_initial_state_before_start() {
        let app = Tram::new();
        app.add_reducer("counter", counter, 2).add_route("/", counter_page);
        assert_eq!(app.to_node("/", None).unwrap(), Renderable::text("2"));
    }

    #[test]
    fn to_node_prefers_override() {
        let app = Tram::new();
        app.add_reducer("counter", counter, 2).add_route("/", counter_page);
        let state: StateTree = [("counter", 7)].into_iter().collect();
        assert_eq!(app.to_node("/", Some(state)).unwrap(), Renderable::text("7"));
    }

    #[test]
    fn to_string_matches_to_node() {
        let app = Tram::new();
        app.add_route("/", |_| {
            Tram::html(None).render("<p class=\"x\">a &amp; b</p>", vec![])
        });
        let node = app.to_node("/", None).unwrap();
        assert_eq!(app.to_string("/", None).unwrap(), node.to_html());
        assert_eq!(app.to_string("/", None).unwrap(), "<p class=\"x\">a &amp; b</p>");
    }

    #[test]
    fn mount_is_one_shot() {
        let (doc, app) = browser_app();
        app.add_reducer("counter", counter, 2).add_route("/", counter_page);
        let container = app.mount("body", Some("/"), None).unwrap();
        assert_eq!(doc.text_content(container), "2");
        assert_eq!(app.phase(), Phase::Configured);
    }

    #[test]
    fn mount_takes_a_state() {
        let (doc, app) = browser_app();
        app.add_reducer("counter", counter, 2).add_route("/", counter_page);
        let state: StateTree = [("counter", 9)].into_iter().collect();

        let container = app.mount("body", Some("/"), Some(state)).unwrap();
        assert_eq!(doc.text_content(container), "9");
        assert_eq!(app.state().get("counter"), Some(&json!(2)));
    }

    #[test]
    fn text_page_after_element_page_matches_fresh_mount() {
        let (doc, app) = browser_app();
        app.add_route("/", |_| Ok(Renderable::Element(Element::new("section").attr("id", "x"))))
            .add_route("/b", |_| Ok(Renderable::text("plain")));

        app.mount("body", Some("/"), None).unwrap();
        app.mount("body", Some("/b"), None).unwrap();
        let remounted = doc.outer_html(doc.root());

        let (fresh_doc, fresh) = browser_app();
        fresh.add_route("/b", |_| Ok(Renderable::text("plain")));
        fresh.mount("body", Some("/b"), None).unwrap();

        assert_eq!(remounted, fresh_doc.outer_html(fresh_doc.root()));
        assert_eq!(remounted, "<html><body><div>plain</div></body></html>");
    }
}
