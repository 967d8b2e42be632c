use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::dom::Renderable;
use crate::error::{Result, TramError};
use crate::html::Slot;
use crate::router::{Params, RouteTable};
use crate::store::Dispatcher;
use crate::value::{Action, StateTree};

/// Key under which the dispatch handle is looked up.
pub const DISPATCH_KEY: &str = "dispatch";

// ── RenderState ──

/// Everything a page sees: the dispatch handle, path params and state.
///
/// [`RenderState::get`] looks names up with a fixed precedence: the
/// dispatch handle, then path params, then state slices.
#[derive(Clone, Debug, Default)]
pub struct RenderState {
    dispatch: Option<Dispatcher>,
    params: Params,
    state: StateTree,
}

impl RenderState {
    pub fn new(state: StateTree) -> Self {
        Self {
            dispatch: None,
            params: Params::empty(),
            state,
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_dispatcher(mut self, dispatch: Option<Dispatcher>) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Look up `key` across dispatch, params and state, in that order.
    pub fn get(&self, key: &str) -> Option<Binding<'_>> {
        if key == DISPATCH_KEY {
            if let Some(ref dispatch) = self.dispatch {
                return Some(Binding::Dispatch(dispatch));
            }
        }
        if let Some(value) = self.params.get(key) {
            return Some(Binding::Param(value));
        }
        self.state.get(key).map(Binding::State)
    }

    /// A path parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// A state slice, ignoring params of the same name.
    pub fn slice(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    pub fn state(&self) -> &StateTree {
        &self.state
    }

    pub fn dispatcher(&self) -> Option<&Dispatcher> {
        self.dispatch.as_ref()
    }

    /// Dispatch through the running store.
    pub fn dispatch(&self, action: &Action) -> Result<StateTree> {
        self.dispatch
            .as_ref()
            .ok_or(TramError::NotStarted)?
            .dispatch(action)
    }
}

/// A value found by [`RenderState::get`].
#[derive(Debug, Clone, Copy)]
pub enum Binding<'a> {
    Dispatch(&'a Dispatcher),
    Param(&'a str),
    State(&'a Value),
}

impl Binding<'_> {
    /// Text form: params as-is, string slices unquoted, other slices as
    /// JSON. The dispatch handle has none.
    pub fn text(&self) -> Option<String> {
        match *self {
            Binding::Dispatch(_) => None,
            Binding::Param(s) => Some(s.to_string()),
            Binding::State(Value::String(s)) => Some(s.clone()),
            Binding::State(v) => Some(v.to_string()),
        }
    }

    /// JSON form. The dispatch handle has none.
    pub fn value(&self) -> Option<Value> {
        match *self {
            Binding::Dispatch(_) => None,
            Binding::Param(s) => Some(Value::String(s.to_string())),
            Binding::State(v) => Some(v.clone()),
        }
    }
}

impl From<Binding<'_>> for Slot {
    fn from(binding: Binding<'_>) -> Self {
        match binding {
            Binding::Dispatch(_) => Slot::Empty,
            Binding::Param(s) => Slot::Text(s.to_string()),
            Binding::State(v) => Slot::from(v),
        }
    }
}

// ── StateSource ──

/// Where the renderer reads state from when no override is given.
pub trait StateSource: Send + Sync {
    /// Current state tree.
    fn current(&self) -> StateTree;

    /// Dispatch handle, once a store exists.
    fn dispatcher(&self) -> Option<Dispatcher>;
}

/// A fixed tree with no store behind it.
impl StateSource for StateTree {
    fn current(&self) -> StateTree {
        self.clone()
    }

    fn dispatcher(&self) -> Option<Dispatcher> {
        None
    }
}

// ── PageRenderer ──

/// Resolves a path and runs its page against the right state.
#[derive(Clone)]
pub struct PageRenderer {
    routes: Arc<RouteTable>,
    source: Arc<dyn StateSource>,
}

impl PageRenderer {
    pub fn new(routes: Arc<RouteTable>, source: Arc<dyn StateSource>) -> Self {
        Self { routes, source }
    }

    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    /// Render the page for `path`.
    ///
    /// With `state` the source's state is ignored for this call; the
    /// dispatch handle is still attached when one exists.
    pub fn render(&self, path: &str, state: Option<StateTree>) -> Result<Renderable> {
        let resolved = self.routes.resolve(path)?;
        let state = state.unwrap_or_else(|| self.source.current());
        let render_state = RenderState::new(state)
            .with_params(resolved.params)
            .with_dispatcher(self.source.dispatcher());
        tracing::trace!(path, pattern = %resolved.pattern, "rendering page");
        (resolved.page)(&render_state)
    }
}

impl fmt::Debug for PageRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageRenderer")
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}
