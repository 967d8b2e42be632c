//! Tram: a minimal single-page-application runtime.
//!
//! Pages are functions of state; state changes only through reducers; the
//! mounted page is re-rendered and reconciled in place after every dispatch.
//!
//! # Pieces
//!
//! - [`RouteTable`]: path patterns (`/users/:id`, `/docs/*`) to pages, with
//!   a default page for everything else
//! - [`StateStore`]: reducer-driven state tree with subscriptions
//! - [`PageRenderer`]: runs the matched page against params and state
//! - [`MountController`]: renders into a [`Document`] through a [`Host`],
//!   morphing one persistent container child
//! - [`Tram`]: the app facade tying them together
//!
//! # Example
//!
//! ```ignore
//! use tram::{html, Action, Renderable, Tram};
//! use serde_json::json;
//!
//! let app = Tram::new();
//! app.add_reducer("votes", |n, action| match action.kind.as_str() {
//!     "up" => json!(n.as_i64().unwrap_or(0) + 1),
//!     _ => n.clone(),
//! }, 0);
//! app.add_route("/404", |_| html!(Tram::html(None), "<h1>not found</h1>"));
//! app.add_route("/:id", |s| {
//!     html!(Tram::html(None), "<p>{} has {} votes</p>", s.get("id"), s.get("votes"))
//! });
//!
//! assert_eq!(app.to_string("/tram", None)?, "<p>tram has 0 votes</p>");
//! ```

pub mod app;
pub mod config;
pub mod dom;
pub mod error;
pub mod host;
pub mod html;
pub mod mount;
pub mod render;
pub mod router;
pub mod store;
pub mod trie;
pub mod value;

// Re-export primary types at crate root.
pub use app::{Phase, Tram};
pub use config::{TramOptions, DEFAULT_ROUTE};
pub use dom::{Document, Element, Event, EventHandler, Node, NodeId, Renderable};
pub use error::{Result, TemplateError, TramError};
pub use host::{Browser, Headless, Host};
pub use html::{Component, Html, Registry, Slot};
pub use mount::{MountController, MountTarget};
pub use render::{Binding, PageRenderer, RenderState, StateSource};
pub use router::{Page, Params, RouteTable};
pub use store::{Dispatcher, Reducer, StateStore};
pub use value::{Action, StateTree, SubscriptionId};

/// Evaluate a template with one value per `{}` placeholder.
///
/// `html!(html, "<p>{}</p>", value)` is
/// `html.render("<p>{}</p>", vec![Slot::from(value)])`.
#[macro_export]
macro_rules! html {
    ($html:expr, $markup:expr $(, $slot:expr)* $(,)?) => {
        $html.render($markup, ::std::vec![$(::std::convert::Into::<$crate::Slot>::into($slot)),*])
    };
}
