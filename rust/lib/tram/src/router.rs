use std::fmt;
use std::sync::Arc;

use crate::dom::Renderable;
use crate::error::{Result, TramError};
use crate::render::RenderState;
use crate::trie::{parse_pattern, RouteTrie, Segment};

/// A page: renders the state it is given into markup.
pub type Page = Arc<dyn Fn(&RenderState) -> Result<Renderable> + Send + Sync>;

/// Parameter name under which a trailing `*` segment is captured.
pub const WILDCARD: &str = "wildcard";

// ── Params ──

/// Path parameters captured by a route match, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    /// Empty params.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Get a value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ── RouteEntry ──

/// A registered pattern and its page.
#[derive(Clone)]
pub struct RouteEntry {
    pattern: String,
    names: Vec<String>,
    page: Page,
}

impl RouteEntry {
    fn new(pattern: &str, page: Page) -> Self {
        let names = parse_pattern(pattern)
            .into_iter()
            .filter_map(|seg| match seg {
                Segment::Param(name) => Some(name.to_string()),
                Segment::CatchAll => Some(WILDCARD.to_string()),
                Segment::Literal(_) => None,
            })
            .collect();
        Self {
            pattern: pattern.to_string(),
            names,
            page,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Parameter names in pattern order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn page(&self) -> &Page {
        &self.page
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("pattern", &self.pattern)
            .field("names", &self.names)
            .finish()
    }
}

/// Outcome of [`RouteTable::resolve`].
#[derive(Clone)]
pub struct Resolved {
    pub page: Page,
    pub params: Params,
    /// Pattern the page was registered under.
    pub pattern: String,
    /// True when nothing matched and the default route was used.
    pub fallback: bool,
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("pattern", &self.pattern)
            .field("params", &self.params)
            .field("fallback", &self.fallback)
            .finish()
    }
}

// ── RouteTable ──

/// Path-pattern router with a default fallback page.
///
/// # Examples
///
/// ```ignore
/// let routes = RouteTable::new("/404");
/// routes.add_route("/404", |_| Ok(Renderable::text("missing")));
/// routes.add_route("/users/:id", |s| Ok(Renderable::text(s.param("id").unwrap_or_default())));
///
/// let hit = routes.resolve("/users/7?tab=posts")?;
/// assert_eq!(hit.params.get("id"), Some("7"));
/// assert!(routes.resolve("/nope")?.fallback);
/// ```
pub struct RouteTable {
    trie: RouteTrie<Arc<RouteEntry>>,
    default_route: String,
}

impl RouteTable {
    /// Create an empty table falling back to `default_route`.
    pub fn new(default_route: impl Into<String>) -> Self {
        Self {
            trie: RouteTrie::new(),
            default_route: default_route.into(),
        }
    }

    /// Pattern rendered when no route matches.
    pub fn default_route(&self) -> &str {
        &self.default_route
    }

    /// Register `page` under `pattern`, replacing any page registered
    /// under the same pattern shape. Returns `true` if one was replaced.
    pub fn add_route<F>(&self, pattern: &str, page: F) -> bool
    where
        F: Fn(&RenderState) -> Result<Renderable> + Send + Sync + 'static,
    {
        self.add_page(pattern, Arc::new(page))
    }

    /// Register an already-erased page.
    pub fn add_page(&self, pattern: &str, page: Page) -> bool {
        let entry = Arc::new(RouteEntry::new(pattern, page));
        let replaced = self.trie.insert(pattern, entry);
        if let Some(ref old) = replaced {
            tracing::debug!(pattern, previous = %old.pattern, "route replaced");
        }
        replaced.is_some()
    }

    /// Check if a page is registered under the exact pattern shape.
    pub fn has_route(&self, pattern: &str) -> bool {
        self.trie.has_pattern(pattern)
    }

    /// Entry registered under the exact pattern shape.
    pub fn entry(&self, pattern: &str) -> Option<Arc<RouteEntry>> {
        self.trie.get(pattern)
    }

    /// Match `path` to a page.
    ///
    /// Query string and fragment are ignored. On no match the default
    /// route's page is returned with no params; if that pattern was never
    /// registered this fails with [`TramError::RouteNotFound`].
    pub fn resolve(&self, path: &str) -> Result<Resolved> {
        let route = path.split(['?', '#']).next().unwrap_or_default();

        if let Some((entry, captured)) = self.trie.match_path(route) {
            let params = entry.names.iter().cloned().zip(captured).collect();
            tracing::debug!(path, pattern = %entry.pattern, "route matched");
            return Ok(Resolved {
                page: entry.page.clone(),
                params,
                pattern: entry.pattern.clone(),
                fallback: false,
            });
        }

        match self.trie.get(&self.default_route) {
            Some(entry) => {
                tracing::warn!(path, default_route = %self.default_route, "no route matched, using default");
                Ok(Resolved {
                    page: entry.page.clone(),
                    params: Params::empty(),
                    pattern: entry.pattern.clone(),
                    fallback: true,
                })
            }
            None => {
                tracing::warn!(path, default_route = %self.default_route, "no route matched and default route is not registered");
                Err(TramError::RouteNotFound {
                    path: path.to_string(),
                    default_route: self.default_route.clone(),
                })
            }
        }
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("default_route", &self.default_route)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::StateTree;

    fn page(label: &'static str) -> impl Fn(&RenderState) -> Result<Renderable> + Send + Sync {
        move |_| Ok(Renderable::text(label))
    }

    fn render(resolved: &Resolved) -> String {
        let state = RenderState::new(StateTree::new()).with_params(resolved.params.clone());
        (resolved.page)(&state).unwrap().text_content()
    }

    // ====================================================================
    // Matching
    // ====================================================================

    #[test]
    fn resolves_registered_pattern() {
        let routes = RouteTable::new("/404");
        routes.add_route("/", page("home"));
        routes.add_route("/about", page("about"));

        let hit = routes.resolve("/about").unwrap();
        assert_eq!(render(&hit), "about");
        assert!(!hit.fallback);
        assert!(hit.params.is_empty());
        assert_eq!(render(&routes.resolve("/").unwrap()), "home");
    }

    #[test]
    fn extracts_params_by_name() {
        let routes = RouteTable::new("/404");
        routes.add_route("/users/:user/posts/:post", page("post"));

        let hit = routes.resolve("/users/ada/posts/12").unwrap();
        assert_eq!(hit.params.get("user"), Some("ada"));
        assert_eq!(hit.params.get("post"), Some("12"));
        assert_eq!(
            hit.params.iter().collect::<Vec<_>>(),
            vec![("user", "ada"), ("post", "12")]
        );
    }

    #[test]
    fn wildcard_param() {
        let routes = RouteTable::new("/404");
        routes.add_route("/docs/*", page("docs"));

        let hit = routes.resolve("/docs/guide/intro").unwrap();
        assert_eq!(hit.params.get(WILDCARD), Some("guide/intro"));
    }

    #[test]
    fn query_and_fragment_are_ignored() {
        let routes = RouteTable::new("/404");
        routes.add_route("/search", page("search"));

        assert_eq!(render(&routes.resolve("/search?q=tram").unwrap()), "search");
        assert_eq!(render(&routes.resolve("/search#top").unwrap()), "search");
    }

    #[test]
    fn params_are_not_coerced() {
        let routes = RouteTable::new("/404");
        routes.add_route("/:id", page("id"));
        assert_eq!(routes.resolve("/007").unwrap().params.get("id"), Some("007"));
    }

    // ====================================================================
    // Default route
    // ====================================================================

    #[test]
    fn unmatched_path_uses_default_route() {
        let routes = RouteTable::new("/404");
        routes.add_route("/404", page("missing"));
        routes.add_route("/good", page("good"));

        let hit = routes.resolve("/bad").unwrap();
        assert!(hit.fallback);
        assert_eq!(hit.pattern, "/404");
        assert_eq!(render(&hit), "missing");
    }

    #[test]
    fn default_route_gets_no_params() {
        let routes = RouteTable::new("/err/:code");
        routes.add_route("/err/:code", page("error"));

        let hit = routes.resolve("/a/b/c").unwrap();
        assert!(hit.fallback);
        assert!(hit.params.is_empty());
    }

    #[test]
    fn missing_default_route_fails() {
        let routes = RouteTable::new("/200");
        routes.add_route("/404", page("missing"));

        let err = routes.resolve("/").unwrap_err();
        assert!(matches!(
            err,
            TramError::RouteNotFound { ref path, ref default_route }
                if path == "/" && default_route == "/200"
        ));
    }

    // ====================================================================
    // Registration
    // ====================================================================

    #[test]
    fn re_registering_overwrites() {
        let routes = RouteTable::new("/404");
        assert!(!routes.add_route("/a", page("first")));
        assert!(routes.add_route("/a", page("second")));
        assert_eq!(render(&routes.resolve("/a").unwrap()), "second");
    }

    #[test]
    fn latest_param_names_win() {
        let routes = RouteTable::new("/404");
        routes.add_route("/:a", page("a"));
        routes.add_route("/:b", page("b"));

        let hit = routes.resolve("/x").unwrap();
        assert_eq!(hit.params.get("b"), Some("x"));
        assert_eq!(hit.params.get("a"), None);
    }

    #[test]
    fn entry_exposes_names() {
        let routes = RouteTable::new("/404");
        routes.add_route("/u/:id/*", page("u"));
        let entry = routes.entry("/u/:id/*").unwrap();
        assert_eq!(entry.pattern(), "/u/:id/*");
        assert_eq!(entry.names(), ["id".to_string(), WILDCARD.to_string()]);
        assert!(routes.has_route("/u/:other/*"));
    }
}
