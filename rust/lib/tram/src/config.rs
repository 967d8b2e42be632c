use serde::Deserialize;

/// Default fallback pattern used when no route matches.
pub const DEFAULT_ROUTE: &str = "/404";

/// Construction options for [`Tram`](crate::Tram).
///
/// Deserializable so hosts can keep app options next to the rest of their
/// configuration; missing fields fall back to [`Default`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TramOptions {
    /// Pattern whose page renders when nothing else matches.
    pub default_route: String,
}

impl Default for TramOptions {
    fn default() -> Self {
        Self {
            default_route: DEFAULT_ROUTE.to_string(),
        }
    }
}

impl TramOptions {
    /// Override the fallback pattern.
    pub fn with_default_route(mut self, pattern: impl Into<String>) -> Self {
        self.default_route = pattern.into();
        self
    }
}
