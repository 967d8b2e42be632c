//! Host environments a [`MountController`](crate::MountController) renders into.

use std::sync::{Arc, PoisonError, RwLock};

use url::{Position, Url};

use crate::dom::Document;
use crate::error::Result;

/// Access to the page the app is mounted in.
pub trait Host: Send + Sync {
    /// The live document, or `None` when running without one.
    fn document(&self) -> Option<Arc<Document>>;

    /// Current location as a path with query and fragment, e.g.
    /// `/users/7?tab=posts`.
    fn location(&self) -> Option<String>;
}

/// A document plus a navigable location.
#[derive(Debug)]
pub struct Browser {
    document: Arc<Document>,
    location: RwLock<Url>,
}

impl Browser {
    /// Host `document` at the absolute URL `href`.
    pub fn new(document: Arc<Document>, href: &str) -> Result<Self> {
        Ok(Self {
            document,
            location: RwLock::new(Url::parse(href)?),
        })
    }

    /// Move to `href`, resolved against the current location.
    ///
    /// Does not re-render; mount or dispatch afterwards.
    pub fn navigate(&self, href: &str) -> Result<()> {
        let mut location = self.location.write().unwrap_or_else(PoisonError::into_inner);
        let next = location.join(href)?;
        tracing::debug!(from = %*location, to = %next, "navigating");
        *location = next;
        Ok(())
    }

    /// Full current URL.
    pub fn href(&self) -> String {
        self.location
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .to_string()
    }
}

impl Host for Browser {
    fn document(&self) -> Option<Arc<Document>> {
        Some(self.document.clone())
    }

    fn location(&self) -> Option<String> {
        let location = self.location.read().unwrap_or_else(PoisonError::into_inner);
        Some(location[Position::BeforePath..].to_string())
    }
}

/// No document and no location: server-side rendering only.
#[derive(Debug, Clone, Copy, Default)]
pub struct Headless;

impl Host for Headless {
    fn document(&self) -> Option<Arc<Document>> {
        None
    }

    fn location(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TramError;

    #[test]
    fn location_strips_origin() {
        let host = Browser::new(Arc::new(Document::new()), "https://example.com:8080/a/b?x=1#top")
            .unwrap();
        assert_eq!(host.location().as_deref(), Some("/a/b?x=1#top"));
    }

    #[test]
    fn navigate_resolves_relative() {
        let host = Browser::new(Arc::new(Document::new()), "http://localhost/users/7").unwrap();
        host.navigate("8").unwrap();
        assert_eq!(host.location().as_deref(), Some("/users/8"));
        host.navigate("/about").unwrap();
        assert_eq!(host.href(), "http://localhost/about");
    }

    #[test]
    fn rejects_relative_start() {
        let err = Browser::new(Arc::new(Document::new()), "/not-absolute").unwrap_err();
        assert!(matches!(err, TramError::InvalidLocation(_)));
    }

    #[test]
    fn headless_has_nothing() {
        assert!(Headless.document().is_none());
        assert!(Headless.location().is_none());
    }
}
