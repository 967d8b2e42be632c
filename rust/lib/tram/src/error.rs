use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, TramError>;

// ── TramError ───────────────────────────────────────────────────────

/// Every failure the runtime surfaces to its caller.
///
/// Nothing is retried internally: all operations are synchronous, so an
/// error always describes the call that just returned it.
#[derive(Error, Debug)]
pub enum TramError {
    /// No pattern matched and the default route was never registered.
    #[error("no route matches '{path}' and default route '{default_route}' is not registered")]
    RouteNotFound { path: String, default_route: String },

    /// A mount selector matched nothing, or a node target is not live.
    #[error("mount target not found: {0}")]
    TargetNotFound(String),

    /// A DOM-dependent operation ran on a host without a document.
    #[error("{0}; are you running on a server? use to_string instead")]
    UnsupportedEnvironment(String),

    /// Template markup could not be evaluated.
    #[error("template: {0}")]
    Template(#[from] TemplateError),

    /// A reducer tried to dispatch while the store was reducing.
    #[error("dispatch called while reducers are running")]
    ReentrantDispatch,

    /// A dispatch handle outlived the store it was created from.
    #[error("state store has been dropped")]
    StoreDropped,

    /// The app has no store yet; call `start` first.
    #[error("app is not running; call start first")]
    NotStarted,

    /// A host location could not be parsed.
    #[error("invalid location: {0}")]
    InvalidLocation(#[from] url::ParseError),
}

// ── TemplateError ───────────────────────────────────────────────────

/// Markup parse and evaluation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("syntax error at byte {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("unclosed tag <{0}>")]
    Unclosed(String),

    #[error("expected </{expected}>, found </{found}>")]
    Mismatched { expected: String, found: String },

    #[error("template has {expected} placeholders but {got} values were given")]
    SlotCount { expected: usize, got: usize },

    #[error("a {0} cannot be interpolated into an attribute value")]
    MisplacedSlot(&'static str),

    #[error("template must have exactly one root, found {0}")]
    RootCount(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_environment_points_to_string_output() {
        let err = TramError::UnsupportedEnvironment("no document".into());
        let msg = err.to_string();
        assert!(msg.starts_with("no document"));
        assert!(msg.contains("to_string"));
    }

    #[test]
    fn route_not_found_names_both_paths() {
        let err = TramError::RouteNotFound {
            path: "/missing".into(),
            default_route: "/404".into(),
        };
        assert_eq!(
            err.to_string(),
            "no route matches '/missing' and default route '/404' is not registered"
        );
    }

    #[test]
    fn template_error_converts() {
        let err: TramError = TemplateError::RootCount(2).into();
        assert!(matches!(err, TramError::Template(TemplateError::RootCount(2))));
        assert_eq!(
            err.to_string(),
            "template: template must have exactly one root, found 2"
        );
    }
}
