use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A convenience `Result` alias using [`CrewmasterError`].
pub type CrewmasterResult<T> = Result<T, CrewmasterError>;

/// Top-level error type for crew creation.
///
/// Each leaf variant corresponds to one failure kind of the creation
/// pipeline. [`CrewmasterError::context`] wraps an error in `Context`, which
/// keeps the kind of the wrapped error and renders as
/// `<kind label>: <outer cause>: ...: <leaf message>`.
#[derive(Error, Debug)]
pub enum CrewmasterError {
    /// The task description could not be analyzed (empty, too long).
    /// User-facing; fixable by rephrasing.
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// A capability tag is not present in the tool registry.
    #[error("Unknown capability: {0}")]
    UnknownCapability(String),

    /// A capability tag was registered twice without an explicit override.
    #[error("Duplicate capability: {0}")]
    DuplicateCapability(String),

    /// The agent designer hit an invariant violation.
    #[error("Design error: {0}")]
    Design(String),

    /// The crew orchestrator produced a structurally invalid crew.
    #[error("Assembly error: {0}")]
    Assembly(String),

    /// The language-model provider failed (transport, auth, timeout, bad reply).
    #[error("Provider error: {0}")]
    Provider(String),

    /// The agent/crew store failed or a record was not found.
    #[error("Store error: {0}")]
    Store(String),

    /// An identifier or crew name is already taken.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An error annotated with the operation that was running when it happened.
    #[error("{}", render_context(.cause, .source))]
    Context {
        cause: String,
        source: Box<CrewmasterError>,
    },
}

fn render_context(cause: &str, source: &CrewmasterError) -> String {
    let mut chain = vec![cause.to_string()];
    chain.extend(source.causes());
    format!("{}: {}", source.root().label(), chain.join(": "))
}

/// Serializable taxonomy kind of a [`CrewmasterError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Analysis,
    UnknownCapability,
    DuplicateCapability,
    Design,
    Assembly,
    Provider,
    Store,
    Conflict,
    Config,
    Serialization,
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Analysis => "analysis",
            ErrorKind::UnknownCapability => "unknown_capability",
            ErrorKind::DuplicateCapability => "duplicate_capability",
            ErrorKind::Design => "design",
            ErrorKind::Assembly => "assembly",
            ErrorKind::Provider => "provider",
            ErrorKind::Store => "store",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Config => "config",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Io => "io",
        };
        write!(f, "{s}")
    }
}

impl CrewmasterError {
    /// The taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CrewmasterError::Analysis(_) => ErrorKind::Analysis,
            CrewmasterError::UnknownCapability(_) => ErrorKind::UnknownCapability,
            CrewmasterError::DuplicateCapability(_) => ErrorKind::DuplicateCapability,
            CrewmasterError::Design(_) => ErrorKind::Design,
            CrewmasterError::Assembly(_) => ErrorKind::Assembly,
            CrewmasterError::Provider(_) => ErrorKind::Provider,
            CrewmasterError::Store(_) => ErrorKind::Store,
            CrewmasterError::Conflict(_) => ErrorKind::Conflict,
            CrewmasterError::Config(_) => ErrorKind::Config,
            CrewmasterError::Json(_) => ErrorKind::Serialization,
            CrewmasterError::Io(_) => ErrorKind::Io,
            CrewmasterError::Context { source, .. } => source.kind(),
        }
    }

    /// The innermost error, with every context layer removed.
    pub fn root(&self) -> &CrewmasterError {
        let mut current = self;
        while let CrewmasterError::Context { source, .. } = current {
            current = source;
        }
        current
    }

    /// Cause chain, outermost context first and the leaf message last.
    pub fn causes(&self) -> Vec<String> {
        let mut causes = Vec::new();
        let mut current = self;
        loop {
            match current {
                CrewmasterError::Context { cause, source } => {
                    causes.push(cause.clone());
                    current = source;
                }
                leaf => {
                    causes.push(leaf.leaf_message());
                    return causes;
                }
            }
        }
    }

    fn label(&self) -> &'static str {
        match self {
            CrewmasterError::Analysis(_) => "Analysis error",
            CrewmasterError::UnknownCapability(_) => "Unknown capability",
            CrewmasterError::DuplicateCapability(_) => "Duplicate capability",
            CrewmasterError::Design(_) => "Design error",
            CrewmasterError::Assembly(_) => "Assembly error",
            CrewmasterError::Provider(_) => "Provider error",
            CrewmasterError::Store(_) => "Store error",
            CrewmasterError::Conflict(_) => "Conflict",
            CrewmasterError::Config(_) => "Config error",
            CrewmasterError::Json(_) => "JSON error",
            CrewmasterError::Io(_) => "IO error",
            CrewmasterError::Context { source, .. } => source.label(),
        }
    }

    fn leaf_message(&self) -> String {
        match self {
            CrewmasterError::Analysis(m)
            | CrewmasterError::UnknownCapability(m)
            | CrewmasterError::DuplicateCapability(m)
            | CrewmasterError::Design(m)
            | CrewmasterError::Assembly(m)
            | CrewmasterError::Provider(m)
            | CrewmasterError::Store(m)
            | CrewmasterError::Conflict(m)
            | CrewmasterError::Config(m) => m.clone(),
            CrewmasterError::Json(e) => e.to_string(),
            CrewmasterError::Io(e) => e.to_string(),
            CrewmasterError::Context { source, .. } => source.leaf_message(),
        }
    }

    /// Errors that indicate a bug in pure computation rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(
            self.root(),
            CrewmasterError::Design(_) | CrewmasterError::Assembly(_)
        )
    }

    /// Errors the caller can fix by changing the request.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self.root(),
            CrewmasterError::Analysis(_) | CrewmasterError::Conflict(_)
        )
    }

    /// Wrap the error with the operation that was running, keeping the kind.
    pub fn context(self, cause: impl std::fmt::Display) -> Self {
        CrewmasterError::Context {
            cause: cause.to_string(),
            source: Box::new(self),
        }
    }
}

/// Structured failure surfaced to callers when a crew cannot be created.
///
/// Never accompanied by a partial crew.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationFailure {
    pub kind: ErrorKind,
    pub message: String,
    /// Cause chain, outermost first.
    pub causes: Vec<String>,
}

impl From<&CrewmasterError> for CreationFailure {
    fn from(err: &CrewmasterError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            causes: err.causes(),
        }
    }
}

impl std::fmt::Display for CreationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            CrewmasterError::Analysis("empty".into()).kind(),
            ErrorKind::Analysis
        );
        assert_eq!(
            CrewmasterError::UnknownCapability("vision".into()).kind(),
            ErrorKind::UnknownCapability
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(CrewmasterError::from(io).kind(), ErrorKind::Io);
    }

    #[test]
    fn test_internal_and_user_facing() {
        assert!(CrewmasterError::Design("x".into()).is_internal());
        assert!(CrewmasterError::Assembly("x".into()).is_internal());
        assert!(!CrewmasterError::Provider("x".into()).is_internal());
        assert!(CrewmasterError::Analysis("x".into()).is_user_facing());
        assert!(!CrewmasterError::Store("x".into()).is_user_facing());
    }

    #[test]
    fn test_context_builds_cause_chain() {
        let err = CrewmasterError::Provider("503 Service Unavailable".into())
            .context("model-backed analysis failed");
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert_eq!(
            err.to_string(),
            "Provider error: model-backed analysis failed: 503 Service Unavailable"
        );
    }

    #[test]
    fn test_creation_failure_from_error() {
        let err = CrewmasterError::Assembly("dependency cycle".into())
            .context("assembling crew 'ev-report'");
        let failure = CreationFailure::from(&err);
        assert_eq!(failure.kind, ErrorKind::Assembly);
        assert_eq!(
            failure.causes,
            vec!["assembling crew 'ev-report'", "dependency cycle"]
        );
        assert!(failure.to_string().starts_with("[assembly]"));
    }

    #[test]
    fn test_causes_containing_separators_stay_whole() {
        let err = CrewmasterError::Store("Failed to parse crew /p: expected value".into())
            .context("cloning crew 42")
            .context("loading source");
        assert_eq!(err.kind(), ErrorKind::Store);
        assert!(!err.is_internal());
        let failure = CreationFailure::from(&err);
        assert_eq!(
            failure.causes,
            vec![
                "loading source",
                "cloning crew 42",
                "Failed to parse crew /p: expected value"
            ]
        );
        assert_eq!(
            failure.message,
            "Store error: loading source: cloning crew 42: Failed to parse crew /p: expected value"
        );
    }

    #[test]
    fn test_context_keeps_io_kind_and_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = CrewmasterError::from(io).context("writing crew file");
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(matches!(err.root(), CrewmasterError::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_error_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::UnknownCapability).unwrap();
        assert_eq!(json, "\"unknown_capability\"");
    }
}
