//! Error types shared across every component.
//!
//! There is a single crate-wide [`Error`] enum, one variant per error kind
//! the core exposes to its callers (spec §7). Kinds are stable so a facade
//! can map them 1:1 onto API status codes without inspecting messages.

use thiserror::Error;

use crate::repository::RepositoryError;

/// Result type alias using the crate error.
pub type Result<T> = std::result::Result<T, Error>;

/// Maximum number of bytes of a remote response body kept in
/// [`Error::RemoteStatus`] / [`Error::PreconditionFailed`] for diagnostics.
pub const BODY_EXCERPT_LIMIT: usize = 2048;

/// Truncate `body` to [`BODY_EXCERPT_LIMIT`] bytes on a char boundary.
pub fn truncate_body(body: &str) -> String {
    if body.len() <= BODY_EXCERPT_LIMIT {
        return body.to_string();
    }
    let mut end = BODY_EXCERPT_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// No such instance/template/snapshot.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed input: invalid URL, missing credential key, wrong variable type.
    #[error("validation error: {0}")]
    Validation(String),

    /// Network-level failure talking to a remote admin API.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote did not respond within the per-operation budget.
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The remote returned a non-2xx response.
    #[error("remote returned status {status}: {body_excerpt}")]
    RemoteStatus { status: u16, body_excerpt: String },

    /// Specialisation of `RemoteStatus` for the ETag-guarded write path.
    #[error("precondition failed (status {status}): {body_excerpt}")]
    PreconditionFailed { status: u16, body_excerpt: String },

    /// Repository I/O failure (any `RepositoryError` kind other than
    /// `NotFound`, which is promoted to `Error::NotFound` by the `From` impl
    /// below so a missing row surfaces through the same kind spec §4.A and
    /// §7 both name, not as a storage failure).
    #[error("storage error: {0}")]
    Storage(RepositoryError),

    /// Template variable missing or of the wrong declared type.
    #[error("template variable validation failed: {0}")]
    VariableValidation(String),

    /// JSON decode failure on a remote response or stored document.
    #[error("parse error: {0}")]
    Parse(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(Box<figment::Error>),
}

impl Error {
    /// Stable, lowercase, facade-mappable name for this error's kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::Validation(_) => "validation",
            Error::Transport(_) => "transport",
            Error::Timeout(_) => "timeout",
            Error::RemoteStatus { .. } => "remote_status",
            Error::PreconditionFailed { .. } => "precondition_failed",
            Error::Storage(_) => "storage",
            Error::VariableValidation(_) => "variable_validation",
            Error::Parse(_) => "parse",
            Error::Config(_) => "config",
        }
    }

    /// Whether retrying the same operation unmodified could plausibly
    /// succeed. The core never retries on its own (§7); this is advisory
    /// for callers layered above it.
    pub fn retriable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Timeout(_))
            || matches!(self, Error::Storage(e) if e.is_retriable())
    }
}

impl From<RepositoryError> for Error {
    /// Promotes `RepositoryError::NotFound` to `Error::NotFound` so a
    /// missing instance/template/snapshot surfaces as spec §7's dedicated
    /// `NotFound` kind rather than a generic storage failure; every other
    /// `RepositoryError` kind is a genuine storage failure and is wrapped
    /// as-is.
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound { entity, id } => Error::NotFound(format!("{entity} {id}")),
            other => Error::Storage(other),
        }
    }
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Error::Config(Box::new(e))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(std::time::Duration::default())
        } else {
            Error::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RepositoryOperation;

    #[test]
    fn kind_name_is_stable_and_lowercase() {
        let err = Error::NotFound("instance xyz".to_string());
        assert_eq!(err.kind_name(), "not_found");
    }

    #[test]
    fn transport_and_timeout_are_retriable() {
        assert!(Error::Transport("connection refused".to_string()).retriable());
        assert!(Error::Timeout(std::time::Duration::from_secs(10)).retriable());
        assert!(!Error::NotFound("x".to_string()).retriable());
        assert!(!Error::Validation("bad url".to_string()).retriable());
    }

    #[test]
    fn storage_retriable_delegates_to_repository_error() {
        let err = Error::Storage(RepositoryError::connection_failed("refused"));
        assert!(err.retriable());

        let err = Error::Storage(RepositoryError::backend(RepositoryOperation::Read, "boom"));
        assert!(!err.retriable());
    }

    #[test]
    fn repository_not_found_is_promoted_to_error_not_found() {
        let err: Error = RepositoryError::not_found("ProxyInstance", "abc").into();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(err.kind_name(), "not_found");
    }

    #[test]
    fn other_repository_errors_stay_wrapped_as_storage() {
        let err: Error = RepositoryError::connection_failed("refused").into();
        assert!(matches!(err, Error::Storage(RepositoryError::ConnectionFailed(_))));
    }

    #[test]
    fn truncate_body_respects_limit() {
        let long = "x".repeat(BODY_EXCERPT_LIMIT + 500);
        let truncated = truncate_body(&long);
        assert!(truncated.len() <= BODY_EXCERPT_LIMIT + "…".len());
        assert!(truncated.ends_with('…'));

        let short = "short body";
        assert_eq!(truncate_body(short), short);
    }

    #[test]
    fn remote_status_display_includes_excerpt() {
        let err = Error::RemoteStatus {
            status: 500,
            body_excerpt: "internal error".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("500"));
        assert!(msg.contains("internal error"));
    }
}
