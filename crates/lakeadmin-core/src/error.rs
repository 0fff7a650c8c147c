//! Error types for workspace provisioning.
//!
//! Every failure is fatal for the run: there is no retry and no rollback, so
//! the variants only need to carry enough context for a readable message.

use std::fmt;

/// Errors that can occur while reconciling workspace resources.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// A principal or resource that the run depends on does not exist.
    #[error("{kind} '{name}' not found in workspace")]
    NotFound {
        /// What was looked up (user, group, service principal, ...).
        kind: LookupKind,
        /// The natural key that was searched for.
        name: String,
    },

    /// The workspace answered with an unexpected status.
    #[error("{method} {url} failed (HTTP {status}): {body}")]
    RemoteApi {
        /// HTTP method of the failed request.
        method: reqwest::Method,
        /// Request URL.
        url: String,
        /// Response status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The request never produced a response.
    #[error("request to workspace failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A successful response carried a body we could not interpret.
    #[error("unexpected response for {context}: {source}")]
    Decode {
        /// What was being decoded.
        context: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration could not be loaded or failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result alias used across the crate.
pub type ProvisionResult<T> = Result<T, ProvisionError>;

impl ProvisionError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(kind: LookupKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Creates a new `Decode` error.
    #[must_use]
    pub fn decode(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            context: context.into(),
            source,
        }
    }

    /// Returns `true` if this is a missing-dependency error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns the HTTP status of a remote failure, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteApi { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Kinds of object that can be looked up by natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    User,
    Group,
    ServicePrincipal,
    Job,
    Volume,
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "User"),
            Self::Group => write!(f, "Group"),
            Self::ServicePrincipal => write!(f, "Service principal"),
            Self::Job => write!(f, "Job"),
            Self::Volume => write!(f, "Volume"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = ProvisionError::not_found(LookupKind::Group, "engineering-admins");
        assert_eq!(
            err.to_string(),
            "Group 'engineering-admins' not found in workspace"
        );
        assert!(err.is_not_found());
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_remote_api_display_includes_status_and_body() {
        let err = ProvisionError::RemoteApi {
            method: reqwest::Method::POST,
            url: "https://ws.example.com/api/2.1/jobs/create".into(),
            status: 400,
            body: "{\"error_code\":\"INVALID_PARAMETER_VALUE\"}".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("HTTP 400"));
        assert!(msg.contains("INVALID_PARAMETER_VALUE"));
        assert_eq!(err.status(), Some(400));
        assert!(!err.is_not_found());
    }
}
