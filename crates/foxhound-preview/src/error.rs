//! Preview error handling
//!
//! Two kinds of failure exist in the preview engine:
//!
//! - [`PreviewError`]: something went wrong talking to the server or
//!   reading configuration. Deferred refreshes log these and drop them.
//! - [`RefreshRejected`]: a partial could not refresh because its
//!   preconditions are not met. The customizer falls back to its default
//!   behavior when it sees one of these.

use thiserror::Error;

use crate::models::EntityType;

/// Errors that can occur while fetching authoritative data
#[derive(Error, Debug)]
pub enum PreviewError {
    /// Transport-level failure (connection refused, timeout, TLS)
    #[error("Request to '{url}' failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status code
    #[error("Request to '{url}' returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The response body did not have the expected shape
    #[error("Malformed response from '{url}': {details}")]
    MalformedResponse { url: String, details: String },

    /// No entity with the requested slug exists
    #[error("No {entity_type} found with slug '{slug}'")]
    NotFound { entity_type: EntityType, slug: String },

    /// Invalid base URL or endpoint
    #[error("Invalid URL '{url}': {details}")]
    InvalidUrl { url: String, details: String },
}

impl PreviewError {
    /// Whether a later edit is likely to succeed where this one failed
    pub fn is_transient(&self) -> bool {
        match self {
            PreviewError::Http { .. } => true,
            PreviewError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Result type for preview operations
pub type PreviewResult<T> = Result<T, PreviewError>;

/// Reasons a partial refresh is rejected
///
/// A rejection is not a failure of the preview: it tells the caller to
/// fall back to the framework's default refresh path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshRejected {
    /// The menu location has no menu assigned
    #[error("Menu location '{0}' has no assigned menu")]
    NoMenuAssigned(String),

    /// The entity type is not one the preview can update
    #[error("Entity type '{0}' is not supported")]
    UnsupportedEntityType(String),

    /// The changed setting does not belong to this partial
    #[error("Setting '{0}' cannot be handled by this partial")]
    UnhandledSetting(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transience() {
        let err = PreviewError::Status {
            url: "http://example.test/wp-json/wp/v2/posts".to_string(),
            status: 503,
        };
        assert!(err.is_transient());

        let err = PreviewError::Status {
            url: "http://example.test/wp-json/wp/v2/posts".to_string(),
            status: 404,
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn test_malformed_is_not_transient() {
        let err = PreviewError::MalformedResponse {
            url: "http://example.test/wp-json/foxhound/v1/title/".to_string(),
            details: "missing field `rendered`".to_string(),
        };
        assert!(!err.is_transient());
        assert!(err.to_string().contains("missing field"));
    }

    #[test]
    fn test_not_found_display() {
        let err = PreviewError::NotFound {
            entity_type: EntityType::Page,
            slug: "about".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("page"));
        assert!(msg.contains("about"));
    }

    #[test]
    fn test_rejection_display() {
        let err = RefreshRejected::NoMenuAssigned("primary".to_string());
        assert!(err.to_string().contains("primary"));
    }
}
