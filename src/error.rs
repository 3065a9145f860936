//! Errors raised while talking to the content API

use thiserror::Error;

/// Failures of the upstream CMS, classified by how callers must react
#[derive(Error, Debug)]
pub enum CmsError {
    /// Network failure or non-success HTTP status. Retryable.
    #[error("upstream unavailable at {url}: {reason}")]
    UpstreamUnavailable { url: String, reason: String },

    /// The response did not match the expected schema. Never retried.
    #[error("malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    /// No document with this slug exists upstream
    #[error("post not found: {slug}")]
    NotFound { slug: String },
}

impl CmsError {
    pub(crate) fn unavailable(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::UpstreamUnavailable {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn malformed(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedResponse {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether retrying the same request could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable { .. })
    }
}

pub type CmsResult<T> = std::result::Result<T, CmsError>;
