//! Error types for admin API calls.
//!
//! Every failure surfaces as one [`ApiError`] carrying a kind, a diagnostic
//! message and, when the server answered, the raw response.

use std::fmt;

use http::StatusCode;
use thiserror::Error;

use crate::transport::{RawResponse, TransportError};

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// What went wrong with an API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// The request never produced a response (connect failure, timeout)
    Transport,
    /// Every attempt was answered with 429
    RateLimited,
    /// A non-success status other than 429
    Http,
    /// A 302 the caller did not ask to follow
    UnexpectedRedirect,
    /// Non-empty body without the JSON content type
    ContentTypeMismatch,
    /// The JSON body could not be decoded
    Decode,
    /// The JSON body carried a populated `errors` array
    Application,
    /// The request could not be built
    InvalidRequest,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Transport => "transport",
            Self::RateLimited => "rate limited",
            Self::Http => "http",
            Self::UnexpectedRedirect => "unexpected redirect",
            Self::ContentTypeMismatch => "content type mismatch",
            Self::Decode => "decode",
            Self::Application => "application",
            Self::InvalidRequest => "invalid request",
        };
        f.write_str(name)
    }
}

/// Admin API error.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    kind: ApiErrorKind,
    message: String,
    response: Option<Box<RawResponse>>,
    #[source]
    source: Option<TransportError>,
}

impl ApiError {
    fn new(kind: ApiErrorKind, message: impl Into<String>, response: Option<RawResponse>) -> Self {
        Self {
            kind,
            message: message.into(),
            response: response.map(Box::new),
            source: None,
        }
    }

    /// The call failed below HTTP.
    pub fn transport(error: TransportError) -> Self {
        Self {
            kind: ApiErrorKind::Transport,
            message: error.to_string(),
            response: None,
            source: Some(error),
        }
    }

    /// Attempts ran out while the server kept answering 429.
    pub fn rate_limited(response: RawResponse) -> Self {
        Self::new(ApiErrorKind::RateLimited, "Reached max retries", Some(response))
    }

    /// A non-success status.
    pub fn http(message: impl Into<String>, response: RawResponse) -> Self {
        Self::new(ApiErrorKind::Http, message, Some(response))
    }

    /// A redirect surfaced where none was expected.
    pub fn unexpected_redirect(response: RawResponse) -> Self {
        Self::new(
            ApiErrorKind::UnexpectedRedirect,
            "Unexpected redirect",
            Some(response),
        )
    }

    /// The response is not JSON.
    pub fn content_type_mismatch(expected: &str, actual: &str, response: RawResponse) -> Self {
        Self::new(
            ApiErrorKind::ContentTypeMismatch,
            format!("Invalid Response, expecting \"{expected}\" got \"{actual}\""),
            Some(response),
        )
    }

    /// The JSON body could not be decoded.
    pub fn decode(response: RawResponse) -> Self {
        Self::new(ApiErrorKind::Decode, "failed to decode response", Some(response))
    }

    /// A decoded document lacks the shape a typed call expects.
    pub fn unexpected_shape(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Decode, message, None)
    }

    /// The server reported errors in the envelope.
    pub fn application(message: impl Into<String>, response: RawResponse) -> Self {
        Self::new(ApiErrorKind::Application, message, Some(response))
    }

    /// The request could not be built.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::InvalidRequest, message, None)
    }

    /// Error category.
    pub fn kind(&self) -> ApiErrorKind {
        self.kind
    }

    /// Diagnostic message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The response that caused the error, if any.
    pub fn response(&self) -> Option<&RawResponse> {
        self.response.as_deref()
    }

    /// HTTP status of the offending response.
    pub fn status(&self) -> Option<StatusCode> {
        self.response.as_ref().map(|r| r.status)
    }

    /// Whether the call timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self.source, Some(TransportError::Timeout(_)))
    }
}
