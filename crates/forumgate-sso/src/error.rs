//! Error types for the SSO handshake.

use thiserror::Error;

/// Result type for SSO operations.
pub type Result<T> = std::result::Result<T, SsoError>;

/// Errors raised while building or validating an SSO handshake.
///
/// Rejection variants are internal diagnostics only. Callers of
/// [`SsoProtocol::complete_login`](crate::SsoProtocol::complete_login) and the
/// login guard never see them; they receive a generic
/// [`LoginFailure`](crate::LoginFailure) instead.
#[derive(Debug, Error)]
pub enum SsoError {
    /// The shared secret cannot be used as an HMAC key.
    #[error("invalid shared secret: {0}")]
    InvalidKey(String),

    /// The provider or return URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The `sig` parameter does not authenticate the `sso` payload.
    #[error("signature does not match payload")]
    SignatureMismatch,

    /// No login was pending for this session.
    #[error("no pending login nonce for session")]
    NonceMissing,

    /// The payload nonce differs from the pending one.
    #[error("payload nonce does not match pending login")]
    NonceMismatch,

    /// The payload is not base64 of a UTF-8 query string.
    #[error("malformed SSO payload: {0}")]
    MalformedPayload(String),

    /// A required payload field is absent.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// A payload field is present but unusable.
    #[error("invalid value for field '{field}': {reason}")]
    InvalidField {
        /// Field name
        field: &'static str,
        /// Why the value was refused
        reason: String,
    },

    /// The session store failed.
    #[error("session store error: {0}")]
    Session(String),
}

impl SsoError {
    /// Create a session store error.
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session(message.into())
    }

    /// Whether this error represents a rejected callback rather than an
    /// infrastructure failure.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            Self::InvalidKey(_) | Self::InvalidUrl(_) | Self::Session(_)
        )
    }
}
