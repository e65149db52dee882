//! # Forumgate SSO
//!
//! Client side of a forum single-sign-on handshake: the application redirects
//! anonymous users to the forum, which authenticates them and returns a signed
//! identity payload.
//!
//! ## Architecture
//!
//! - [`signature`] - HMAC-SHA256 sign/verify with constant-time comparison
//! - [`session`] - `SessionStore` capability and an in-memory implementation
//! - [`nonce`] - single-use nonces binding a redirect to its callback
//! - [`payload`] - `base64(urlencode(..))` payload codec and identity extraction
//! - [`hooks`] - login success/failure/load hooks
//! - [`protocol`] - `SsoProtocol`: `begin_login`, `complete_login`
//! - [`guard`] - `require_login` wrapper around protected operations
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use forumgate_sso::{MemorySessionStore, Session, SessionStore, SsoConfig, SsoProtocol};
//!
//! # tokio_test::block_on(async {
//! let config = SsoConfig::new("d836444a9e4084d5b224a60c208dce14", "https://forum.example.org").unwrap();
//! let protocol = SsoProtocol::new(&config).unwrap();
//!
//! let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
//! let session = Session::new("session-id-from-cookie", store);
//!
//! let redirect = protocol.begin_login(&session, "https://app.example.org/members").await.unwrap();
//! assert_eq!(redirect.location().path(), "/session/sso_provider");
//! # });
//! ```

pub mod error;
pub mod guard;
pub mod hooks;
pub mod nonce;
pub mod payload;
pub mod protocol;
pub mod session;
pub mod signature;

pub use error::{Result, SsoError};
pub use guard::{GuardOutcome, LoginRequest};
pub use hooks::{DefaultLoginHooks, LoginHooks, MEMBER_ID_KEY, USERNAME_KEY};
pub use nonce::{NonceStore, PendingLogin};
pub use payload::{AuthenticatedIdentity, SsoPayload};
pub use protocol::{
    LoginFailure, LoginOutcome, LoginState, Redirect, SSO_PROVIDER_PATH, SsoConfig, SsoProtocol,
};
pub use session::{MemorySessionStore, Session, SessionStore};
pub use signature::SignatureEngine;

// Re-exported so callers can implement `SessionStore` and `LoginHooks`
// without depending on async-trait directly.
pub use async_trait::async_trait;
