//! # Forumgate
//!
//! Integrates an application with a forum that acts as identity provider and
//! exposes an admin REST API.
//!
//! - [`sso`] - single-sign-on handshake: signed redirects, single-use nonces,
//!   callback verification and a login guard
//! - [`client`] - admin API client with rate-limit backoff and error-envelope
//!   decoding
//! - [`config`] - file and environment configuration for both
//! - [`telemetry`] - tracing subscriber setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use forumgate::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ForumgateConfig::from_file("forumgate.toml")?;
//! forumgate::telemetry::init_tracing(&config.logging)?;
//!
//! let protocol = config.sso_protocol()?;
//! let api = config.api_client()?;
//!
//! let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
//! let session = Session::new("cookie-session-id", store);
//! let request = LoginRequest::new("https://app.example.org/members");
//!
//! match protocol.require_login(&session, &request, || api.group("makers")).await? {
//!     GuardOutcome::Proceed(group) => println!("{}", group?.name),
//!     GuardOutcome::Redirect(redirect) => println!("302 {}", redirect.location()),
//!     GuardOutcome::Rejected(failure) => println!("403 {failure}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod telemetry;

pub use config::{
    ApiConfig, ConfigError, ConfigurationBuilder, DEFAULT_ENV_PREFIX, ForumgateConfig,
    LoggingConfig, RetryConfig, SsoSettings,
};

pub use forumgate_client as client;
pub use forumgate_sso as sso;

pub use forumgate_client::{ApiClient, ApiError, ApiErrorKind, Credentials, RetryPolicy};
pub use forumgate_sso::{
    GuardOutcome, LoginFailure, LoginHooks, LoginOutcome, LoginRequest, Redirect, Session,
    SessionStore, SsoConfig, SsoError, SsoProtocol,
};

pub use forumgate_sso::async_trait;
pub use tracing;

/// Common imports
pub mod prelude {
    pub use crate::config::{ConfigError, ForumgateConfig};
    pub use forumgate_client::{
        AdminUser, ApiClient, ApiError, ApiErrorKind, ApiRequest, Credentials, FileAttachment,
        Group, GroupMember, RetryPolicy,
    };
    pub use forumgate_sso::{
        AuthenticatedIdentity, DefaultLoginHooks, GuardOutcome, LoginFailure, LoginHooks,
        LoginOutcome, LoginRequest, LoginState, MemorySessionStore, Redirect, Session,
        SessionStore, SsoConfig, SsoPayload, SsoProtocol,
    };
}
