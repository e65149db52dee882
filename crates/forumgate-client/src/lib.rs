//! # Forumgate Client
//!
//! Admin REST client for a forum API, with rate-limit backoff and decoding
//! of the forum's JSON error envelope.
//!
//! ## Architecture
//!
//! - [`transport`] - `HttpTransport` seam and the reqwest implementation
//! - [`retry`] - 429 retry policy, per-call state and the `Sleeper` seam
//! - [`decoder`] - content-type check, JSON decode, `errors`/`message` envelope
//! - [`executor`] - credentials, request building and the retry loop
//! - [`api`] - `ApiClient` endpoint mappings and typed results
//!
//! ## Example
//!
//! ```rust,no_run
//! use forumgate_client::{ApiClient, Credentials};
//!
//! # async fn run() -> forumgate_client::Result<()> {
//! let credentials = Credentials::parse("https://forum.example.org", "system", "api-key")?;
//! let client = ApiClient::new(credentials)?;
//!
//! let group = client.group("makers").await?;
//! client.add_group_member(group.id, "sam").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! Every failure is an [`ApiError`] whose [`ApiErrorKind`] tells transport
//! failures, exhausted rate limits, HTTP errors and envelope errors apart. The
//! raw response is kept for diagnostics.

pub mod api;
pub mod decoder;
pub mod error;
pub mod executor;
pub mod retry;
pub mod transport;

pub use api::{AdminUser, ApiClient, Group, GroupMember};
pub use decoder::{JSON_CONTENT_TYPE, ResponseDecoder};
pub use error::{ApiError, ApiErrorKind, Result};
pub use executor::{API_KEY_HEADER, API_USERNAME_HEADER, ApiRequest, Credentials, HttpRequestExecutor};
pub use retry::{RetryPolicy, RetryState, Sleeper, TokioSleeper};
pub use transport::{
    FileAttachment, HttpTransport, RawResponse, RequestBody, RequestOptions, ReqwestTransport,
    TransportError, TransportRequest,
};

pub use async_trait::async_trait;
