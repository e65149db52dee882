//! SSO Handshake Protocol
//!
//! Delegates authentication to a forum acting as identity provider:
//!
//! ```text
//! Anonymous ──begin_login──▶ RedirectPending ──complete_login──▶ Authenticated
//!                                   │
//!                                   └──────── any failure ──────▶ Rejected
//! ```
//!
//! 1. [`SsoProtocol::begin_login`] issues a nonce, signs
//!    `base64(nonce=..&return_sso_url=..)` and returns the redirect to
//!    `{provider}/session/sso_provider?sso=..&sig=..`.
//! 2. The provider authenticates the user and redirects back with its own
//!    signed `sso`/`sig` pair.
//! 3. [`SsoProtocol::complete_login`] consumes the pending nonce, verifies the
//!    signature, decodes the payload, matches the nonce and extracts the
//!    identity before handing it to [`LoginHooks::on_login_success`].
//!
//! ## Security Properties
//!
//! - The pending nonce is consumed before anything else, so a callback can be
//!   accepted at most once whatever its outcome.
//! - Payload bytes are decoded only after the signature verifies.
//! - Every rejection resolves to the same [`LoginFailure`]; the reason is
//!   logged, never returned.

use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Result, SsoError};
use crate::hooks::{DefaultLoginHooks, LoginHooks};
use crate::nonce::NonceStore;
use crate::payload::{self, AuthenticatedIdentity, SsoPayload};
use crate::session::Session;
use crate::signature::SignatureEngine;

/// Provider path that starts the handshake.
pub const SSO_PROVIDER_PATH: &str = "/session/sso_provider";

/// Shared secret and provider location.
#[derive(Debug, Clone)]
pub struct SsoConfig {
    shared_secret: SecretString,
    provider_url: Url,
}

impl SsoConfig {
    /// Build a configuration from raw values.
    ///
    /// # Errors
    ///
    /// Returns [`SsoError::InvalidUrl`] if `provider_url` does not parse.
    pub fn new(shared_secret: impl Into<String>, provider_url: &str) -> Result<Self> {
        Ok(Self::from_parts(
            SecretString::new(shared_secret.into()),
            Url::parse(provider_url)?,
        ))
    }

    /// Build a configuration from already validated parts.
    pub fn from_parts(shared_secret: SecretString, provider_url: Url) -> Self {
        Self {
            shared_secret,
            provider_url,
        }
    }

    /// The provider's base URL.
    pub fn provider_url(&self) -> &Url {
        &self.provider_url
    }
}

/// Redirect to the identity provider (HTTP 302).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    location: Url,
}

impl Redirect {
    /// HTTP status to answer with.
    pub const STATUS: u16 = 302;

    /// Target of the redirect.
    pub fn location(&self) -> &Url {
        &self.location
    }

    /// Consume into the target URL.
    pub fn into_location(self) -> Url {
        self.location
    }
}

/// The single response given for every rejected login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginFailure {
    message: String,
}

impl LoginFailure {
    /// Failure carrying a custom message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Message shown to the user.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Default for LoginFailure {
    fn default() -> Self {
        Self::new("Login failed")
    }
}

impl std::fmt::Display for LoginFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Result of processing a provider callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Signature, nonce and identity all checked out
    Authenticated(AuthenticatedIdentity),
    /// The callback was refused
    Rejected(LoginFailure),
}

impl LoginOutcome {
    /// Whether the login succeeded.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// The identity, if authenticated.
    pub fn identity(&self) -> Option<&AuthenticatedIdentity> {
        match self {
            Self::Authenticated(identity) => Some(identity),
            Self::Rejected(_) => None,
        }
    }
}

/// Where a session stands in the handshake.
///
/// A rejected callback leaves the session `Anonymous` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    /// No login in progress
    Anonymous,
    /// Redirected out, waiting for the callback
    RedirectPending,
    /// Identity stored in the session
    Authenticated,
}

/// SSO client side of the handshake.
#[derive(Debug)]
pub struct SsoProtocol<H = DefaultLoginHooks> {
    signer: SignatureEngine,
    provider_url: Url,
    nonces: NonceStore,
    hooks: H,
}

impl SsoProtocol<DefaultLoginHooks> {
    /// Create a protocol instance with default hooks.
    ///
    /// # Errors
    ///
    /// Returns [`SsoError::InvalidKey`] for an empty shared secret.
    pub fn new(config: &SsoConfig) -> Result<Self> {
        Ok(Self {
            signer: SignatureEngine::new(config.shared_secret.expose_secret().as_bytes())?,
            provider_url: config.provider_url.clone(),
            nonces: NonceStore::new(),
            hooks: DefaultLoginHooks,
        })
    }
}

impl<H: LoginHooks> SsoProtocol<H> {
    /// Replace the login hooks.
    pub fn with_hooks<H2: LoginHooks>(self, hooks: H2) -> SsoProtocol<H2> {
        SsoProtocol {
            signer: self.signer,
            provider_url: self.provider_url,
            nonces: self.nonces,
            hooks,
        }
    }

    /// Replace the nonce store (e.g. to change the session key).
    #[must_use]
    pub fn with_nonce_store(mut self, nonces: NonceStore) -> Self {
        self.nonces = nonces;
        self
    }

    /// The installed hooks.
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// The signature engine, for signing test fixtures or provider payloads.
    pub fn signer(&self) -> &SignatureEngine {
        &self.signer
    }

    /// Start a login: bind a fresh nonce to `session` and build the signed
    /// redirect to the provider.
    ///
    /// # Errors
    ///
    /// Propagates session store failures.
    pub async fn begin_login(&self, session: &Session, return_url: &str) -> Result<Redirect> {
        let pending = self.nonces.issue(session).await?;

        let sso = payload::encode([
            ("nonce", pending.nonce.as_str()),
            ("return_sso_url", return_url),
        ]);
        let sig = self.signer.sign(sso.as_bytes());

        let mut location = self.provider_url.clone();
        location.set_path(SSO_PROVIDER_PATH);
        location.set_fragment(None);
        location
            .query_pairs_mut()
            .clear()
            .append_pair("sso", &sso)
            .append_pair("sig", &sig);

        debug!(
            session_id = %session.id(),
            provider = %self.provider_url,
            "redirecting to SSO provider"
        );

        Ok(Redirect { location })
    }

    /// Validate a provider callback.
    ///
    /// The session's pending nonce is cleared by every call. All failures
    /// collapse into [`LoginHooks::on_login_failure`].
    pub async fn complete_login(&self, session: &Session, sso: &str, sig: &str) -> LoginOutcome {
        match self.verify_callback(session, sso, sig).await {
            Ok(identity) => {
                info!(
                    session_id = %session.id(),
                    external_id = identity.external_id,
                    username = %identity.username,
                    "SSO login succeeded"
                );
                LoginOutcome::Authenticated(identity)
            }
            Err(err) => {
                warn!(session_id = %session.id(), reason = %err, "SSO login rejected");
                LoginOutcome::Rejected(self.hooks.on_login_failure())
            }
        }
    }

    async fn verify_callback(
        &self,
        session: &Session,
        sso: &str,
        sig: &str,
    ) -> Result<AuthenticatedIdentity> {
        let pending = self.nonces.take(session).await?;

        if !self.signer.verify(sso.as_bytes(), sig) {
            return Err(SsoError::SignatureMismatch);
        }

        let payload = SsoPayload::decode(sso)?;

        let pending = pending.ok_or(SsoError::NonceMissing)?;
        let nonce = payload
            .first("nonce")
            .ok_or(SsoError::MissingField("nonce"))?;
        if !bool::from(nonce.as_bytes().ct_eq(pending.nonce.as_bytes())) {
            return Err(SsoError::NonceMismatch);
        }

        let identity = AuthenticatedIdentity::from_payload(&payload)?;
        self.hooks
            .on_login_success(session, &identity, &payload)
            .await?;

        Ok(identity)
    }

    /// Current handshake state of `session`.
    ///
    /// # Errors
    ///
    /// Propagates session store failures.
    pub async fn login_state(&self, session: &Session) -> Result<LoginState> {
        if self.hooks.is_logged_in(session).await? {
            Ok(LoginState::Authenticated)
        } else if self.nonces.is_pending(session).await? {
            Ok(LoginState::RedirectPending)
        } else {
            Ok(LoginState::Anonymous)
        }
    }
}
