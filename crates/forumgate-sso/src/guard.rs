//! Login guard for protected operations.
//!
//! [`SsoProtocol::require_login`] wraps an operation the way a middleware
//! would: anonymous sessions are either sent to the provider or, when the
//! request is the provider's callback, verified first. The operation only runs
//! for an authenticated session.
//!
//! ```rust,ignore
//! let request = LoginRequest::from_url(&incoming_url);
//! match protocol.require_login(&session, &request, || render_dashboard()).await? {
//!     GuardOutcome::Proceed(page) => page,
//!     GuardOutcome::Redirect(redirect) => found(redirect.location()),
//!     GuardOutcome::Rejected(failure) => forbidden(failure.message()),
//! }
//! ```

use std::future::Future;

use url::{Url, form_urlencoded};

use crate::error::Result;
use crate::hooks::LoginHooks;
use crate::protocol::{LoginFailure, LoginOutcome, Redirect, SsoProtocol};
use crate::session::Session;

/// The parts of an incoming request the guard looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginRequest {
    return_url: String,
    sso: Option<String>,
    sig: Option<String>,
}

impl LoginRequest {
    /// A request without callback parameters; `return_url` is where the
    /// provider sends the user back to.
    pub fn new(return_url: impl Into<String>) -> Self {
        Self {
            return_url: return_url.into(),
            sso: None,
            sig: None,
        }
    }

    /// Attach callback parameters.
    #[must_use]
    pub fn with_callback(mut self, sso: impl Into<String>, sig: impl Into<String>) -> Self {
        self.sso = Some(sso.into());
        self.sig = Some(sig.into());
        self
    }

    /// Build from a return URL and a raw query string. The first `sso` and
    /// `sig` values win.
    pub fn from_query(return_url: impl Into<String>, query: &str) -> Self {
        let mut request = Self::new(return_url);
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match &*key {
                "sso" if request.sso.is_none() => request.sso = Some(value.into_owned()),
                "sig" if request.sig.is_none() => request.sig = Some(value.into_owned()),
                _ => {}
            }
        }
        request
    }

    /// Build from the full request URL. The return URL is the request URL
    /// without query or fragment.
    pub fn from_url(url: &Url) -> Self {
        let mut base = url.clone();
        base.set_query(None);
        base.set_fragment(None);
        Self::from_query(base.as_str(), url.query().unwrap_or_default())
    }

    /// Where the provider should return to.
    pub fn return_url(&self) -> &str {
        &self.return_url
    }

    /// Both callback parameters, if the request carries them.
    pub fn callback(&self) -> Option<(&str, &str)> {
        match (&self.sso, &self.sig) {
            (Some(sso), Some(sig)) => Some((sso.as_str(), sig.as_str())),
            _ => None,
        }
    }
}

/// What the guard decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome<T> {
    /// The session is authenticated and the operation ran
    Proceed(T),
    /// The session must log in at the provider first
    Redirect(Redirect),
    /// The callback was refused
    Rejected(LoginFailure),
}

impl<T> GuardOutcome<T> {
    /// The operation's result, if it ran.
    pub fn into_proceeded(self) -> Option<T> {
        match self {
            Self::Proceed(value) => Some(value),
            _ => None,
        }
    }
}

impl<H: LoginHooks> SsoProtocol<H> {
    /// Run `operation` only for an authenticated session.
    ///
    /// - Authenticated: [`LoginHooks::load_login_data`], then the operation.
    /// - Anonymous with `sso` and `sig`: the callback is verified; a rejection
    ///   short-circuits, a success falls through to the operation.
    /// - Anonymous otherwise: a fresh redirect to the provider.
    ///
    /// # Errors
    ///
    /// Only infrastructure failures (session store, `load_login_data`)
    /// surface as errors. Rejected callbacks are [`GuardOutcome::Rejected`].
    pub async fn require_login<F, Fut, T>(
        &self,
        session: &Session,
        request: &LoginRequest,
        operation: F,
    ) -> Result<GuardOutcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if !self.hooks().is_logged_in(session).await? {
            match request.callback() {
                Some((sso, sig)) => {
                    if let LoginOutcome::Rejected(failure) =
                        self.complete_login(session, sso, sig).await
                    {
                        return Ok(GuardOutcome::Rejected(failure));
                    }
                }
                None => {
                    let redirect = self.begin_login(session, request.return_url()).await?;
                    return Ok(GuardOutcome::Redirect(redirect));
                }
            }
        }

        self.hooks().load_login_data(session).await?;
        Ok(GuardOutcome::Proceed(operation().await))
    }
}
