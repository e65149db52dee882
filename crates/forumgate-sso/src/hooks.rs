//! Application hooks around the login lifecycle.

use async_trait::async_trait;

use crate::error::Result;
use crate::payload::{AuthenticatedIdentity, SsoPayload};
use crate::protocol::LoginFailure;
use crate::session::Session;

/// Session key holding the authenticated user's external id.
pub const MEMBER_ID_KEY: &str = "member_id";

/// Session key holding the authenticated user's forum username.
pub const USERNAME_KEY: &str = "username";

/// Customisation points of the SSO protocol.
///
/// Every method has a default; override the ones your application needs.
#[async_trait]
pub trait LoginHooks: Send + Sync + std::fmt::Debug {
    /// Persist a freshly verified identity into the session.
    ///
    /// The default stores [`MEMBER_ID_KEY`] and [`USERNAME_KEY`].
    ///
    /// # Errors
    ///
    /// An error here rejects the login.
    async fn on_login_success(
        &self,
        session: &Session,
        identity: &AuthenticatedIdentity,
        _payload: &SsoPayload,
    ) -> Result<()> {
        // `member_id` marks the session as logged in, so it goes last.
        session.set(USERNAME_KEY, identity.username.clone()).await?;
        session.set(MEMBER_ID_KEY, identity.external_id).await
    }

    /// The response returned for every rejected callback.
    ///
    /// It must not depend on the rejection reason.
    fn on_login_failure(&self) -> LoginFailure {
        LoginFailure::default()
    }

    /// Runs before each protected operation of an authenticated session.
    ///
    /// # Errors
    ///
    /// An error here aborts the protected operation.
    async fn load_login_data(&self, _session: &Session) -> Result<()> {
        Ok(())
    }

    /// Whether the session is already authenticated.
    ///
    /// # Errors
    ///
    /// Propagates session store failures.
    async fn is_logged_in(&self, session: &Session) -> Result<bool> {
        session.contains(MEMBER_ID_KEY).await
    }
}

/// Hooks with every default in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLoginHooks;

impl LoginHooks for DefaultLoginHooks {}
