//! Single-use login nonces bound to a session.
//!
//! A nonce is issued when the user is redirected to the provider and consumed
//! by the next callback on that session, whatever that callback's outcome.
//! At most one login is pending per session; issuing again overwrites it.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use serde_json::Value;

use crate::error::Result;
use crate::session::Session;

/// Session key under which the pending nonce is stored.
pub const DEFAULT_NONCE_KEY: &str = "nonce";

/// Random bytes per nonce (256 bits before encoding).
pub const NONCE_BYTES: usize = 32;

/// A redirect-out awaiting its callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLogin {
    /// Opaque URL-safe token
    pub nonce: String,
    /// Session the nonce is bound to
    pub session_id: String,
}

/// Issues and consumes pending-login nonces through the session store.
#[derive(Debug, Clone)]
pub struct NonceStore {
    key: String,
}

impl Default for NonceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NonceStore {
    /// Store nonces under [`DEFAULT_NONCE_KEY`].
    pub fn new() -> Self {
        Self::with_key(DEFAULT_NONCE_KEY)
    }

    /// Store nonces under a custom session key.
    pub fn with_key(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Generate a fresh URL-safe token from the OS CSPRNG.
    pub fn generate() -> String {
        let mut bytes = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Issue a new nonce for `session`, replacing any pending one.
    ///
    /// # Errors
    ///
    /// Propagates session store failures.
    pub async fn issue(&self, session: &Session) -> Result<PendingLogin> {
        let nonce = Self::generate();
        session.set(&self.key, nonce.clone()).await?;

        tracing::debug!(session_id = %session.id(), "issued login nonce");

        Ok(PendingLogin {
            nonce,
            session_id: session.id().to_string(),
        })
    }

    /// Remove and return the pending nonce in one store operation.
    ///
    /// A stored value that is not a string counts as no pending login; it is
    /// still removed.
    ///
    /// # Errors
    ///
    /// Propagates session store failures.
    pub async fn take(&self, session: &Session) -> Result<Option<PendingLogin>> {
        let taken = session.pop(&self.key).await?;
        Ok(match taken {
            Some(Value::String(nonce)) => Some(PendingLogin {
                nonce,
                session_id: session.id().to_string(),
            }),
            _ => None,
        })
    }

    /// Whether a login is pending, without consuming it.
    ///
    /// # Errors
    ///
    /// Propagates session store failures.
    pub async fn is_pending(&self, session: &Session) -> Result<bool> {
        Ok(matches!(session.get(&self.key).await?, Some(Value::String(_))))
    }
}
