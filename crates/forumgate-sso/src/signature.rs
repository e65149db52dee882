//! HMAC-SHA256 Payload Signatures
//!
//! Both directions of the SSO handshake authenticate the base64 payload with
//! `hex(HMAC-SHA256(shared_secret, payload))`.
//!
//! ## Security Properties
//!
//! - **Constant-time verification**: the provided signature is hex-decoded and
//!   compared with `subtle::ConstantTimeEq`, so the comparison time does not
//!   depend on how many leading bytes match.
//! - **Length mismatch**: a signature of the wrong length compares unequal
//!   without a separate early-exit branch.
//! - **Secret hygiene**: the keyed MAC state is never printed by `Debug`.
//!
//! ## Usage
//!
//! ```rust
//! use forumgate_sso::SignatureEngine;
//!
//! let engine = SignatureEngine::new(b"d836444a9e4084d5b224a60c208dce14").unwrap();
//! let sig = engine.sign(b"bm9uY2U9Y2I2ODI1MWVlZmI1MjExZTU4YzAwZmYxMzk1ZjBjMGI=");
//!
//! assert!(engine.verify(b"bm9uY2U9Y2I2ODI1MWVlZmI1MjExZTU4YzAwZmYxMzk1ZjBjMGI=", &sig));
//! assert!(!engine.verify(b"tampered", &sig));
//! ```

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{Result, SsoError};

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies SSO payloads with a shared secret.
#[derive(Clone)]
pub struct SignatureEngine {
    keyed: HmacSha256,
}

impl SignatureEngine {
    /// Create an engine keyed with the shared secret.
    ///
    /// # Errors
    ///
    /// Returns [`SsoError::InvalidKey`] if the secret is empty.
    pub fn new(shared_secret: &[u8]) -> Result<Self> {
        if shared_secret.is_empty() {
            return Err(SsoError::InvalidKey(
                "shared secret must not be empty".to_string(),
            ));
        }

        let keyed = HmacSha256::new_from_slice(shared_secret)
            .map_err(|e| SsoError::InvalidKey(e.to_string()))?;

        Ok(Self { keyed })
    }

    /// Lowercase hex HMAC-SHA256 of `payload`.
    #[must_use]
    pub fn sign(&self, payload: &[u8]) -> String {
        hex::encode(self.digest(payload))
    }

    /// Check `signature_hex` against `payload` in constant time.
    ///
    /// Signatures that are not valid hex never match.
    #[must_use]
    pub fn verify(&self, payload: &[u8], signature_hex: &str) -> bool {
        let Ok(provided) = hex::decode(signature_hex) else {
            return false;
        };

        let expected = self.digest(payload);
        expected.as_slice().ct_eq(provided.as_slice()).into()
    }

    fn digest(&self, payload: &[u8]) -> [u8; 32] {
        let mut mac = self.keyed.clone();
        mac.update(payload);
        mac.finalize().into_bytes().into()
    }
}

impl std::fmt::Debug for SignatureEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureEngine")
            .field("algorithm", &"HMAC-SHA256")
            .field("key", &"[REDACTED]")
            .finish()
    }
}
