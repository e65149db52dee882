//! Common test utilities for SSO integration tests
//!
//! Provides a mock forum identity provider that understands the outbound
//! redirect and produces signed callbacks.

#![allow(dead_code)]

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use forumgate_sso::{
    MemorySessionStore, Redirect, Session, SessionStore, SignatureEngine, SsoConfig, SsoPayload,
    SsoProtocol,
};

pub const SECRET: &str = "d836444a9e4084d5b224a60c208dce14";
pub const PROVIDER_URL: &str = "https://forum.example.org";
pub const RETURN_URL: &str = "https://app.example.org/members";

pub fn protocol() -> SsoProtocol {
    let config = SsoConfig::new(SECRET, PROVIDER_URL).expect("valid config");
    SsoProtocol::new(&config).expect("valid secret")
}

pub fn store() -> Arc<MemorySessionStore> {
    Arc::new(MemorySessionStore::new())
}

pub fn session(store: &Arc<MemorySessionStore>, id: &str) -> Session {
    Session::new(id, store.clone() as Arc<dyn SessionStore>)
}

/// Forum side of the handshake
pub struct MockProvider {
    signer: SignatureEngine,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::with_secret(SECRET)
    }

    pub fn with_secret(secret: &str) -> Self {
        Self {
            signer: SignatureEngine::new(secret.as_bytes()).expect("valid secret"),
        }
    }

    /// Verify and decode the outbound redirect like the forum would
    pub fn receive(&self, redirect: &Redirect) -> SsoPayload {
        let pairs: Vec<(String, String)> = redirect
            .location()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let sso = &pairs.iter().find(|(k, _)| k == "sso").expect("sso param").1;
        let sig = &pairs.iter().find(|(k, _)| k == "sig").expect("sig param").1;
        assert!(self.signer.verify(sso.as_bytes(), sig), "outbound signature");
        SsoPayload::decode(sso).expect("outbound payload")
    }

    /// Sign an arbitrary set of fields as a callback `(sso, sig)` pair
    pub fn sign_fields(&self, fields: &[(&str, &str)]) -> (String, String) {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields.iter().copied())
            .finish();
        let sso = STANDARD.encode(query);
        let sig = self.signer.sign(sso.as_bytes());
        (sso, sig)
    }

    /// Authenticate a user in answer to `redirect`, echoing its nonce
    pub fn authenticate(&self, redirect: &Redirect, external_id: &str, username: &str) -> (String, String) {
        let outbound = self.receive(redirect);
        let nonce = outbound.first("nonce").expect("nonce").to_string();
        self.sign_fields(&[
            ("nonce", nonce.as_str()),
            ("external_id", external_id),
            ("username", username),
            ("email", "sam@example.org"),
            ("groups", "members"),
            ("groups", "makers"),
        ])
    }
}
