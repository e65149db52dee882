//! Property-based tests for payload signatures and tamper detection

mod common;

use common::{MockProvider, RETURN_URL, protocol, session, store};
use forumgate_sso::SignatureEngine;
use proptest::prelude::*;

const BASE64_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

proptest! {
    #[test]
    fn prop_sign_then_verify(
        key in prop::collection::vec(any::<u8>(), 1..64),
        payload in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let engine = SignatureEngine::new(&key).unwrap();
        let sig = engine.sign(&payload);
        prop_assert!(engine.verify(&payload, &sig));
    }

    #[test]
    fn prop_other_key_never_verifies(
        key in prop::collection::vec(any::<u8>(), 1..64),
        other in prop::collection::vec(any::<u8>(), 1..64),
        payload in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        prop_assume!(key != other);
        let engine = SignatureEngine::new(&key).unwrap();
        let foreign = SignatureEngine::new(&other).unwrap();
        prop_assert!(!engine.verify(&payload, &foreign.sign(&payload)));
    }

    #[test]
    fn prop_sign_is_deterministic(payload in ".*") {
        let engine = SignatureEngine::new(b"shared-secret").unwrap();
        prop_assert_eq!(engine.sign(payload.as_bytes()), engine.sign(payload.as_bytes()));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_mutated_sso_byte_is_rejected(index in any::<prop::sample::Index>(), replacement in any::<prop::sample::Index>()) {
        tokio_test::block_on(async {
            let protocol = protocol();
            let store = store();
            let session = session(&store, "prop");
            let provider = MockProvider::new();

            let redirect = protocol.begin_login(&session, RETURN_URL).await.unwrap();
            let (sso, sig) = provider.authenticate(&redirect, "1234", "sam");

            let mut bytes = sso.into_bytes();
            let i = index.index(bytes.len());
            let mut candidate = BASE64_ALPHABET[replacement.index(BASE64_ALPHABET.len())];
            if candidate == bytes[i] {
                candidate = if candidate == b'A' { b'B' } else { b'A' };
            }
            bytes[i] = candidate;
            let mutated = String::from_utf8(bytes).unwrap();

            let outcome = protocol.complete_login(&session, &mutated, &sig).await;
            assert!(!outcome.is_authenticated());
            assert_eq!(session.get("nonce").await.unwrap(), None);
        });
    }
}
