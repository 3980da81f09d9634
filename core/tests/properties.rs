//! Property tests for the cipher and URL assembly.

use proptest::prelude::*;
use serde_json::{Map, Value};
use zpw_core::{decrypt, encrypt, url_builder, SessionContext, SymmetricKey};

fn json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 +/=%&?\u{00e0}-\u{00ff}]{0,24}".prop_map(Value::String),
    ]
}

fn json_value() -> impl Strategy<Value = Value> {
    json_leaf().prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,10}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>())),
        ]
    })
}

fn params() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-z_]{1,12}", json_value(), 0..8)
        .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>()))
}

fn key() -> impl Strategy<Value = SymmetricKey> {
    prop_oneof![Just(16usize), Just(24), Just(32)]
        .prop_flat_map(|len| prop::collection::vec(any::<u8>(), len))
        .prop_map(|bytes| SymmetricKey::from_bytes(bytes).unwrap())
}

proptest! {
    #[test]
    fn decrypt_reverses_encrypt(key in key(), params in params()) {
        let ciphertext = encrypt(&key, &params).unwrap();
        prop_assert_eq!(decrypt(&key, &ciphertext).unwrap(), params);
    }

    #[test]
    fn ciphertext_is_whole_blocks(key in key(), params in params()) {
        use base64::Engine as _;
        let ciphertext = encrypt(&key, &params).unwrap();
        let raw = base64::engine::general_purpose::STANDARD.decode(ciphertext).unwrap();
        prop_assert!(!raw.is_empty());
        prop_assert_eq!(raw.len() % 16, 0);
    }

    #[test]
    fn markers_are_always_present(version in 0u32..10_000, kind in 0u32..100, path in "/[a-z/]{0,20}") {
        let session = SessionContext::builder("1", "MDEyMzQ1Njc4OWFiY2RlZg==")
            .protocol(kind, version)
            .build()
            .unwrap();
        let url = url_builder::build_with_params("https://h.example", &path, "a+b/c=", &[], &session);
        let expected_version = format!("zpw_ver={}", version);
        let expected_type = format!("zpw_type={}", kind);
        prop_assert!(url.contains(&expected_version));
        prop_assert!(url.contains(&expected_type));
        prop_assert!(url.contains("params=a%2Bb%2Fc%3D"));
    }
}
