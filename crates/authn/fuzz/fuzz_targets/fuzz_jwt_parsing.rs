//! Fuzz target for JWT parsing and validation.
//!
//! Feeds arbitrary byte strings as tokens to the parsing, validation and
//! gate functions. Every result must be either `Ok(...)` or `Err(AuthError)`.

#![no_main]

use chrono::{DateTime, Utc};
use libfuzzer_sys::fuzz_target;
use togo_authn::{
    TokenCodec,
    gate::authenticate,
    jwt::{decode_jwt_algorithm, decode_jwt_claims, validate_claims},
    validate_algorithm,
};

fuzz_target!(|data: &[u8]| {
    // Tokens are always UTF-8 strings
    let Ok(token) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(alg) = decode_jwt_algorithm(token) {
        let _ = validate_algorithm(&alg);
    }

    if let Ok(ref claims) = decode_jwt_claims(token) {
        let _ = validate_claims(claims, Utc::now());
        let _ = validate_claims(claims, DateTime::<Utc>::MIN_UTC);
        let _ = validate_claims(claims, DateTime::<Utc>::MAX_UTC);
    }

    if let Ok(codec) = TokenCodec::new(b"fuzz-secret", std::time::Duration::from_secs(900)) {
        let _ = authenticate(&codec, Some(token), Utc::now());
    }
});
