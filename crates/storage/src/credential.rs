//! Salted password digests.
//!
//! The identity store never keeps a plaintext secret. A [`PasswordDigest`] is
//! PBKDF2-HMAC-SHA256 over the password with a random 16-byte salt, compared
//! in constant time. The round count is stored with the digest, so raising
//! [`DEFAULT_ROUNDS`] leaves existing digests verifiable.

use std::sync::LazyLock;

use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

const SALT_LEN: usize = 16;

/// PBKDF2 iterations applied to newly derived digests.
pub const DEFAULT_ROUNDS: u32 = 100_000;

/// Salted, stretched digest of a user's password.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordDigest {
    rounds: u32,
    #[serde(with = "hex_bytes")]
    salt: [u8; SALT_LEN],
    #[serde(with = "hex_bytes")]
    digest: [u8; 32],
}

/// Compared against when the user does not exist, so unknown users cost the
/// same as wrong passwords.
static DECOY: LazyLock<PasswordDigest> =
    LazyLock::new(|| PasswordDigest::with_salt("decoy", [0u8; SALT_LEN], DEFAULT_ROUNDS));

impl PasswordDigest {
    /// Derives a digest for `password` under a fresh random salt.
    #[must_use]
    pub fn derive(password: &str) -> Self {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        Self::with_salt(password, salt, DEFAULT_ROUNDS)
    }

    fn with_salt(password: &str, salt: [u8; SALT_LEN], rounds: u32) -> Self {
        Self { rounds, salt, digest: stretch(password, &salt, rounds) }
    }

    /// Number of PBKDF2 iterations this digest was derived with.
    #[must_use]
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Returns `true` if `password` produces this digest.
    #[must_use]
    pub fn verify(&self, password: &str) -> bool {
        let candidate = Zeroizing::new(stretch(password, &self.salt, self.rounds));
        candidate.as_slice().ct_eq(self.digest.as_slice()).into()
    }

    /// Burns the same work as [`verify`](Self::verify) and always fails.
    pub(crate) fn verify_decoy(password: &str) -> bool {
        let _ = DECOY.verify(password);
        false
    }
}

fn stretch(password: &str, salt: &[u8], rounds: u32) -> [u8; 32] {
    let mut out = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, rounds, &mut out);
    out
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub(super) fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let raw = String::deserialize(deserializer)?;
        let bytes = hex::decode(&raw).map_err(D::Error::custom)?;
        bytes.try_into().map_err(|_| D::Error::custom(format!("expected {N} bytes")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_accepts_only_the_original_password() {
        let digest = PasswordDigest::derive("example");
        assert!(digest.verify("example"));
        assert!(!digest.verify("Example"));
        assert!(!digest.verify(""));
    }

    #[test]
    fn test_salts_differ_between_derivations() {
        let a = PasswordDigest::derive("same");
        let b = PasswordDigest::derive("same");
        assert_ne!(a, b);
        assert!(a.verify("same") && b.verify("same"));
    }

    #[test]
    fn test_digest_is_stretched_not_a_single_hash() {
        use sha2::Digest;

        let salt = [7u8; SALT_LEN];
        let digest = PasswordDigest::with_salt("example", salt, DEFAULT_ROUNDS);
        assert_eq!(digest.rounds(), DEFAULT_ROUNDS);

        let mut single = Sha256::new();
        single.update(salt);
        single.update(b"example");
        let single: [u8; 32] = single.finalize().into();
        assert_ne!(digest.digest, single);

        let cheaper = PasswordDigest::with_salt("example", salt, 1);
        assert_ne!(digest.digest, cheaper.digest);
    }

    #[test]
    fn test_stored_rounds_drive_verification() {
        let legacy = PasswordDigest::with_salt("example", [1u8; SALT_LEN], 1_000);
        let json = serde_json::to_string(&legacy).unwrap();
        assert!(json.contains(r#""rounds":1000"#));

        let back: PasswordDigest = serde_json::from_str(&json).unwrap();
        assert!(back.verify("example"));
        assert!(!back.verify("other"));
    }

    #[test]
    fn test_decoy_never_matches() {
        assert!(!PasswordDigest::verify_decoy("decoy"));
    }

    #[test]
    fn test_serde_round_trip_keeps_verification() {
        let digest = PasswordDigest::derive("example");
        let json = serde_json::to_string(&digest).unwrap();
        assert!(!json.contains("example"));

        let back: PasswordDigest = serde_json::from_str(&json).unwrap();
        assert!(back.verify("example"));
    }
}
