//! Password hashing, token hashing and secret handling.

use std::fmt;

use argon2::{Algorithm, Argon2, Params, PasswordVerifier, Version};
use password_hash::{PasswordHash, PasswordHasher as _, SaltString};
use rand::RngCore;
use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::OsRng;
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::AuthError;

/// Default length of the random part of generated tokens, in characters.
pub const DEFAULT_TOKEN_LENGTH: usize = 32;

/// Plaintext credential material: passwords, codes, tokens, client secrets.
///
/// Formatting never shows the value and equality runs in constant time.
/// Serialization does write the plaintext, since token responses carry it.
///
/// ```rust
/// use portcullis::SecretString;
///
/// let code = SecretString::new("AC.8fj2k");
/// assert_eq!(format!("{code:?}"), r#"SecretString("***")"#);
/// assert_eq!(code.expose_secret(), "AC.8fj2k");
/// ```
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        self.0.as_str()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SecretString {
    fn from(secret: String) -> Self {
        Self(secret)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecretString").field(&"***").finish()
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq(self.0.as_bytes(), other.0.as_bytes())
    }
}

impl Eq for SecretString {}

impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose_secret())
    }
}

/// Turns user passwords into stored PHC strings and checks them later.
///
/// [`Argon2Hasher`] is what the gateway uses unless told otherwise.
pub trait PasswordHasher: Send + Sync {
    /// # Errors
    ///
    /// Returns `AuthError::PasswordHashError` if hashing fails.
    fn hash(&self, password: &str) -> Result<String, AuthError>;

    /// `Ok(false)` for a wrong password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::PasswordHashError` if `hash` is not a usable PHC
    /// string.
    fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError>;
}

/// Argon2id with fixed cost parameters for new hashes. Verification takes
/// the parameters recorded in each stored hash.
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    /// `memory_cost` is in KiB.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ConfigurationError` for parameters Argon2 rejects.
    pub fn new(memory_cost: u32, time_cost: u32, parallelism: u32) -> Result<Self, AuthError> {
        let params = Params::new(memory_cost, time_cost, parallelism, None)
            .map_err(|e| AuthError::ConfigurationError(format!("argon2 parameters: {e}")))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            params: Params::DEFAULT,
        }
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|_| AuthError::PasswordHashError)?;
        Ok(hash.to_string())
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let stored = PasswordHash::new(hash).map_err(|_| AuthError::PasswordHashError)?;
        match self.argon2().verify_password(password.as_bytes(), &stored) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(_) => Err(AuthError::PasswordHashError),
        }
    }
}

/// `length` alphanumeric characters from the OS random source.
pub fn generate_token(length: usize) -> String {
    Alphanumeric.sample_string(&mut OsRng, length)
}

pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    buf
}

/// Hex SHA-256 digest. Tokens, codes and client secrets are stored this way.
///
/// All of them are high-entropy, so a fast hash is enough.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Checks `candidate` against a stored [`hash_token`] digest.
pub fn verify_token_hash(candidate: &str, stored_hash: &str) -> bool {
    constant_time_eq(hash_token(candidate).as_bytes(), stored_hash.as_bytes())
}

/// Compares without short-circuiting on the first differing byte. Lengths
/// are not secret.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_hasher() -> Argon2Hasher {
        Argon2Hasher::new(1024, 1, 1).unwrap()
    }

    #[test]
    fn test_tokens_are_alphanumeric_and_distinct() {
        let a = generate_token(DEFAULT_TOKEN_LENGTH);
        let b = generate_token(DEFAULT_TOKEN_LENGTH);

        assert_eq!(a.len(), DEFAULT_TOKEN_LENGTH);
        assert!(a.bytes().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
        assert!(generate_token(0).is_empty());
    }

    #[test]
    fn test_hash_token_is_stable_hex() {
        let digest = hash_token("RT.abc");
        assert_eq!(digest, hash_token("RT.abc"));
        assert!(digest.bytes().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(
            hash_token(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );

        assert!(verify_token_hash("RT.abc", &digest));
        assert!(!verify_token_hash("RT.abd", &digest));
        assert!(!verify_token_hash("RT.abc", "not-a-digest"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"", b""));
        assert!(constant_time_eq(b"same", b"same"));
        assert!(!constant_time_eq(b"same", b"sane"));
        assert!(!constant_time_eq(b"same", b"same!"));
    }

    #[test]
    fn test_argon2_round_trip() {
        let hasher = fast_hasher();
        let hash = hasher.hash("wonderland").unwrap();

        assert!(hash.starts_with("$argon2id$v=19$m=1024,t=1,p=1$"));
        assert_eq!(hasher.verify("wonderland", &hash), Ok(true));
        assert_eq!(hasher.verify("Wonderland", &hash), Ok(false));
        // verification follows the stored parameters
        assert_eq!(Argon2Hasher::default().verify("wonderland", &hash), Ok(true));
    }

    #[test]
    fn test_argon2_rejects_bad_input() {
        assert_eq!(
            fast_hasher().verify("x", "plaintext-password"),
            Err(AuthError::PasswordHashError)
        );
        assert!(matches!(
            Argon2Hasher::new(1, 1, 1),
            Err(AuthError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_secret_string_hides_value() {
        let secret = SecretString::new("s3cret");

        assert_eq!(format!("{secret:?}"), r#"SecretString("***")"#);
        assert_eq!(format!("{secret}"), "***");
        assert_eq!(secret.len(), 6);
        assert_eq!(serde_json::to_string(&secret).unwrap(), r#""s3cret""#);
        assert_eq!(secret, SecretString::from("s3cret".to_owned()));
        assert_ne!(secret, SecretString::new("s3creT"));
    }
}
