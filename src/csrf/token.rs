//! CSRF token encoding.
//!
//! The real token is 32 random bytes. It travels in two shapes:
//!
//! - in the cookie as `base64url(token).hex(hmac)`, the MAC binding it to
//!   the cookie name and the server key;
//! - in pages and request headers masked with a fresh one-time pad, as
//!   `base64url(pad || pad ^ token)`, so the value differs on every render.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::crypto::random_bytes;

type HmacSha256 = Hmac<Sha256>;

pub const TOKEN_LEN: usize = 32;

pub type RawToken = [u8; TOKEN_LEN];

pub fn generate() -> RawToken {
    let mut token = [0u8; TOKEN_LEN];
    token.copy_from_slice(&random_bytes(TOKEN_LEN));
    token
}

fn mac(key: &[u8], cookie_name: &str, encoded: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(cookie_name.as_bytes());
    mac.update(b"|");
    mac.update(encoded.as_bytes());
    Some(mac)
}

/// Encodes the token for the cookie. `None` only if the key is unusable.
pub fn sign(token: &RawToken, key: &[u8], cookie_name: &str) -> Option<String> {
    let encoded = URL_SAFE_NO_PAD.encode(token);
    let signature = mac(key, cookie_name, &encoded)?.finalize().into_bytes();
    Some(format!("{encoded}.{}", hex::encode(signature)))
}

/// Verifies a cookie value produced by [`sign`] and returns the token.
pub fn verify(value: &str, key: &[u8], cookie_name: &str) -> Option<RawToken> {
    let (encoded, signature_hex) = value.rsplit_once('.')?;
    let signature = hex::decode(signature_hex).ok()?;
    mac(key, cookie_name, encoded)?.verify_slice(&signature).ok()?;

    let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
    bytes.try_into().ok()
}

/// Masks the token with a fresh one-time pad.
pub fn mask(token: &RawToken) -> String {
    let pad = random_bytes(TOKEN_LEN);
    let mut out = Vec::with_capacity(TOKEN_LEN * 2);
    out.extend_from_slice(&pad);
    out.extend(pad.iter().zip(token).map(|(p, t)| p ^ t));
    URL_SAFE_NO_PAD.encode(out)
}

/// Reverses [`mask`]. Anything not exactly `2 * TOKEN_LEN` bytes decoded is
/// rejected.
pub fn unmask(masked: &str) -> Option<RawToken> {
    let bytes = URL_SAFE_NO_PAD.decode(masked.trim()).ok()?;
    if bytes.len() != TOKEN_LEN * 2 {
        return None;
    }
    let (pad, masked) = bytes.split_at(TOKEN_LEN);
    let mut token = [0u8; TOKEN_LEN];
    for (i, (p, m)) in pad.iter().zip(masked).enumerate() {
        token[i] = p ^ m;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn test_sign_and_verify() {
        let token = generate();
        let value = sign(&token, KEY, "_csrf").unwrap();
        assert_eq!(verify(&value, KEY, "_csrf"), Some(token));
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let token = generate();
        let value = sign(&token, KEY, "_csrf").unwrap();

        assert!(verify(&value, b"another-key-another-key-another!", "_csrf").is_none());
        assert!(verify(&value, KEY, "_other").is_none());

        let (_, signature) = value.rsplit_once('.').unwrap();
        let forged = format!("{}.{signature}", URL_SAFE_NO_PAD.encode(generate()));
        assert!(verify(&forged, KEY, "_csrf").is_none());

        assert!(verify("no-dot", KEY, "_csrf").is_none());
        assert!(verify("abc.zz", KEY, "_csrf").is_none());
    }

    #[test]
    fn test_mask_unmask() {
        let token = generate();
        let first = mask(&token);
        let second = mask(&token);

        assert_ne!(first, second);
        assert_eq!(unmask(&first), Some(token));
        assert_eq!(unmask(&second), Some(token));
    }

    #[test]
    fn test_unmask_rejects_wrong_length() {
        let token = generate();
        assert!(unmask(&URL_SAFE_NO_PAD.encode(token)).is_none());
        assert!(unmask("not base64!").is_none());
        assert!(unmask("").is_none());
    }
}
