//! # RSA Signatures
//!
//! PKCS#1 v1.5 with a SHA-1 `DigestInfo`, as produced by
//! `openssl dgst -sha1 -sign`. Signing is deterministic, so a fixed key and
//! digest give a fixed `VK_MAC`, which is what the known-answer tests pin.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha1::{Digest, Sha1};
use thiserror::Error;

use crate::config::EXPECTED_SIGNATURE_LENGTH;

/// Errors while producing a signature. Verification never errors.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("RSA signing failed: {0}")]
    SigningFailed(String),

    #[error("signature is {actual} bytes, expected {expected}")]
    UnexpectedLength { expected: usize, actual: usize },
}

/// Signs `digest` and checks the result has the length banks expect.
pub fn sign(digest: &[u8], key: &RsaPrivateKey) -> Result<Vec<u8>, SignatureError> {
    let hashed = Sha1::digest(digest);
    let signature = key
        .sign(Pkcs1v15Sign::new::<Sha1>(), &hashed)
        .map_err(|e| SignatureError::SigningFailed(e.to_string()))?;

    if signature.len() != EXPECTED_SIGNATURE_LENGTH {
        return Err(SignatureError::UnexpectedLength {
            expected: EXPECTED_SIGNATURE_LENGTH,
            actual: signature.len(),
        });
    }
    Ok(signature)
}

/// True if `signature` is a valid signature of `digest` under `key`.
///
/// Wrong length, wrong key and tampered data all come back as `false`.
pub fn verify(digest: &[u8], signature: &[u8], key: &RsaPublicKey) -> bool {
    let hashed = Sha1::digest(digest);
    key.verify(Pkcs1v15Sign::new::<Sha1>(), &hashed, signature)
        .is_ok()
}

/// [`sign`], base64-encoded for `VK_MAC`.
pub fn sign_base64(digest: &[u8], key: &RsaPrivateKey) -> Result<String, SignatureError> {
    sign(digest, key).map(|signature| STANDARD.encode(signature))
}

/// [`verify`] for a base64 `VK_MAC`. Undecodable input is `false`.
pub fn verify_base64(digest: &[u8], signature: &str, key: &RsaPublicKey) -> bool {
    match STANDARD.decode(signature.trim()) {
        Ok(bytes) => verify(digest, &bytes, key),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bank_private_key, merchant_private_key};

    #[test]
    fn test_sign_then_verify() {
        let key = merchant_private_key();
        let signature = sign(b"0041012", &key).unwrap();
        assert_eq!(signature.len(), 256);
        assert!(verify(b"0041012", &signature, &key.to_public_key()));
    }

    #[test]
    fn test_signing_is_deterministic() {
        let key = merchant_private_key();
        assert_eq!(
            sign_base64(b"digest", &key).unwrap(),
            sign_base64(b"digest", &key).unwrap()
        );
    }

    #[test]
    fn test_single_bit_flip_in_digest_fails() {
        let key = merchant_private_key();
        let signature = sign(b"0041111", &key).unwrap();
        assert!(!verify(b"0041110", &signature, &key.to_public_key()));
    }

    #[test]
    fn test_single_bit_flip_in_signature_fails() {
        let key = merchant_private_key();
        let mut signature = sign(b"0041111", &key).unwrap();
        signature[100] ^= 0x01;
        assert!(!verify(b"0041111", &signature, &key.to_public_key()));
    }

    #[test]
    fn test_wrong_key_fails() {
        let signature = sign(b"payload", &merchant_private_key()).unwrap();
        assert!(!verify(
            b"payload",
            &signature,
            &bank_private_key().to_public_key()
        ));
    }

    #[test]
    fn test_base64_round_trip_and_garbage() {
        let key = merchant_private_key();
        let public = key.to_public_key();
        let mac = sign_base64(b"payload", &key).unwrap();
        assert!(verify_base64(b"payload", &mac, &public));
        assert!(!verify_base64(b"payload", "not base64!!", &public));
        assert!(!verify_base64(b"payload", "", &public));
    }

    #[test]
    fn test_truncated_signature_fails_without_panic() {
        let key = merchant_private_key();
        let signature = sign(b"payload", &key).unwrap();
        assert!(!verify(b"payload", &signature[..255], &key.to_public_key()));
    }
}
