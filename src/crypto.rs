//! Hash and HMAC primitives shared by the acquirer adapters.
//!
//! Every function here is pure: the same algorithm, data and key always
//! produce the same bytes. Verification recomputes the value and compares it
//! in constant time.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

/// Text encoding a provider expects for a digest or signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Hex,
    Base64,
}

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid HMAC key")]
    InvalidKey,
    #[error("Invalid {0:?} encoding: {1}")]
    InvalidEncoding(Encoding, String),
}

pub fn hash(algorithm: HashAlgorithm, data: &[u8]) -> Vec<u8> {
    match algorithm {
        HashAlgorithm::Md5 => Md5::digest(data).to_vec(),
        HashAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
        HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
        HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
    }
}

pub fn hmac(algorithm: HashAlgorithm, data: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    match algorithm {
        HashAlgorithm::Md5 => compute_mac::<Hmac<Md5>>(data, key),
        HashAlgorithm::Sha1 => compute_mac::<Hmac<Sha1>>(data, key),
        HashAlgorithm::Sha256 => compute_mac::<Hmac<Sha256>>(data, key),
        HashAlgorithm::Sha512 => compute_mac::<Hmac<Sha512>>(data, key),
    }
}

/// Verifies `expected` against the HMAC of `data` using the constant-time
/// comparison provided by the `hmac` crate.
pub fn verify_hmac(algorithm: HashAlgorithm, data: &[u8], key: &[u8], expected: &[u8]) -> bool {
    match algorithm {
        HashAlgorithm::Md5 => verify_mac::<Hmac<Md5>>(data, key, expected),
        HashAlgorithm::Sha1 => verify_mac::<Hmac<Sha1>>(data, key, expected),
        HashAlgorithm::Sha256 => verify_mac::<Hmac<Sha256>>(data, key, expected),
        HashAlgorithm::Sha512 => verify_mac::<Hmac<Sha512>>(data, key, expected),
    }
}

pub fn encode(encoding: Encoding, bytes: &[u8]) -> String {
    match encoding {
        Encoding::Hex => hex::encode(bytes),
        Encoding::Base64 => BASE64.encode(bytes),
    }
}

pub fn decode(encoding: Encoding, value: &str) -> Result<Vec<u8>, CryptoError> {
    match encoding {
        Encoding::Hex => hex::decode(value.trim())
            .map_err(|e| CryptoError::InvalidEncoding(encoding, e.to_string())),
        Encoding::Base64 => BASE64
            .decode(value.trim())
            .map_err(|e| CryptoError::InvalidEncoding(encoding, e.to_string())),
    }
}

/// Hashes `data` and renders the digest in the given encoding.
pub fn digest_string(algorithm: HashAlgorithm, encoding: Encoding, data: &[u8]) -> String {
    encode(encoding, &hash(algorithm, data))
}

/// Computes an HMAC signature and renders it in the given encoding.
pub fn sign(
    algorithm: HashAlgorithm,
    encoding: Encoding,
    data: &[u8],
    key: &[u8],
) -> Result<String, CryptoError> {
    hmac(algorithm, data, key).map(|mac| encode(encoding, &mac))
}

/// Checks an encoded HMAC signature. A signature that does not decode is
/// treated as a mismatch.
pub fn verify_signature(
    algorithm: HashAlgorithm,
    encoding: Encoding,
    data: &[u8],
    key: &[u8],
    signature: &str,
) -> bool {
    match decode(encoding, signature) {
        Ok(expected) => verify_hmac(algorithm, data, key, &expected),
        Err(_) => false,
    }
}

/// Checks an encoded plain digest, for providers that sign with a keyed hash
/// built by concatenation instead of HMAC.
pub fn verify_digest(
    algorithm: HashAlgorithm,
    encoding: Encoding,
    data: &[u8],
    signature: &str,
) -> bool {
    match decode(encoding, signature) {
        Ok(expected) => constant_time_eq(&hash(algorithm, data), &expected),
        Err(_) => false,
    }
}

fn compute_mac<M: Mac + hmac::digest::KeyInit>(
    data: &[u8],
    key: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let mut mac = <M as Mac>::new_from_slice(key).map_err(|_| CryptoError::InvalidKey)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn verify_mac<M: Mac + hmac::digest::KeyInit>(data: &[u8], key: &[u8], expected: &[u8]) -> bool {
    match <M as Mac>::new_from_slice(key) {
        Ok(mut mac) => {
            mac.update(data);
            mac.verify_slice(expected).is_ok()
        }
        Err(_) => false,
    }
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }

    left.iter()
        .zip(right.iter())
        .fold(0u8, |acc, (l, r)| acc | (l ^ r))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_vectors() {
        assert_eq!(
            hex::encode(hash(HashAlgorithm::Md5, b"")),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(
            hex::encode(hash(HashAlgorithm::Sha1, b"abc")),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            hex::encode(hash(HashAlgorithm::Sha256, b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hash(HashAlgorithm::Sha512, b"abc").len(), 64);
    }

    #[test]
    fn test_hmac_vectors() {
        let data = b"what do ya want for nothing?";
        let key = b"Jefe";

        assert_eq!(
            hex::encode(hmac(HashAlgorithm::Md5, data, key).unwrap()),
            "750c783e6ab0b503eaa86e310a5db738"
        );
        assert_eq!(
            hex::encode(hmac(HashAlgorithm::Sha1, data, key).unwrap()),
            "effcdf6ae5eb2fa2d27416d5f184df9c259a7c79"
        );
        assert_eq!(
            hex::encode(hmac(HashAlgorithm::Sha256, data, key).unwrap()),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_sign_and_verify_base64() {
        let signature = sign(HashAlgorithm::Sha1, Encoding::Base64, b"order-1", b"key").unwrap();
        assert!(verify_signature(
            HashAlgorithm::Sha1,
            Encoding::Base64,
            b"order-1",
            b"key",
            &signature
        ));
        assert!(!verify_signature(
            HashAlgorithm::Sha1,
            Encoding::Base64,
            b"order-2",
            b"key",
            &signature
        ));
    }

    #[test]
    fn test_verify_rejects_garbage_signature() {
        assert!(!verify_signature(
            HashAlgorithm::Sha256,
            Encoding::Hex,
            b"payload",
            b"key",
            "not-hex"
        ));
        assert!(!verify_digest(HashAlgorithm::Md5, Encoding::Hex, b"payload", "zz"));
    }

    #[test]
    fn test_verify_digest() {
        let digest = digest_string(HashAlgorithm::Md5, Encoding::Hex, b"42secret");
        assert!(verify_digest(HashAlgorithm::Md5, Encoding::Hex, b"42secret", &digest));
        assert!(!verify_digest(HashAlgorithm::Md5, Encoding::Hex, b"43secret", &digest));
    }

    #[test]
    fn test_constant_time_eq_length_mismatch() {
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"abc", b"abc"));
    }
}
