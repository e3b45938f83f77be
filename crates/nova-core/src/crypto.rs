//! Crypto primitives (C1): AES-256-GCM seal/open, RSA-OAEP-SHA256 wrap,
//! HMAC-SHA256, SHA-256, and OS-backed random bytes.
//!
//! Every seal draws its IV here, immediately before use, so a caller can
//! never accidentally reuse one across two seals.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, RsaPublicKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const AES_KEY_LEN: usize = 32;
pub const AES_IV_LEN: usize = 12;
pub const AES_TAG_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("AES-GCM seal failed")]
    SealFailed,
    #[error("AES-GCM tag verification failed")]
    DecryptFailed,
    #[error("key material unavailable: {0}")]
    KeyUnavailable(String),
    #[error("malformed ciphertext: {0}")]
    Malformed(String),
}

/// AES-256-GCM ciphertext and detached tag.
#[derive(Debug, Clone)]
pub struct Sealed {
    pub iv: [u8; AES_IV_LEN],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; AES_TAG_LEN],
}

/// Draws a fresh 12-byte IV and seals `plaintext` under `key`.
pub fn seal_aes_gcm(key: &[u8; AES_KEY_LEN], plaintext: &[u8]) -> Result<Sealed, CryptoError> {
    let mut iv = [0u8; AES_IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut out = cipher
        .encrypt(Nonce::from_slice(&iv), Payload { msg: plaintext, aad: &[] })
        .map_err(|_| CryptoError::SealFailed)?;
    // the `aes-gcm` crate appends the tag to the ciphertext; split it back out
    // so our wire layout (IV || ciphertext || tag) stays explicit end to end.
    if out.len() < AES_TAG_LEN {
        return Err(CryptoError::SealFailed);
    }
    let tag_start = out.len() - AES_TAG_LEN;
    let tag_bytes = out.split_off(tag_start);
    let mut tag = [0u8; AES_TAG_LEN];
    tag.copy_from_slice(&tag_bytes);

    Ok(Sealed {
        iv,
        ciphertext: out,
        tag,
    })
}

/// Verifies the tag and decrypts. Never falls back to returning plaintext on failure.
pub fn open_aes_gcm(
    key: &[u8; AES_KEY_LEN],
    iv: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if iv.len() != AES_IV_LEN || tag.len() != AES_TAG_LEN {
        return Err(CryptoError::Malformed("iv/tag length mismatch".into()));
    }
    let mut combined = Vec::with_capacity(ciphertext.len() + AES_TAG_LEN);
    combined.extend_from_slice(ciphertext);
    combined.extend_from_slice(tag);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(iv), Payload { msg: &combined, aad: &[] })
        .map_err(|_| CryptoError::DecryptFailed)
}

/// Decrypts the AA/UIDAI wire layout `IV(12B) || ciphertext || tag(16B)`.
pub fn open_aes_gcm_packed(key: &[u8; AES_KEY_LEN], packed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if packed.len() < AES_IV_LEN + AES_TAG_LEN {
        return Err(CryptoError::Malformed(
            "blob shorter than IV+tag".to_string(),
        ));
    }
    let (iv, rest) = packed.split_at(AES_IV_LEN);
    let (ciphertext, tag) = rest.split_at(rest.len() - AES_TAG_LEN);
    open_aes_gcm(key, iv, ciphertext, tag)
}

/// RSA-OAEP-SHA256 wrap of `bytes` under a PEM-encoded RSA public key.
pub fn wrap_rsa_oaep_sha256(public_pem: &str, bytes: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let public_key = RsaPublicKey::from_public_key_pem(public_pem)
        .map_err(|e| CryptoError::KeyUnavailable(e.to_string()))?;
    let mut rng = OsRng;
    public_key
        .encrypt(&mut rng, Oaep::new::<Sha256>(), bytes)
        .map_err(|e| CryptoError::KeyUnavailable(e.to_string()))
}

type HmacSha256 = Hmac<Sha256>;

pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    let result = mac.finalize().into_bytes();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_ref());
    hex::encode(hasher.finalize())
}

/// OS-CSPRNG random bytes. Never a seeded pseudorandom stream.
pub fn random_bytes(n: usize) -> Vec<u8> {
    let mut out = vec![0u8; n];
    OsRng.fill_bytes(&mut out);
    out
}

pub fn random_aes_key() -> [u8; AES_KEY_LEN] {
    let mut key = [0u8; AES_KEY_LEN];
    OsRng.fill_bytes(&mut key);
    key
}
