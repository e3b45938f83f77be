//! Detached-JWS signer (C6): RS256 `header..signature` over AA payloads, with
//! an HMAC-SHA256 fallback gated by [`CoreConfig::production`].

use crate::config::CoreConfig;
use crate::crypto;
use crate::encoding::b64url_encode;
use crate::error::NovaError;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;

#[derive(Debug, Clone, Serialize)]
struct JwsHeader<'a> {
    alg: &'a str,
    kid: &'a str,
    b64: bool,
    crit: [&'a str; 1],
}

/// Canonical JSON encoding of `payload` for the JWS signing input.
fn canonical_payload(payload: &Value) -> Result<Vec<u8>, NovaError> {
    Ok(serde_json::to_vec(payload)?)
}

fn signing_input(header_b64: &str, payload_b64: &str) -> Vec<u8> {
    format!("{header_b64}.{payload_b64}").into_bytes()
}

/// Produces `header..signature`: RS256 when a private key is configured,
/// otherwise an HMAC-SHA256 fallback (dev only).
pub fn sign_detached(
    payload: &Value,
    client_id: &str,
    config: &CoreConfig,
) -> Result<String, NovaError> {
    let header = JwsHeader {
        alg: "RS256",
        kid: client_id,
        b64: false,
        crit: ["b64"],
    };
    let header_json = serde_json::to_vec(&header)?;
    let header_b64 = b64url_encode(header_json);
    let payload_bytes = canonical_payload(payload)?;
    let payload_b64 = b64url_encode(&payload_bytes);
    let input = signing_input(&header_b64, &payload_b64);

    let signature_b64 = match &config.fiu_private_key_pem {
        Some(pem) => {
            let signing_key = RsaPrivateKey::from_pkcs8_pem(pem)
                .map(SigningKey::<Sha256>::new)
                .map_err(|e| NovaError::KeyUnavailable(e.to_string()))?;
            let sig = signing_key.sign(&input);
            b64url_encode(sig.to_bytes())
        }
        None => {
            if config.production {
                return Err(NovaError::KeyUnavailable(
                    "FIU private key unavailable".to_string(),
                ));
            }
            tracing::warn!("jws: signing private key unavailable, falling back to HMAC (dev only)");
            let mac = crypto::hmac_sha256(config.jws_hmac_fallback_secret.as_bytes(), &input);
            b64url_encode(mac)
        }
    };

    Ok(format!("{header_b64}..{signature_b64}"))
}

/// Verifies a detached JWS produced by [`sign_detached`] against `payload`,
/// used by tests and by anything that needs to mirror-check a signature.
pub fn verify_detached(
    detached: &str,
    payload: &Value,
    public_pem: &str,
) -> Result<bool, NovaError> {
    let mut parts = detached.split('.');
    let header_b64 = parts.next().unwrap_or_default();
    let empty = parts.next().unwrap_or_default();
    let signature_b64 = parts.next().unwrap_or_default();
    if !empty.is_empty() {
        return Ok(false);
    }

    let payload_bytes = canonical_payload(payload)?;
    let payload_b64 = b64url_encode(&payload_bytes);
    let input = signing_input(header_b64, &payload_b64);

    let signature_bytes = crate::encoding::b64url_decode(signature_b64)
        .map_err(|e| NovaError::Internal(e.to_string()))?;
    let public_key = RsaPublicKey::from_public_key_pem(public_pem)
        .map_err(|e| NovaError::KeyUnavailable(e.to_string()))?;
    let verifying_key = VerifyingKey::<Sha256>::new(public_key);
    let signature = match Signature::try_from(signature_bytes.as_slice()) {
        Ok(sig) => sig,
        Err(_) => return Ok(false),
    };

    Ok(verifying_key.verify(&input, &signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
    use serde_json::json;

    fn keypair() -> (String, String) {
        let mut rng = rand::rngs::OsRng;
        let private = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let public = RsaPublicKey::from(&private);
        (
            private.to_pkcs8_pem(LineEnding::LF).unwrap().to_string(),
            public.to_public_key_pem(LineEnding::LF).unwrap(),
        )
    }

    #[test]
    fn detached_shape_has_two_dots_and_empty_payload_segment() {
        let mut config = CoreConfig::default();
        config.fiu_private_key_pem = None;
        let jws = sign_detached(&json!({"a": 1}), "client-1", &config).unwrap();
        let parts: Vec<&str> = jws.split('.').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[1].is_empty());
    }

    #[test]
    fn rsa_roundtrip_verifies() {
        let (private_pem, public_pem) = keypair();
        let mut config = CoreConfig::default();
        config.fiu_private_key_pem = Some(private_pem);
        let payload = json!({"ver": "2.0.0", "txnid": "abc"});
        let jws = sign_detached(&payload, "client-1", &config).unwrap();
        assert!(verify_detached(&jws, &payload, &public_pem).unwrap());
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let (private_pem, public_pem) = keypair();
        let mut config = CoreConfig::default();
        config.fiu_private_key_pem = Some(private_pem);
        let payload = json!({"ver": "2.0.0", "txnid": "abc"});
        let jws = sign_detached(&payload, "client-1", &config).unwrap();
        let tampered = json!({"ver": "2.0.0", "txnid": "abd"});
        assert!(!verify_detached(&jws, &tampered, &public_pem).unwrap());
    }

    #[test]
    fn hmac_fallback_used_when_no_private_key_in_dev_mode() {
        let mut config = CoreConfig::default();
        config.production = false;
        config.fiu_private_key_pem = None;
        let jws = sign_detached(&json!({"x": 1}), "client-1", &config).unwrap();
        assert!(jws.contains(".."));
    }

    #[test]
    fn production_mode_rejects_missing_private_key() {
        let mut config = CoreConfig::default();
        config.production = true;
        config.fiu_private_key_pem = None;
        let err = sign_detached(&json!({"x": 1}), "client-1", &config).unwrap_err();
        assert!(matches!(err, NovaError::KeyUnavailable(_)));
    }
}
