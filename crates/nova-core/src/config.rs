//! Engine-wide configuration. Key material, base URLs, and the single
//! `production` flag that gates every degraded-mode fallback elsewhere in
//! the engine.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Disables every degraded-mode fallback (sentinel RSA key, HMAC JWS
    /// fallback, synthesised AA session, configured test OTP) when true.
    pub production: bool,

    /// UIDAI public key PEM used to wrap the Aadhaar PID session key.
    pub uidai_public_key_pem: Option<String>,
    /// UIDAI auth endpoint base, e.g. `https://auth.uidai.gov.in/`.
    pub uidai_auth_base: String,
    /// AUA code appended to the Aadhaar auth URL path.
    pub aua_code: String,
    /// OTP accepted without a live UIDAI backend, dev-mode only.
    pub degraded_test_otp: String,

    /// AA/FIU private key PEM used to sign FI-request JWS payloads.
    pub fiu_private_key_pem: Option<String>,
    /// HMAC fallback secret used when `fiu_private_key_pem` is unavailable.
    pub jws_hmac_fallback_secret: String,
    pub client_api_key: String,
    pub fiu_entity_id: String,
    pub aa_base_url: String,

    pub jwt_secret: String,
    pub jwt_expiry: Duration,

    pub aa_timeout: Duration,
    pub bbps_gsp_timeout: Duration,
    pub oauth_timeout: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            production: false,
            uidai_public_key_pem: None,
            uidai_auth_base: "https://auth.uidai.gov.in/".to_string(),
            aua_code: "public".to_string(),
            degraded_test_otp: "123456".to_string(),
            fiu_private_key_pem: None,
            jws_hmac_fallback_secret: "nova-dev-jws-secret".to_string(),
            client_api_key: "dev-client-api-key".to_string(),
            fiu_entity_id: "dev-fiu-entity".to_string(),
            aa_base_url: "https://aa.example.invalid".to_string(),
            jwt_secret: "nova-dev-jwt-secret".to_string(),
            jwt_expiry: Duration::from_secs(30 * 60),
            aa_timeout: Duration::from_secs(30),
            bbps_gsp_timeout: Duration::from_secs(15),
            oauth_timeout: Duration::from_secs(10),
        }
    }
}
