//! Aadhaar OTP authentication state machine: IDLE -> AWAITING_OTP ->
//! VERIFIED or LOCKED, driving the UIDAI Auth XML envelope.

use crate::capabilities::{Http, SmsSender};
use crate::config::CoreConfig;
use crate::crypto::{self, AES_KEY_LEN};
use crate::encoding::{b64url_encode, ist_timestamp, xml_escape};
use crate::error::NovaError;
use crate::identity_store::IdentityStore;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::OnceLock;
use uuid::Uuid;

fn aadhaar_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{12}$").unwrap())
}

fn otp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{6}$").unwrap())
}

#[derive(Debug, Clone, Serialize)]
pub struct InitiateResult {
    pub txn_id: Uuid,
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyResult {
    pub jwt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JwtClaims {
    sub: String,
    txn: String,
    iat: i64,
    exp: i64,
}

/// Builds `<Pid ts=.. ver="2.0" wadh=""><Pv otp=".."/></Pid>`.
fn build_pid_xml(otp: &str) -> String {
    format!(
        "<Pid ts=\"{}\" ver=\"2.0\" wadh=\"\"><Pv otp=\"{}\"/></Pid>",
        ist_timestamp(Utc::now()),
        xml_escape(otp)
    )
}

struct SealedPid {
    pid_xml: String,
    wrapped_key: Vec<u8>,
    sealed_iv: [u8; 12],
    sealed_ciphertext: Vec<u8>,
    sealed_tag: [u8; 16],
    hmac: [u8; 32],
    key_degraded: bool,
}

fn seal_pid(otp: &str, config: &CoreConfig) -> Result<SealedPid, NovaError> {
    let pid_xml = build_pid_xml(otp);
    let session_key: [u8; AES_KEY_LEN] = crypto::random_aes_key();

    let sealed = crypto::seal_aes_gcm(&session_key, pid_xml.as_bytes())
        .map_err(|e| NovaError::Internal(e.to_string()))?;
    let mac = crypto::hmac_sha256(&session_key, pid_xml.as_bytes());

    let (wrapped_key, key_degraded) = match config
        .uidai_public_key_pem
        .as_deref()
        .map(|pem| crypto::wrap_rsa_oaep_sha256(pem, &session_key))
    {
        Some(Ok(wrapped)) => (wrapped, false),
        Some(Err(_)) | None => {
            if config.production {
                return Err(NovaError::KeyUnavailable(
                    "UIDAI public key unavailable".to_string(),
                ));
            }
            tracing::warn!("aadhaar: UIDAI public key unavailable, using degraded sentinel wrap");
            (b"degraded-sentinel-wrapped-key".to_vec(), true)
        }
    };

    Ok(SealedPid {
        pid_xml,
        wrapped_key,
        sealed_iv: sealed.iv,
        sealed_ciphertext: sealed.ciphertext,
        sealed_tag: sealed.tag,
        hmac: mac,
        key_degraded,
    })
}

/// Builds the full UIDAI Auth envelope around a sealed PID block.
fn build_auth_xml(uid: &str, sealed: &SealedPid) -> String {
    let now = Utc::now();
    let ts = ist_timestamp(now);
    let txn = Uuid::new_v4();

    let mut data = Vec::with_capacity(sealed.sealed_iv.len() + sealed.sealed_ciphertext.len() + sealed.sealed_tag.len());
    data.extend_from_slice(&sealed.sealed_iv);
    data.extend_from_slice(&sealed.sealed_ciphertext);
    data.extend_from_slice(&sealed.sealed_tag);

    format!(
        "<Auth uid=\"{uid}\" ac=\"public\" sa=\"public\" ver=\"2.5\" txn=\"{txn}\" lk=\"public\" rc=\"Y\" tid=\"public\"><Uses pi=\"n\" pa=\"n\" pfa=\"n\" bio=\"n\" bt=\"n\" pin=\"n\" otp=\"y\"/><Tkn type=\"001\" value=\"\"/><Meta udc=\"AADHAAR_OTP_AUTH\" fdc=\"\" idc=\"\" pip=\"\" lot=\"P\" lov=\"\"/><Skey ci=\"{ts}\">{skey}</Skey><Hmac>{hmac}</Hmac><Data type=\"X\">{data}</Data></Auth>",
        uid = xml_escape(uid),
        txn = txn,
        ts = ts,
        skey = b64url_encode(&sealed.wrapped_key),
        hmac = b64url_encode(sealed.hmac),
        data = b64url_encode(&data),
    )
}

/// Aadhaar OTP state machine. Owns the rate-limited identity store.
pub struct AadhaarEngine {
    store: Arc<IdentityStore>,
    config: Arc<CoreConfig>,
    http: Arc<dyn Http>,
    sms: Option<Arc<dyn SmsSender>>,
}

impl AadhaarEngine {
    pub fn new(
        store: Arc<IdentityStore>,
        config: Arc<CoreConfig>,
        http: Arc<dyn Http>,
        sms: Option<Arc<dyn SmsSender>>,
    ) -> Self {
        Self {
            store,
            config,
            http,
            sms,
        }
    }

    fn hashed_id(aadhaar: &str) -> String {
        crypto::sha256_hex(aadhaar.as_bytes())
    }

    fn guard_lock(&self, hashed: &str) -> Result<(), NovaError> {
        if self.store.is_locked(hashed) {
            return Err(NovaError::RateLimited {
                remaining_lockout_seconds: self.store.remaining_lockout(hashed),
            });
        }
        Ok(())
    }

    /// initiate(aadhaar).
    pub async fn initiate(
        &self,
        aadhaar: &str,
        demo_phone: Option<&str>,
    ) -> Result<InitiateResult, NovaError> {
        if !aadhaar_re().is_match(aadhaar) {
            return Err(NovaError::validation("aadhaar must be 12 digits"));
        }
        let hashed = Self::hashed_id(aadhaar);
        self.guard_lock(&hashed)?;

        let sealed = seal_pid("", &self.config)?;
        let auth_xml = build_auth_xml(aadhaar, &sealed);
        let url = format!(
            "{}{}/{}/{}",
            self.config.uidai_auth_base,
            self.config.aua_code,
            aadhaar.chars().next().unwrap_or('0'),
            aadhaar.chars().nth(1).unwrap_or('0'),
        );

        let txn_id = Uuid::new_v4();
        let mut degraded = sealed.key_degraded;

        match self
            .http
            .post_xml(&url, auth_xml, self.config.aa_timeout)
            .await
        {
            Ok(_) => {}
            Err(_) if !self.config.production => {
                tracing::warn!("aadhaar: UIDAI initiate unreachable, degrading to test OTP");
                degraded = true;
                if let (Some(sms), Some(phone)) = (&self.sms, demo_phone) {
                    let _ = sms
                        .send(phone, &format!("Your OTP is {}", self.config.degraded_test_otp))
                        .await;
                }
            }
            Err(e) => return Err(e),
        }

        self.store.put_session(&hashed, txn_id);
        Ok(InitiateResult { txn_id, degraded })
    }

    /// verify(otp, txn_id).
    pub async fn verify(
        &self,
        aadhaar: &str,
        otp: &str,
        txn_id: Uuid,
    ) -> Result<VerifyResult, NovaError> {
        if !aadhaar_re().is_match(aadhaar) {
            return Err(NovaError::validation("aadhaar must be 12 digits"));
        }
        if !otp_re().is_match(otp) {
            return Err(NovaError::validation("otp must be 6 digits"));
        }
        let hashed = Self::hashed_id(aadhaar);
        self.guard_lock(&hashed)?;

        let session = self
            .store
            .get_session(&hashed)
            .ok_or_else(|| NovaError::not_found("no active OTP session"))?;
        if session.txn_id != txn_id {
            return Err(NovaError::conflict("txn_id does not match active session"));
        }

        let sealed = seal_pid(otp, &self.config)?;
        let auth_xml = build_auth_xml(aadhaar, &sealed);
        let url = format!(
            "{}{}/{}/{}",
            self.config.uidai_auth_base,
            self.config.aua_code,
            aadhaar.chars().next().unwrap_or('0'),
            aadhaar.chars().nth(1).unwrap_or('0'),
        );

        let backend_ok = match self
            .http
            .post_xml(&url, auth_xml, self.config.aa_timeout)
            .await
        {
            Ok(response) => response.contains("ret=\"y\"") || response.contains("ret='y'"),
            Err(_) if !self.config.production => otp == self.config.degraded_test_otp,
            Err(e) => return Err(e),
        };

        if !backend_ok {
            self.store.increment_failed(&hashed);
            return Err(NovaError::validation("otp verification failed"));
        }

        let now = Utc::now();
        let claims = JwtClaims {
            sub: hashed.clone(),
            txn: txn_id.to_string(),
            iat: now.timestamp(),
            exp: (now + chrono::Duration::from_std(self.config.jwt_expiry).unwrap()).timestamp(),
        };
        let jwt = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| NovaError::Internal(e.to_string()))?;

        self.store.clear_session(&hashed);
        self.store.reset(&hashed);

        Ok(VerifyResult { jwt })
    }
}
