//! Account Aggregator request/fetch pipeline (C7): FI-request, FI-fetch, and
//! the session store in between.

use crate::capabilities::Http;
use crate::config::CoreConfig;
use crate::consent::ConsentStore;
use crate::crypto;
use crate::encoding::{b64_standard_decode, iso_z};
use crate::error::NovaError;
use crate::jws::sign_detached;
use crate::types::{FiSession, FiSessionStatus, FiType};
use chrono::Utc;
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct FiRequestInput {
    pub consent_id: Uuid,
    pub fi_type: FiType,
    pub masked_account: Option<String>,
    pub link_ref: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct FiRequestResult {
    pub txn_id: Uuid,
    pub session_id: String,
    pub timestamp: String,
    pub jws_signature: String,
    pub degraded: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FiFetchInput {
    pub session_id: String,
    pub fip_id: Option<String>,
    pub link_ref_numbers: Option<Vec<String>>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct FiFetchResult {
    pub txn_id: Uuid,
    pub session_id: String,
    pub fi_plaintext: Value,
}

fn fi_request_payload(input: &FiRequestInput, txn_id: Uuid, consent_id: Uuid) -> Value {
    let now = Utc::now();
    let nonce = hex::encode(crypto::random_bytes(16));
    json!({
        "ver": "2.0.0",
        "timestamp": iso_z(now),
        "txnid": txn_id,
        "Consent": { "id": consent_id, "digitalSignature": "" },
        "FIDataRange": { "from": iso_z(now - chrono::Duration::days(365)), "to": iso_z(now) },
        "KeyMaterial": {
            "cryptoAlg": "ECDH",
            "curve": "Curve25519",
            "params": { "KeyPairGenerator": "ECDH" },
            "DHPublicKey": { "expiry": iso_z(now + chrono::Duration::hours(1)), "Parameters": "", "KeyValue": "" },
            "Nonce": nonce,
        },
        "FI": [{
            "fipId": "dev-fip",
            "data": [{
                "linkRefNumber": input.link_ref.clone().unwrap_or_default(),
                "maskedAccNumber": input.masked_account.clone().unwrap_or_default(),
                "fiType": input.fi_type,
            }],
        }],
    })
}

/// Account Aggregator pipeline. Holds the FI-session store keyed by `txn_id`
/// and the session keys negotiated per transfer (degraded-mode only: a real
/// ECDH handshake never reaches this process).
pub struct AaEngine {
    config: Arc<CoreConfig>,
    http: Arc<dyn Http>,
    consent: Arc<ConsentStore>,
    sessions: DashMap<Uuid, FiSession>,
    session_keys: DashMap<String, [u8; 32]>,
}

impl AaEngine {
    pub fn new(config: Arc<CoreConfig>, http: Arc<dyn Http>, consent: Arc<ConsentStore>) -> Self {
        Self {
            config,
            http,
            consent,
            sessions: DashMap::new(),
            session_keys: DashMap::new(),
        }
    }

    /// fi.request.
    pub async fn request(&self, input: FiRequestInput) -> Result<FiRequestResult, NovaError> {
        // Confirms the consent exists and is usable before any upstream call.
        let consent = self.consent.get(input.consent_id).await?;
        if !consent.fi_types.contains(&input.fi_type) {
            return Err(NovaError::validation(
                "fi_type is not covered by this consent",
            ));
        }

        let txn_id = Uuid::new_v4();
        let payload = fi_request_payload(&input, txn_id, input.consent_id);
        let jws_signature = sign_detached(&payload, &self.config.client_api_key, &self.config)?;

        let mut headers = HashMap::new();
        headers.insert("X-JWS-Signature".to_string(), jws_signature.clone());
        headers.insert("client_api_key".to_string(), self.config.client_api_key.clone());
        headers.insert("fiu_entity_id".to_string(), self.config.fiu_entity_id.clone());

        let url = format!("{}/FI/request", self.config.aa_base_url);
        let now = Utc::now();

        let (session_id, degraded) = match self
            .http
            .post_json(&url, &headers, payload, self.config.aa_timeout)
            .await
        {
            Ok(response) => {
                let id = response
                    .get("sessionId")
                    .or_else(|| response.get("SessionId"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                match id {
                    Some(id) => (id, false),
                    None => (format!("dev-session-{}", &txn_id.to_string()[..8]), true),
                }
            }
            Err(_) if !self.config.production => {
                tracing::warn!("aa: FI/request unreachable, synthesising degraded session");
                (format!("dev-session-{}", &txn_id.to_string()[..8]), true)
            }
            Err(e) => return Err(e),
        };

        if degraded {
            self.session_keys.insert(session_id.clone(), crypto::random_aes_key());
        }

        let session = FiSession {
            txn_id,
            session_id: session_id.clone(),
            consent_id: input.consent_id,
            fi_type: input.fi_type,
            masked_account_number: input.masked_account,
            status: FiSessionStatus::Pending,
            created_at: now,
            payload: json!({}),
            jws_signature: jws_signature.clone(),
            degraded,
        };
        self.sessions.insert(txn_id, session);

        Ok(FiRequestResult {
            txn_id,
            session_id,
            timestamp: iso_z(now),
            jws_signature,
            degraded,
        })
    }

    /// fi.fetch.
    pub async fn fetch(&self, input: FiFetchInput) -> Result<FiFetchResult, NovaError> {
        let txn_id = self
            .sessions
            .iter()
            .find(|r| r.session_id == input.session_id)
            .ok_or_else(|| NovaError::not_found("no FI session with that session_id"))?
            .txn_id;

        let payload = json!({
            "ver": "2.0.0",
            "timestamp": iso_z(Utc::now()),
            "txnid": txn_id,
            "sessionId": input.session_id,
            "fipId": input.fip_id,
            "linkRefNumber": input.link_ref_numbers.unwrap_or_default(),
        });
        let jws_signature = sign_detached(&payload, &self.config.client_api_key, &self.config)?;
        let mut headers = HashMap::new();
        headers.insert("X-JWS-Signature".to_string(), jws_signature);
        headers.insert("client_api_key".to_string(), self.config.client_api_key.clone());
        let url = format!("{}/FI/fetch", self.config.aa_base_url);

        let response = match self
            .http
            .post_json(&url, &headers, payload, self.config.aa_timeout)
            .await
        {
            Ok(response) => response,
            Err(_) if !self.config.production => json!({}),
            Err(e) => return Err(e),
        };

        let fi_plaintext = if let Some(plaintext) = response.get("FI") {
            plaintext.clone()
        } else if let Some(encrypted) = response.get("encryptedFI").and_then(Value::as_str) {
            let packed = b64_standard_decode(encrypted)
                .map_err(|e| NovaError::DecryptionFailure(e.to_string()))?;
            let key = self
                .session_keys
                .get(&input.session_id)
                .map(|r| *r.value())
                .ok_or_else(|| NovaError::DecryptionFailure("no session key for transfer".to_string()))?;
            let plaintext = crypto::open_aes_gcm_packed(&key, &packed)
                .map_err(|e| NovaError::DecryptionFailure(e.to_string()))?;
            serde_json::from_slice(&plaintext).map_err(NovaError::from)?
        } else {
            json!({ "transactions": [] })
        };

        let mut entry = self
            .sessions
            .get_mut(&txn_id)
            .ok_or_else(|| NovaError::not_found("FI session vanished during fetch"))?;
        entry.status = FiSessionStatus::Ready;
        entry.payload = fi_plaintext.clone();
        drop(entry);

        Ok(FiFetchResult {
            txn_id,
            session_id: input.session_id,
            fi_plaintext,
        })
    }

    pub fn get_session(&self, txn_id: Uuid) -> Option<FiSession> {
        self.sessions.get(&txn_id).map(|r| r.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConsentFrequency, ConsentPurpose, ConsentRequest, DataLife, DataLifeUnit, DataRange};
    use async_trait::async_trait;
    use std::time::Duration;

    struct UnreachableHttp;

    #[async_trait]
    impl Http for UnreachableHttp {
        async fn post_json(
            &self,
            _url: &str,
            _headers: &HashMap<String, String>,
            _body: Value,
            _timeout: Duration,
        ) -> Result<Value, NovaError> {
            Err(NovaError::UpstreamUnreachable("no network in test".into()))
        }

        async fn post_xml(&self, _url: &str, _body: String, _timeout: Duration) -> Result<String, NovaError> {
            Err(NovaError::UpstreamUnreachable("no network in test".into()))
        }

        async fn get_json(
            &self,
            _url: &str,
            _headers: &HashMap<String, String>,
            _timeout: Duration,
        ) -> Result<Value, NovaError> {
            Err(NovaError::UpstreamUnreachable("no network in test".into()))
        }
    }

    async fn consent_store_with_deposit_consent() -> (Arc<ConsentStore>, Uuid) {
        let store = Arc::new(ConsentStore::memory());
        let now = Utc::now();
        let artefact = store
            .create(ConsentRequest {
                user_reference_id: "u1".to_string(),
                fi_types: vec![FiType::Deposit],
                data_range: DataRange {
                    from: now,
                    to: now + chrono::Duration::days(365),
                },
                data_life: DataLife {
                    unit: DataLifeUnit::Month,
                    value: 6,
                },
                purpose: Some(ConsentPurpose::default()),
                frequency: Some(ConsentFrequency::default()),
            })
            .await
            .unwrap();
        (store, artefact.consent_id)
    }

    #[tokio::test]
    async fn request_degrades_when_aa_unreachable() {
        let (consent_store, consent_id) = consent_store_with_deposit_consent().await;
        let engine = AaEngine::new(
            Arc::new(CoreConfig::default()),
            Arc::new(UnreachableHttp),
            consent_store,
        );
        let result = engine
            .request(FiRequestInput {
                consent_id,
                fi_type: FiType::Deposit,
                masked_account: None,
                link_ref: None,
            })
            .await
            .unwrap();
        assert!(result.degraded);
        assert!(result.session_id.starts_with("dev-session-"));
    }

    #[tokio::test]
    async fn request_rejects_fi_type_not_covered_by_consent() {
        let (consent_store, consent_id) = consent_store_with_deposit_consent().await;
        let engine = AaEngine::new(
            Arc::new(CoreConfig::default()),
            Arc::new(UnreachableHttp),
            consent_store,
        );
        let err = engine
            .request(FiRequestInput {
                consent_id,
                fi_type: FiType::Gst,
                masked_account: None,
                link_ref: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, NovaError::Validation { .. }));
    }

    #[tokio::test]
    async fn fetch_falls_back_to_empty_transactions_when_upstream_returns_nothing() {
        let (consent_store, consent_id) = consent_store_with_deposit_consent().await;
        let engine = AaEngine::new(
            Arc::new(CoreConfig::default()),
            Arc::new(UnreachableHttp),
            consent_store,
        );
        let requested = engine
            .request(FiRequestInput {
                consent_id,
                fi_type: FiType::Deposit,
                masked_account: None,
                link_ref: None,
            })
            .await
            .unwrap();

        let fetched = engine
            .fetch(FiFetchInput {
                session_id: requested.session_id,
                fip_id: None,
                link_ref_numbers: None,
            })
            .await
            .unwrap();
        assert_eq!(fetched.txn_id, requested.txn_id);
        assert!(fetched.fi_plaintext.get("transactions").is_some());
    }

    #[tokio::test]
    async fn fetch_unknown_session_is_not_found() {
        let (consent_store, _consent_id) = consent_store_with_deposit_consent().await;
        let engine = AaEngine::new(
            Arc::new(CoreConfig::default()),
            Arc::new(UnreachableHttp),
            consent_store,
        );
        let err = engine
            .fetch(FiFetchInput {
                session_id: "nonexistent".to_string(),
                fip_id: None,
                link_ref_numbers: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, NovaError::NotFound(_)));
    }
}
